//! # Hashing Utilities
//!
//! BLAKE3 is the general-purpose hash of HashDrop: pickup message hashes,
//! evidence anchors, delivery-zone commitments. It is fast, has a built-in
//! key-derivation mode for domain separation, and is not length-extendable.
//!
//! BLAKE3 is *not* what the delivery circuit proves. Anything that must be
//! recomputed inside the SNARK goes through Poseidon
//! ([`crate::zkp::poseidon`]). The one bridge between the two worlds is
//! [`address_to_field`], which maps a party address into BN254's scalar
//! field so it can be used as a public circuit input.

use ark_bn254::Fr;
use ark_ff::PrimeField;

use crate::config::ADDRESS_FIELD_CONTEXT;

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use hashdrop_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"HashDrop");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple byte slices as if they were concatenated, without building
/// the concatenation.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Domain-separated BLAKE3 using the `derive_key` mode.
///
/// Two different contexts never collide even on identical data, because the
/// context selects a different internal IV.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Map a 32-byte party address into the scalar field.
///
/// Raw reduction of a 256-bit key would be 4-to-1 over a 254-bit field, so
/// the address is hashed under its own context first.
pub fn address_to_field(address: &[u8; 32]) -> Fr {
    Fr::from_le_bytes_mod_order(&domain_separated_hash(ADDRESS_FIELD_CONTEXT, address))
}
