//! # Cryptographic Primitives for HashDrop
//!
//! Everything the escrow needs to authenticate parties and anchor data:
//!
//! - **Ed25519** for party identities and pickup signatures.
//! - **BLAKE3** for message hashes and domain-separated field mapping.
//!
//! Poseidon, the circuit-friendly hash, lives in [`crate::zkp::poseidon`]
//! because nothing outside the delivery proof should need it.
//!
//! Everything here is a thin, typed wrapper around audited implementations.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{address_to_field, blake3_hash, blake3_hash_multi, domain_separated_hash};
pub use keys::{Address, KeyError, Keypair, Signature};
pub use signatures::{sign, verify, Ed25519Scheme, SignatureScheme};
