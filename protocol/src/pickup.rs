//! # Pickup Attestation
//!
//! When the courier collects the parcel, the emitter signs a short message
//! saying so. The courier submits that signature to move the order from
//! LOCKED to PICKED_UP.
//!
//! The signed digest binds the order id, the courier, and the *hour window*
//! (`floor(unix_secs / 3600)`), not a raw timestamp:
//!
//! ```text
//! BLAKE3( order_id u64 BE || "PICKUP" || courier [32] || hour_window u64 BE )
//! ```
//!
//! A signature is therefore valid only during the hour it was issued in.
//! Verification checks the current window and nothing else. A signature
//! minted at 10:59 and submitted at 11:00 fails, and the emitter signs
//! again.

use crate::config::{hour_window, PICKUP_TAG};
use crate::crypto::{blake3_hash_multi, Address, Keypair, Signature, SignatureScheme};

/// Digest the emitter signs to authorise pickup.
pub fn message_hash(order_id: u64, courier: &Address, hour_window: u64) -> [u8; 32] {
    blake3_hash_multi(&[
        &order_id.to_be_bytes(),
        PICKUP_TAG,
        courier.as_bytes(),
        &hour_window.to_be_bytes(),
    ])
}

/// Sign a pickup attestation for the hour window containing `now`.
pub fn sign(
    scheme: &dyn SignatureScheme,
    emitter: &Keypair,
    order_id: u64,
    courier: &Address,
    now: u64,
) -> Signature {
    let digest = message_hash(order_id, courier, hour_window(now));
    scheme.sign(emitter, &digest)
}

/// Verify a pickup attestation against the hour window containing `now`.
///
/// Returns `false` on a bad signature, a wrong signer, a signature from any
/// other window, or malformed bytes.
pub fn verify(
    scheme: &dyn SignatureScheme,
    signature: &Signature,
    order_id: u64,
    courier: &Address,
    expected_signer: &Address,
    now: u64,
) -> bool {
    let digest = message_hash(order_id, courier, hour_window(now));
    scheme.verify(expected_signer, &digest, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HOUR_WINDOW_SECS;
    use crate::crypto::Ed25519Scheme;

    const T0: u64 = 1_700_000_000;

    fn parties() -> (Keypair, Address) {
        let emitter = Keypair::from_seed(&[11u8; 32]);
        let courier = Keypair::from_seed(&[22u8; 32]).address();
        (emitter, courier)
    }

    #[test]
    fn valid_in_same_window() {
        let (emitter, courier) = parties();
        let sig = sign(&Ed25519Scheme, &emitter, 7, &courier, T0);
        let start = hour_window(T0) * HOUR_WINDOW_SECS;
        assert!(verify(&Ed25519Scheme, &sig, 7, &courier, &emitter.address(), start));
        assert!(verify(
            &Ed25519Scheme,
            &sig,
            7,
            &courier,
            &emitter.address(),
            start + HOUR_WINDOW_SECS - 1
        ));
    }

    #[test]
    fn rejected_in_adjacent_windows() {
        let (emitter, courier) = parties();
        let sig = sign(&Ed25519Scheme, &emitter, 7, &courier, T0);
        let later = T0 + HOUR_WINDOW_SECS;
        let earlier = T0 - HOUR_WINDOW_SECS;
        assert!(!verify(&Ed25519Scheme, &sig, 7, &courier, &emitter.address(), later));
        assert!(!verify(&Ed25519Scheme, &sig, 7, &courier, &emitter.address(), earlier));
    }

    #[test]
    fn bound_to_order_courier_and_signer() {
        let (emitter, courier) = parties();
        let other = Keypair::from_seed(&[33u8; 32]);
        let sig = sign(&Ed25519Scheme, &emitter, 7, &courier, T0);

        assert!(!verify(&Ed25519Scheme, &sig, 8, &courier, &emitter.address(), T0));
        assert!(!verify(&Ed25519Scheme, &sig, 7, &other.address(), &emitter.address(), T0));
        assert!(!verify(&Ed25519Scheme, &sig, 7, &courier, &other.address(), T0));
    }

    #[test]
    fn malformed_signature_is_false() {
        let (emitter, courier) = parties();
        let junk = Signature::from_bytes(vec![0xff; 12]);
        assert!(!verify(&Ed25519Scheme, &junk, 7, &courier, &emitter.address(), T0));
    }

    #[test]
    fn message_hash_layout() {
        let courier = Address::from_bytes([4u8; 32]);
        let mut buf = Vec::new();
        buf.extend_from_slice(&9u64.to_be_bytes());
        buf.extend_from_slice(b"PICKUP");
        buf.extend_from_slice(&[4u8; 32]);
        buf.extend_from_slice(&5u64.to_be_bytes());
        assert_eq!(message_hash(9, &courier, 5), crate::crypto::blake3_hash(&buf));
    }
}
