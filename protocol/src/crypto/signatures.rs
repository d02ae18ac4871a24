//! # Digital Signatures
//!
//! Ed25519 signing and verification behind a small trait, so the escrow
//! can be handed whatever scheme a deployment actually uses.
//!
//! ## Verify, don't recover
//!
//! Some signature schemes let you recover a public key from a signature and
//! then compare it to the expected signer. Ed25519 doesn't, and we don't
//! miss it: the escrow always knows who *should* have signed (the order's
//! emitter), so it asks the narrower question "did this address sign this
//! message?" and gets a plain yes or no.
//!
//! Malformed signature bytes are a "no", not an error. Callers upstream
//! turn a "no" into a `CryptoVerification` failure with no further detail.

use super::keys::{Address, Keypair, Signature};

/// A signature scheme the escrow can verify pickup attestations with.
pub trait SignatureScheme: Send + Sync {
    /// Short scheme name for logs.
    fn name(&self) -> &'static str;

    /// Sign `message` with `keypair`.
    fn sign(&self, keypair: &Keypair, message: &[u8]) -> Signature;

    /// `true` iff `signature` is a valid signature by `signer` over
    /// `message`. Never panics, never errors.
    fn verify(&self, signer: &Address, message: &[u8], signature: &Signature) -> bool;
}

/// Ed25519 (RFC 8032) via `ed25519-dalek`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Scheme;

impl SignatureScheme for Ed25519Scheme {
    fn name(&self) -> &'static str {
        "ed25519"
    }

    fn sign(&self, keypair: &Keypair, message: &[u8]) -> Signature {
        keypair.sign(message)
    }

    fn verify(&self, signer: &Address, message: &[u8], signature: &Signature) -> bool {
        signer.verify(message, signature)
    }
}

/// Sign a message with a party keypair.
///
/// # Example
///
/// ```
/// use hashdrop_protocol::crypto::{Keypair, sign, verify};
///
/// let keypair = Keypair::generate();
/// let signature = sign(&keypair, b"hand over parcel 42");
///
/// assert!(verify(&keypair.address(), b"hand over parcel 42", &signature));
/// ```
pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
    Ed25519Scheme.sign(keypair, message)
}

/// Verify an Ed25519 signature against an address and message.
pub fn verify(signer: &Address, message: &[u8], signature: &Signature) -> bool {
    Ed25519Scheme.verify(signer, message, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_sign_and_verify() {
        let scheme = Ed25519Scheme;
        let kp = Keypair::generate();
        let sig = scheme.sign(&kp, b"parcel");
        assert!(scheme.verify(&kp.address(), b"parcel", &sig));
        assert_eq!(sig.as_bytes().len(), 64);
    }

    #[test]
    fn test_deterministic_signatures() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        assert_eq!(sign(&kp, b"same").as_bytes(), sign(&kp, b"same").as_bytes());
    }

    #[test]
    fn test_trait_object_usable() {
        let scheme: Box<dyn SignatureScheme> = Box::new(Ed25519Scheme);
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let sig = scheme.sign(&kp, b"m");
        assert!(!scheme.verify(&other.address(), b"m", &sig));
        assert_eq!(scheme.name(), "ed25519");
    }

    #[test]
    fn test_empty_message() {
        let kp = Keypair::generate();
        let sig = sign(&kp, b"");
        assert!(verify(&kp.address(), b"", &sig));
    }
}
