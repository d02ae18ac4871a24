//! # Secret Commitment
//!
//! At order creation the emitter draws a random delivery secret and stores
//! only its Poseidon hash on the order. The secret travels off-protocol to
//! the receiver, who hands it to the courier at the door. The courier then
//! proves knowledge of it in zero knowledge ([`super::delivery`]).
//!
//! ```text
//! secret     = (48 random bytes as little-endian integer) mod r
//! commitment = Poseidon(secret)
//! ```
//!
//! 48 bytes is 130 bits above the 254-bit field order, so the reduction
//! bias is negligible. Truncating 32 bytes into a 254-bit field would skew
//! low values by roughly 4x; don't.

use std::fmt;

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::poseidon::CommitmentHasher;
use super::ProofSystemError;
use crate::config::SECRET_SAMPLE_BYTES;

/// Serialized size of a field element.
pub const FIELD_BYTES: usize = 32;

/// The delivery secret. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct DeliverySecret(Fr);

/// `H(secret)`, stored on the order at creation and never changed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecretCommitment(Fr);

impl DeliverySecret {
    /// Draw a fresh secret.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut wide = [0u8; SECRET_SAMPLE_BYTES];
        rng.fill_bytes(&mut wide);
        Self(Fr::from_le_bytes_mod_order(&wide))
    }

    pub fn from_field(value: Fr) -> Self {
        Self(value)
    }

    pub fn as_field(&self) -> &Fr {
        &self.0
    }

    /// Canonical 32-byte little-endian encoding, for the QR/NFC handoff.
    pub fn to_bytes(&self) -> Vec<u8> {
        field_to_bytes(&self.0)
    }

    /// Parse a canonical encoding. Values at or above the field order are
    /// rejected rather than reduced.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofSystemError> {
        field_from_bytes(bytes).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, ProofSystemError> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| ProofSystemError::Malformed(format!("secret hex: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for DeliverySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeliverySecret(<redacted>)")
    }
}

impl SecretCommitment {
    pub fn from_field(value: Fr) -> Self {
        Self(value)
    }

    pub fn as_field(&self) -> &Fr {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        field_to_bytes(&self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofSystemError> {
        field_from_bytes(bytes).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, ProofSystemError> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| ProofSystemError::Malformed(format!("commitment hex: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for SecretCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretCommitment({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for SecretCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for SecretCommitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SecretCommitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// `commitment = H(secret)`.
pub fn commit(hasher: &dyn CommitmentHasher, secret: &DeliverySecret) -> SecretCommitment {
    SecretCommitment(hasher.hash(&secret.0))
}

/// Draw a secret and commit to it.
pub fn generate<R: RngCore + CryptoRng>(
    hasher: &dyn CommitmentHasher,
    rng: &mut R,
) -> (DeliverySecret, SecretCommitment) {
    let secret = DeliverySecret::random(rng);
    let commitment = commit(hasher, &secret);
    (secret, commitment)
}

/// Recompute `H(secret)` and compare. Pure.
pub fn verify(
    hasher: &dyn CommitmentHasher,
    secret: &DeliverySecret,
    commitment: &SecretCommitment,
) -> bool {
    hasher.hash(&secret.0) == commitment.0
}

fn field_to_bytes(value: &Fr) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FIELD_BYTES);
    // Writing into a Vec cannot fail.
    let _ = value.serialize_compressed(&mut buf);
    buf
}

fn field_from_bytes(bytes: &[u8]) -> Result<Fr, ProofSystemError> {
    if bytes.len() != FIELD_BYTES {
        return Err(ProofSystemError::Malformed(format!(
            "expected {FIELD_BYTES} bytes, got {}",
            bytes.len()
        )));
    }
    Fr::deserialize_compressed(bytes)
        .map_err(|e| ProofSystemError::Malformed(format!("field element: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zkp::poseidon::PoseidonHasher;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn generated_pair_verifies() {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = PoseidonHasher::new();
        for _ in 0..8 {
            let (s, c) = generate(&hasher, &mut rng);
            assert!(verify(&hasher, &s, &c));
        }
    }

    #[test]
    fn other_secret_does_not_verify() {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = PoseidonHasher::new();
        let (s1, c1) = generate(&hasher, &mut rng);
        let (s2, c2) = generate(&hasher, &mut rng);
        assert_ne!(s1, s2);
        assert!(!verify(&hasher, &s1, &c2));
        assert!(!verify(&hasher, &s2, &c1));
    }

    #[test]
    fn secret_bytes_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let s = DeliverySecret::random(&mut rng);
        assert_eq!(DeliverySecret::from_hex(&s.to_hex()).unwrap(), s);
        assert_eq!(s.to_bytes().len(), FIELD_BYTES);
    }

    #[test]
    fn non_canonical_bytes_rejected() {
        // 0xff..ff is far above the BN254 scalar modulus.
        assert!(SecretCommitment::from_bytes(&[0xff; 32]).is_err());
        assert!(SecretCommitment::from_bytes(&[0u8; 31]).is_err());
        assert!(DeliverySecret::from_hex("zz").is_err());
    }

    #[test]
    fn commitment_serde_is_hex() {
        let hasher = PoseidonHasher::new();
        let c = commit(&hasher, &DeliverySecret::from_field(Fr::from(9u64)));
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json.len(), 64 + 2);
        let back: SecretCommitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn debug_redacts_secret() {
        let s = DeliverySecret::from_field(Fr::from(31337u64));
        assert_eq!(format!("{:?}", s), "DeliverySecret(<redacted>)");
    }
}
