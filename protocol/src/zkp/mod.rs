//! # Zero-Knowledge Delivery Proofs
//!
//! Groth16 over BN254. The courier proves knowledge of the delivery secret
//! behind an order's commitment, bound to the order id and their own
//! address, without putting the secret on the ledger.
//!
//! ## Architecture
//!
//! ```text
//! poseidon.rs    — Poseidon parameters and the CommitmentHasher trait
//! commitment.rs  — DeliverySecret / SecretCommitment (generate, verify)
//! circuit.rs     — R1CS circuit (DeliveryProofCircuit)
//! prover.rs      — Groth16 proving (Groth16Prover, DeliveryProof)
//! verifier.rs    — Groth16 verification (Groth16Verifier)
//! delivery.rs    — collaborator traits, public signals, build/verify
//! ```
//!
//! ## Security Model
//!
//! - **Commitment hiding**: the secret has ~254 bits of entropy; Poseidon
//!   is treated as a random oracle.
//! - **Soundness**: Groth16 knowledge-soundness in the generic group model.
//! - **Replay**: order id and courier are public inputs; a proof for one
//!   pair does not verify for another.
//!
//! The trusted setup is per-circuit. [`Groth16Prover::setup`] runs a local
//! ceremony, which is fine for tests and single-operator deployments and
//! nothing else.

use thiserror::Error;

pub mod circuit;
pub mod commitment;
pub mod delivery;
pub mod poseidon;
pub mod prover;
pub mod verifier;

pub use circuit::DeliveryProofCircuit;
pub use commitment::{DeliverySecret, SecretCommitment};
pub use delivery::{build_proof, verify_delivery, CircuitId, ProofGenerator, ProofVerifier, PublicSignals};
pub use poseidon::{CommitmentHasher, PoseidonHasher};
pub use prover::{DeliveryProof, Groth16Prover};
pub use verifier::Groth16Verifier;

/// Scalar field of the delivery circuit.
pub use ark_bn254::Fr;

/// Errors from the proving and verification collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofSystemError {
    /// The revealed secret does not hash to the commitment. Raised before
    /// any proving work is done.
    #[error("secret does not open the commitment")]
    SecretMismatch,

    /// The request named a circuit this key material was not made for.
    #[error("circuit mismatch: key is for {expected}, request is for {got}")]
    CircuitMismatch { expected: String, got: String },

    /// Caller-supplied bytes did not decode.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// The proving backend failed.
    #[error("proving backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Address;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    /// setup -> commit -> build_proof -> verify_delivery
    #[test]
    fn end_to_end_delivery_proof() {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = PoseidonHasher::new();
        let (prover, verifier) = Groth16Prover::setup(&mut rng).unwrap();

        let (secret, c) = commitment::generate(&hasher, &mut rng);
        let courier = Address::from_bytes([9u8; 32]);

        let (proof, signals) = build_proof(&prover, &hasher, &secret, &c, 1, &courier).unwrap();
        assert!(verify_delivery(&verifier, &proof, &signals, 1, &courier, &c).unwrap());
    }
}
