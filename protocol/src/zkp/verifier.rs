//! # Groth16 Proof Verification
//!
//! The escrow holds a [`Groth16Verifier`] and checks every delivery proof
//! inside the order's transition lock. Verification is three pairings and
//! a three-term MSM, a few milliseconds regardless of circuit size.

use std::fmt;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;

use super::circuit;
use super::delivery::{CircuitId, ProofVerifier, PublicSignals};
use super::prover::DeliveryProof;
use super::ProofSystemError;

/// Holds the Groth16 verification key for one circuit version.
#[derive(Clone)]
pub struct Groth16Verifier {
    vk: VerifyingKey<Bn254>,
    circuit_id: CircuitId,
}

impl Groth16Verifier {
    pub(crate) fn from_vk(vk: VerifyingKey<Bn254>, circuit_id: CircuitId) -> Self {
        Self { vk, circuit_id }
    }

    /// Serialize the verification key for distribution.
    pub fn vk_to_bytes(&self) -> Result<Vec<u8>, ProofSystemError> {
        let mut buf = Vec::new();
        self.vk
            .serialize_compressed(&mut buf)
            .map_err(|e| ProofSystemError::Backend(format!("vk serialization: {e}")))?;
        Ok(buf)
    }

    /// Load a verification key produced by [`Self::vk_to_bytes`].
    pub fn vk_from_bytes(data: &[u8], circuit_id: CircuitId) -> Result<Self, ProofSystemError> {
        let vk = VerifyingKey::<Bn254>::deserialize_compressed(data)
            .map_err(|e| ProofSystemError::Malformed(format!("verification key: {e}")))?;
        Ok(Self { vk, circuit_id })
    }
}

impl fmt::Debug for Groth16Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Groth16Verifier")
            .field("circuit_id", &self.circuit_id)
            .finish_non_exhaustive()
    }
}

impl ProofVerifier for Groth16Verifier {
    fn circuit_id(&self) -> &CircuitId {
        &self.circuit_id
    }

    fn verify(
        &self,
        circuit_id: &CircuitId,
        proof: &DeliveryProof,
        signals: &PublicSignals,
    ) -> Result<bool, ProofSystemError> {
        self.circuit_id.ensure_matches(circuit_id)?;
        self.circuit_id.ensure_matches(&proof.circuit_id)?;

        let ark_proof = proof.to_ark_proof()?;
        let inputs = circuit::public_inputs(&signals.commitment, signals.order_id, &signals.courier);

        Groth16::<Bn254>::verify(&self.vk, &inputs, &ark_proof)
            .map_err(|e| ProofSystemError::Backend(format!("verify: {e}")))
    }
}
