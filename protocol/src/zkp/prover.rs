//! # Groth16 Proof Generation
//!
//! 1. **Setup**: `Groth16Prover::setup(rng)` once per circuit version.
//!    Returns the prover and the matching [`Groth16Verifier`].
//! 2. **Prove**: populate a [`DeliveryProofCircuit`] and run
//!    `Groth16::prove`.
//! 3. The resulting [`DeliveryProof`] is 128 bytes compressed and is what
//!    the courier submits with `confirm_delivery`.
//!
//! ark-groth16 panics on an unsatisfiable witness instead of returning an
//! error, so `prove` checks the commitment opening first and never hands a
//! bad witness to the backend.

use std::fmt;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, RngCore};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::circuit::DeliveryProofCircuit;
use super::commitment::{self, DeliverySecret};
use super::delivery::{CircuitId, ProofGenerator, PublicSignals};
use super::poseidon::PoseidonHasher;
use super::verifier::Groth16Verifier;
use super::ProofSystemError;

/// Holds the Groth16 proving key for the delivery circuit.
///
/// Large but immutable; build it once and share it.
pub struct Groth16Prover {
    pk: ProvingKey<Bn254>,
    circuit_id: CircuitId,
    hasher: PoseidonHasher,
}

impl Groth16Prover {
    /// Run a local Groth16 setup for the current delivery circuit.
    pub fn setup<R: RngCore + CryptoRng>(
        rng: &mut R,
    ) -> Result<(Self, Groth16Verifier), ProofSystemError> {
        let hasher = PoseidonHasher::new();
        let blank = DeliveryProofCircuit::blank(hasher.config());

        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(blank, rng)
            .map_err(|e| ProofSystemError::Backend(format!("setup: {e}")))?;

        let circuit_id = CircuitId::delivery_v1();
        let verifier = Groth16Verifier::from_vk(vk, circuit_id.clone());
        Ok((
            Self {
                pk,
                circuit_id,
                hasher,
            },
            verifier,
        ))
    }
}

impl fmt::Debug for Groth16Prover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Groth16Prover")
            .field("circuit_id", &self.circuit_id)
            .finish_non_exhaustive()
    }
}

impl ProofGenerator for Groth16Prover {
    fn circuit_id(&self) -> &CircuitId {
        &self.circuit_id
    }

    fn prove(
        &self,
        circuit_id: &CircuitId,
        secret: &DeliverySecret,
        signals: &PublicSignals,
    ) -> Result<DeliveryProof, ProofSystemError> {
        self.circuit_id.ensure_matches(circuit_id)?;

        if !commitment::verify(&self.hasher, secret, &signals.commitment) {
            return Err(ProofSystemError::SecretMismatch);
        }

        let circuit = DeliveryProofCircuit::new(
            self.hasher.config(),
            secret,
            &signals.commitment,
            signals.order_id,
            &signals.courier,
        );

        let proof = Groth16::<Bn254>::prove(&self.pk, circuit, &mut OsRng)
            .map_err(|e| ProofSystemError::Backend(format!("prove: {e}")))?;

        let mut bytes = Vec::new();
        proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| ProofSystemError::Backend(format!("proof serialization: {e}")))?;

        Ok(DeliveryProof {
            circuit_id: self.circuit_id.clone(),
            bytes,
        })
    }
}

// ---------------------------------------------------------------------------
// DeliveryProof
// ---------------------------------------------------------------------------

/// A serialized Groth16 proof, tagged with the circuit it was made for.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryProof {
    pub circuit_id: CircuitId,
    #[serde(with = "hex_proof")]
    bytes: Vec<u8>,
}

impl DeliveryProof {
    /// Wrap raw bytes received from a caller. Decoding is deferred to
    /// verification so a malformed proof is a failed verification.
    pub fn from_bytes(circuit_id: CircuitId, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            circuit_id,
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn to_ark_proof(&self) -> Result<ark_groth16::Proof<Bn254>, ProofSystemError> {
        ark_groth16::Proof::<Bn254>::deserialize_compressed(&self.bytes[..])
            .map_err(|e| ProofSystemError::Malformed(format!("proof bytes: {e}")))
    }
}

impl fmt::Debug for DeliveryProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeliveryProof({}, {} bytes)", self.circuit_id, self.bytes.len())
    }
}

mod hex_proof {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
