//! # Delivery Proof Protocol
//!
//! Glue between the escrow and whatever proves and verifies delivery:
//!
//! - [`ProofGenerator`] is held by couriers. Proving is slow (hundreds of
//!   milliseconds) and happens *before* `confirm_delivery`, off the order's
//!   transition lock.
//! - [`ProofVerifier`] is held by the escrow and runs inside the lock.
//!
//! [`build_proof`] refuses to call the prover when the secret does not open
//! the commitment. [`verify_delivery`] refuses to trust signals that don't
//! name the order, courier and commitment the escrow expects, even if the
//! backend would have accepted the proof.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::commitment::{self, DeliverySecret, SecretCommitment};
use super::poseidon::CommitmentHasher;
use super::prover::DeliveryProof;
use super::ProofSystemError;
use crate::config::DELIVERY_CIRCUIT_ID;
use crate::crypto::Address;

/// Versioned circuit identifier. Key material is valid for exactly one.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitId(String);

impl CircuitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The current delivery circuit.
    pub fn delivery_v1() -> Self {
        Self::new(DELIVERY_CIRCUIT_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn ensure_matches(&self, other: &CircuitId) -> Result<(), ProofSystemError> {
        if self != other {
            return Err(ProofSystemError::CircuitMismatch {
                expected: self.0.clone(),
                got: other.0.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CircuitId({})", self.0)
    }
}

/// Public signals of a delivery proof, in circuit order:
/// `[commitment, order_id, courier]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    pub commitment: SecretCommitment,
    pub order_id: u64,
    pub courier: Address,
}

/// Produces delivery proofs.
pub trait ProofGenerator: Send + Sync {
    fn circuit_id(&self) -> &CircuitId;

    /// Prove knowledge of `secret` for `signals`.
    fn prove(
        &self,
        circuit_id: &CircuitId,
        secret: &DeliverySecret,
        signals: &PublicSignals,
    ) -> Result<DeliveryProof, ProofSystemError>;
}

/// Checks delivery proofs.
pub trait ProofVerifier: Send + Sync {
    fn circuit_id(&self) -> &CircuitId;

    /// `Ok(true)` iff the proof verifies for `signals`. `Err` is reserved
    /// for malformed input and backend failures.
    fn verify(
        &self,
        circuit_id: &CircuitId,
        proof: &DeliveryProof,
        signals: &PublicSignals,
    ) -> Result<bool, ProofSystemError>;
}

/// Build a delivery proof for `(order_id, courier)`.
///
/// Fails with [`ProofSystemError::SecretMismatch`] before touching the
/// prover if `H(secret) != commitment`.
pub fn build_proof(
    generator: &dyn ProofGenerator,
    hasher: &dyn CommitmentHasher,
    secret: &DeliverySecret,
    commitment: &SecretCommitment,
    order_id: u64,
    courier: &Address,
) -> Result<(DeliveryProof, PublicSignals), ProofSystemError> {
    if !commitment::verify(hasher, secret, commitment) {
        debug!(order_id, "secret does not open commitment; not proving");
        return Err(ProofSystemError::SecretMismatch);
    }

    let signals = PublicSignals {
        commitment: *commitment,
        order_id,
        courier: *courier,
    };
    let proof = generator.prove(generator.circuit_id(), secret, &signals)?;
    Ok((proof, signals))
}

/// Verify a delivery proof for the expected order, courier and commitment.
///
/// Returns `Ok(false)` if the signals name anything else, without
/// consulting the verifier.
pub fn verify_delivery(
    verifier: &dyn ProofVerifier,
    proof: &DeliveryProof,
    signals: &PublicSignals,
    expected_order_id: u64,
    expected_courier: &Address,
    expected_commitment: &SecretCommitment,
) -> Result<bool, ProofSystemError> {
    if signals.order_id != expected_order_id
        || signals.courier != *expected_courier
        || signals.commitment != *expected_commitment
    {
        debug!(
            order_id = expected_order_id,
            signals_order_id = signals.order_id,
            "public signals do not match order"
        );
        return Ok(false);
    }

    verifier.verify(verifier.circuit_id(), proof, signals)
}
