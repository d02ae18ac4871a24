//! Typed requests, one per escrow operation.
//!
//! The caller field of each request is the authenticated identity of
//! whoever submitted it (the transaction sender). `validate` checks shape
//! only; state and role guards run inside the escrow under the order lock.

use hashdrop_protocol::config::{MAX_DETAILS_REF_LENGTH, MAX_DISPUTE_REASON_LENGTH};
use hashdrop_protocol::crypto::{Address, Signature};
use hashdrop_protocol::zkp::{DeliveryProof, DeliverySecret, PublicSignals, SecretCommitment};

use crate::dispute::Resolution;
use crate::error::{EscrowError, StateError};
use crate::order::OrderId;

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub emitter: Address,
    pub receiver: Address,
    pub package_value: u64,
    pub delivery_fee: u64,
    pub secret_commitment: SecretCommitment,
    pub delivery_zone_commitment: [u8; 32],
    pub encrypted_details_ref: String,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> Result<(), EscrowError> {
        if self.emitter == self.receiver {
            return Err(EscrowError::InvalidRequest(
                "receiver must differ from emitter".into(),
            ));
        }
        if self.encrypted_details_ref.len() > MAX_DETAILS_REF_LENGTH {
            return Err(EscrowError::InvalidRequest(format!(
                "details reference longer than {MAX_DETAILS_REF_LENGTH} bytes"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptOrderRequest {
    pub order_id: OrderId,
    pub courier: Address,
}

#[derive(Debug, Clone)]
pub struct ConfirmPickupRequest {
    pub order_id: OrderId,
    pub courier: Address,
    /// The emitter's attestation for the current hour window.
    pub signature: Signature,
}

#[derive(Debug, Clone)]
pub struct ConfirmDeliveryRequest {
    pub order_id: OrderId,
    pub courier: Address,
    pub secret: DeliverySecret,
    pub proof: DeliveryProof,
    pub signals: PublicSignals,
}

#[derive(Debug, Clone, Copy)]
pub struct CancelOrderRequest {
    pub order_id: OrderId,
    pub caller: Address,
}

#[derive(Debug, Clone)]
pub struct InitiateDisputeRequest {
    pub order_id: OrderId,
    pub caller: Address,
    pub reason: String,
}

impl InitiateDisputeRequest {
    /// A blank reason fails the dispute guard and reports a [`StateError`].
    /// An oversized one is a malformed request.
    pub fn validate(&self) -> Result<(), EscrowError> {
        if self.reason.trim().is_empty() {
            return Err(StateError::MissingReason {
                order_id: self.order_id,
            }
            .into());
        }
        validate_length("reason", &self.reason)
    }
}

#[derive(Debug, Clone)]
pub struct SubmitEvidenceRequest {
    pub order_id: OrderId,
    pub caller: Address,
    pub description: String,
    /// BLAKE3 of the off-ledger payload.
    pub data_hash: [u8; 32],
}

impl SubmitEvidenceRequest {
    pub fn validate(&self) -> Result<(), EscrowError> {
        if self.description.trim().is_empty() {
            return Err(EscrowError::InvalidRequest(
                "description must not be empty".into(),
            ));
        }
        validate_length("description", &self.description)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveDisputeRequest {
    pub order_id: OrderId,
    pub arbiter: Address,
    pub resolution: Resolution,
}

fn validate_length(field: &str, text: &str) -> Result<(), EscrowError> {
    if text.len() > MAX_DISPUTE_REASON_LENGTH {
        return Err(EscrowError::InvalidRequest(format!(
            "{field} longer than {MAX_DISPUTE_REASON_LENGTH} bytes"
        )));
    }
    Ok(())
}
