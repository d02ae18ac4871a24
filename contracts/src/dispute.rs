//! # Dispute Record
//!
//! Either the emitter or the courier can freeze a LOCKED or PICKED_UP order
//! by opening a dispute. While frozen nothing moves: no pickup, no delivery,
//! no expiry. Parties attach evidence, and the configured arbiter picks a
//! [`Resolution`] that sends the order to a terminal state.
//!
//! ## Evidence Model
//!
//! Evidence is a BLAKE3 content hash plus a short description. The payload
//! itself (photos, chat logs, tracking data) lives off-ledger; the hash is
//! the tamper-proof anchor.

use hashdrop_protocol::config::MAX_DISPUTE_EVIDENCE;
use hashdrop_protocol::crypto::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::order::{OrderId, OrderState};

/// Errors from dispute bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisputeError {
    /// The caller may not submit evidence on this dispute.
    #[error("unauthorized: {party} is not a participant in this dispute")]
    Unauthorized { party: String },

    /// The evidence list is full.
    #[error("evidence limit of {limit} reached")]
    EvidenceLimit { limit: usize },

    /// The dispute has already been resolved.
    #[error("dispute already resolved")]
    AlreadyResolved,
}

/// Dispute status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeStatus {
    /// Opened, no evidence yet.
    Open,
    /// At least one piece of evidence submitted.
    UnderReview,
    /// The arbiter ruled.
    Resolved,
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisputeStatus::Open => write!(f, "Open"),
            DisputeStatus::UnderReview => write!(f, "UnderReview"),
            DisputeStatus::Resolved => write!(f, "Resolved"),
        }
    }
}

/// The arbiter's ruling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The parcel was delivered. Settle as a successful delivery.
    ForCourier,
    /// Nobody is at fault. Refund the emitter, return the collateral.
    ForEmitter,
    /// The courier lost or kept the parcel. Forfeit the collateral.
    CourierAtFault,
}

impl Resolution {
    /// Terminal state the order ends in.
    pub fn outcome(self) -> OrderState {
        match self {
            Resolution::ForCourier => OrderState::Delivered,
            Resolution::ForEmitter => OrderState::Cancelled,
            Resolution::CourierAtFault => OrderState::Expired,
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::ForCourier => write!(f, "ForCourier"),
            Resolution::ForEmitter => write!(f, "ForEmitter"),
            Resolution::CourierAtFault => write!(f, "CourierAtFault"),
        }
    }
}

/// A piece of evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub submitted_by: Address,
    pub description: String,
    /// BLAKE3 of the off-ledger payload, hex.
    pub data_hash: String,
    pub submitted_at: u64,
}

/// A dispute on one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub order_id: OrderId,
    pub initiator: Address,
    pub respondent: Address,
    /// The receiver may also submit evidence.
    pub receiver: Address,
    pub reason: String,
    /// The state the order was in when frozen.
    pub frozen_state: OrderState,
    pub evidence: Vec<Evidence>,
    pub status: DisputeStatus,
    pub resolution: Option<Resolution>,
    pub created_at: u64,
    pub resolved_at: Option<u64>,
}

impl Dispute {
    /// Opens a dispute in `Open` status.
    pub fn open(
        order_id: OrderId,
        initiator: Address,
        respondent: Address,
        receiver: Address,
        reason: String,
        frozen_state: OrderState,
        now: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id,
            initiator,
            respondent,
            receiver,
            reason,
            frozen_state,
            evidence: Vec::new(),
            status: DisputeStatus::Open,
            resolution: None,
            created_at: now,
            resolved_at: None,
        }
    }

    pub fn is_participant(&self, party: &Address) -> bool {
        *party == self.initiator || *party == self.respondent || *party == self.receiver
    }

    /// Attaches evidence. The first submission moves the dispute to
    /// `UnderReview`.
    ///
    /// # Errors
    ///
    /// [`DisputeError::Unauthorized`] for non-participants,
    /// [`DisputeError::AlreadyResolved`] after the ruling, and
    /// [`DisputeError::EvidenceLimit`] once the list is full.
    pub fn submit_evidence(
        &mut self,
        party: &Address,
        description: String,
        data_hash: [u8; 32],
        now: u64,
    ) -> Result<(), DisputeError> {
        if !self.is_participant(party) {
            return Err(DisputeError::Unauthorized {
                party: party.to_hex(),
            });
        }
        if self.status == DisputeStatus::Resolved {
            return Err(DisputeError::AlreadyResolved);
        }
        if self.evidence.len() >= MAX_DISPUTE_EVIDENCE {
            return Err(DisputeError::EvidenceLimit {
                limit: MAX_DISPUTE_EVIDENCE,
            });
        }

        self.evidence.push(Evidence {
            submitted_by: *party,
            description,
            data_hash: hex::encode(data_hash),
            submitted_at: now,
        });

        if self.status == DisputeStatus::Open {
            self.status = DisputeStatus::UnderReview;
        }
        Ok(())
    }

    /// Records the arbiter's ruling.
    pub fn resolve(&mut self, resolution: Resolution, now: u64) -> Result<(), DisputeError> {
        if self.status == DisputeStatus::Resolved {
            return Err(DisputeError::AlreadyResolved);
        }
        self.status = DisputeStatus::Resolved;
        self.resolution = Some(resolution);
        self.resolved_at = Some(now);
        Ok(())
    }
}
