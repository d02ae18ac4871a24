//! Escrow error taxonomy.
//!
//! Every rejected operation leaves the order exactly as it was. Only
//! [`EscrowError::ExternalCollaborator`] is worth retrying unchanged; every
//! other variant needs the caller to change something first.

use hashdrop_protocol::crypto::Address;
use hashdrop_protocol::fees::FeeError;
use hashdrop_protocol::zkp::ProofSystemError;
use thiserror::Error;

use crate::dispute::DisputeError;
use crate::ledger::LedgerError;
use crate::order::{OrderId, OrderState};

/// A guard on the order's state, caller or clock failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order {order_id} is {current}, expected {expected}")]
    WrongState {
        order_id: OrderId,
        current: OrderState,
        expected: &'static str,
    },

    #[error("order {order_id} is frozen by a dispute")]
    Frozen { order_id: OrderId },

    #[error("{caller} is not {role} of order {order_id}")]
    Unauthorized {
        order_id: OrderId,
        caller: Address,
        role: &'static str,
    },

    #[error("dispute on order {order_id} needs a reason")]
    MissingReason { order_id: OrderId },

    #[error("order {order_id} deadline {deadline} passed (now {now})")]
    DeadlinePassed {
        order_id: OrderId,
        deadline: u64,
        now: u64,
    },

    #[error("order {order_id} cannot expire before {deadline} (now {now})")]
    DeadlineNotReached {
        order_id: OrderId,
        deadline: u64,
        now: u64,
    },

    #[error("dispute on order {order_id}: {source}")]
    Dispute {
        order_id: OrderId,
        #[source]
        source: DisputeError,
    },
}

/// Errors returned by [`crate::escrow::HashDropEscrow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    #[error(transparent)]
    State(#[from] StateError),

    /// A pickup signature, revealed secret or delivery proof was rejected.
    #[error("verification failed: {0}")]
    CryptoVerification(String),

    /// Proof inputs were inconsistent before the prover was invoked.
    #[error("proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] FeeError),

    /// The ledger or a proving backend failed. Order state is unchanged.
    #[error("external collaborator failed: {0}")]
    ExternalCollaborator(String),

    /// The request was malformed before any guard ran.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EscrowError {
    /// Retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalCollaborator(_))
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::State(_) => "state",
            Self::CryptoVerification(_) => "crypto_verification",
            Self::ProofGeneration(_) => "proof_generation",
            Self::Arithmetic(_) => "arithmetic",
            Self::ExternalCollaborator(_) => "external_collaborator",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<LedgerError> for EscrowError {
    fn from(err: LedgerError) -> Self {
        match err {
            // The caller's own balance is short; nothing to retry.
            LedgerError::InsufficientFunds { .. } => Self::InvalidRequest(err.to_string()),
            LedgerError::Overflow { .. } | LedgerError::Unavailable(_) => {
                Self::ExternalCollaborator(err.to_string())
            }
        }
    }
}

impl From<ProofSystemError> for EscrowError {
    fn from(err: ProofSystemError) -> Self {
        match err {
            ProofSystemError::SecretMismatch => Self::ProofGeneration(err.to_string()),
            ProofSystemError::Backend(_) => Self::ExternalCollaborator(err.to_string()),
            ProofSystemError::CircuitMismatch { .. } | ProofSystemError::Malformed(_) => {
                Self::CryptoVerification(err.to_string())
            }
        }
    }
}
