//! Runtime-tunable escrow parameters.
//!
//! Defaults come straight from [`hashdrop_protocol::config`]. Deployments
//! that need different timeouts or fee splits override them here rather than
//! editing the protocol constants.

use hashdrop_protocol::config::{DELIVERY_TIMEOUT_SECS, ORDER_EXPIRY_SECS, PICKUP_TIMEOUT_SECS};
use hashdrop_protocol::crypto::Address;
use hashdrop_protocol::fees::FeeSchedule;
use serde::{Deserialize, Serialize};

/// Who receives the escrowed package value on successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalRecipient {
    /// The principal returns to the emitter. The package value was escrowed
    /// only as insurance against a courier running off with the parcel.
    #[default]
    Emitter,
    /// The principal is paid to the receiver (cash-on-delivery style).
    Receiver,
}

/// Parameters the escrow is constructed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowParams {
    /// Seconds an OPEN order waits for a courier.
    pub order_expiry_secs: u64,
    /// Seconds a LOCKED order has to be picked up.
    pub pickup_timeout_secs: u64,
    /// Seconds a PICKED_UP order has to be delivered.
    pub delivery_timeout_secs: u64,
    /// Fee and collateral basis points.
    pub fees: FeeSchedule,
    /// Where the package value goes on delivery.
    pub principal_recipient: PrincipalRecipient,
    /// The only identity allowed to resolve disputes. `None` leaves
    /// disputed orders frozen until one is configured.
    pub arbiter: Option<Address>,
}

impl Default for EscrowParams {
    fn default() -> Self {
        Self {
            order_expiry_secs: ORDER_EXPIRY_SECS,
            pickup_timeout_secs: PICKUP_TIMEOUT_SECS,
            delivery_timeout_secs: DELIVERY_TIMEOUT_SECS,
            fees: FeeSchedule::default(),
            principal_recipient: PrincipalRecipient::default(),
            arbiter: None,
        }
    }
}

impl EscrowParams {
    /// Set the dispute arbiter.
    pub fn with_arbiter(mut self, arbiter: Address) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    /// Set the principal recipient policy.
    pub fn with_principal_recipient(mut self, recipient: PrincipalRecipient) -> Self {
        self.principal_recipient = recipient;
        self
    }
}
