//! # Order Model
//!
//! An [`Order`] is created once and then only ever mutated by the escrow's
//! transition handlers. Terminal orders are kept for history; nothing is
//! deleted.
//!
//! ## Lifecycle
//!
//! | From                    | Operation | To |
//! |-------------------------|-----------|----|
//! | OPEN                    | accept    | LOCKED |
//! | OPEN                    | cancel    | CANCELLED |
//! | LOCKED                  | pickup    | PICKED_UP |
//! | PICKED_UP               | deliver   | DELIVERED |
//! | LOCKED, PICKED_UP       | dispute   | DISPUTED |
//! | OPEN, LOCKED, PICKED_UP | expire    | EXPIRED |
//!
//! DISPUTED is left only through the arbiter, into one of the terminal
//! states.

use std::fmt;

use hashdrop_protocol::crypto::Address;
use hashdrop_protocol::fees::FeeBreakdown;
use hashdrop_protocol::zkp::SecretCommitment;
use serde::{Deserialize, Serialize};

use crate::dispute::Dispute;
use crate::params::EscrowParams;

/// Order identifier. Assigned in sequence starting at 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// Created and funded, waiting for a courier.
    Open,
    /// A courier accepted and posted collateral.
    Locked,
    /// The emitter attested the handoff to the courier.
    PickedUp,
    /// Delivery proven. Terminal.
    Delivered,
    /// Frozen pending arbitration.
    Disputed,
    /// Withdrawn by the emitter, or resolved in the emitter's favour. Terminal.
    Cancelled,
    /// A deadline passed. Terminal.
    Expired,
}

impl OrderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Locked => "LOCKED",
            Self::PickedUp => "PICKED_UP",
            Self::Delivered => "DELIVERED",
            Self::Disputed => "DISPUTED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery order and everything escrowed for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,

    // -- Parties ------------------------------------------------------------
    pub emitter: Address,
    pub receiver: Address,
    /// Set once, at acceptance.
    pub courier: Option<Address>,

    // -- Economics ----------------------------------------------------------
    pub package_value: u64,
    pub delivery_fee: u64,
    /// Fee breakdown fixed at creation.
    pub fees: FeeBreakdown,
    /// Zero until acceptance.
    pub courier_collateral: u64,

    // -- Commitments --------------------------------------------------------
    pub secret_commitment: SecretCommitment,
    /// Opaque pickup-region commitment. Carried, never interpreted.
    #[serde(with = "hex32")]
    pub delivery_zone_commitment: [u8; 32],
    /// Pointer to off-ledger encrypted details (CID, URL).
    pub encrypted_details_ref: String,

    // -- Lifecycle ----------------------------------------------------------
    pub state: OrderState,
    pub created_at: u64,
    pub locked_at: Option<u64>,
    pub picked_up_at: Option<u64>,
    /// When a terminal state was reached.
    pub finalized_at: Option<u64>,
    pub dispute: Option<Dispute>,
}

impl Order {
    /// Instant after which the order may be expired in its current state.
    /// `None` outside the live states.
    pub fn deadline(&self, params: &EscrowParams) -> Option<u64> {
        match self.state {
            OrderState::Open => Some(self.created_at.saturating_add(params.order_expiry_secs)),
            OrderState::Locked => self
                .locked_at
                .map(|t| t.saturating_add(params.pickup_timeout_secs)),
            OrderState::PickedUp => self
                .picked_up_at
                .map(|t| t.saturating_add(params.delivery_timeout_secs)),
            _ => None,
        }
    }

    /// `now` is strictly past the current deadline.
    pub fn is_expired(&self, params: &EscrowParams, now: u64) -> bool {
        self.deadline(params).is_some_and(|d| now > d)
    }

    /// Seconds left before the deadline, zero once it has passed.
    pub fn time_remaining(&self, params: &EscrowParams, now: u64) -> Option<u64> {
        self.deadline(params).map(|d| d.saturating_sub(now))
    }

    /// Value currently held in escrow for this order.
    pub fn escrowed_amount(&self) -> u64 {
        if self.state.is_terminal() {
            0
        } else {
            self.fees.total_deposit.saturating_add(self.courier_collateral)
        }
    }
}

mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashdrop_protocol::fees::FeeSchedule;
    use hashdrop_protocol::zkp::{commitment, DeliverySecret, PoseidonHasher};

    fn sample(state: OrderState) -> Order {
        let hasher = PoseidonHasher::new();
        let c = commitment::commit(&hasher, &DeliverySecret::from_field(5u64.into()));
        Order {
            id: OrderId(1),
            emitter: Address::from_bytes([1; 32]),
            receiver: Address::from_bytes([2; 32]),
            courier: None,
            package_value: 1_000,
            delivery_fee: 100,
            fees: FeeSchedule::default().quote(1_000, 100).unwrap(),
            courier_collateral: 0,
            secret_commitment: c,
            delivery_zone_commitment: [9; 32],
            encrypted_details_ref: "ipfs://x".into(),
            state,
            created_at: 1_000,
            locked_at: Some(2_000),
            picked_up_at: Some(3_000),
            finalized_at: None,
            dispute: None,
        }
    }

    #[test]
    fn deadline_per_state() {
        let p = EscrowParams::default();
        assert_eq!(sample(OrderState::Open).deadline(&p), Some(1_000 + 86_400));
        assert_eq!(sample(OrderState::Locked).deadline(&p), Some(2_000 + 7_200));
        assert_eq!(sample(OrderState::PickedUp).deadline(&p), Some(3_000 + 21_600));
        assert_eq!(sample(OrderState::Disputed).deadline(&p), None);
        assert_eq!(sample(OrderState::Delivered).deadline(&p), None);
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let p = EscrowParams::default();
        let o = sample(OrderState::Locked);
        assert!(!o.is_expired(&p, 9_200));
        assert!(o.is_expired(&p, 9_201));
        assert_eq!(o.time_remaining(&p, 9_000), Some(200));
        assert_eq!(o.time_remaining(&p, 10_000), Some(0));
    }

    #[test]
    fn state_names() {
        assert_eq!(OrderState::PickedUp.to_string(), "PICKED_UP");
        assert_eq!(serde_json::to_string(&OrderState::PickedUp).unwrap(), "\"PICKED_UP\"");
        assert!(OrderState::Expired.is_terminal());
        assert!(!OrderState::Disputed.is_terminal());
    }

    #[test]
    fn escrowed_amount_drops_to_zero_when_terminal() {
        let mut o = sample(OrderState::Locked);
        o.courier_collateral = 1_100;
        assert_eq!(o.escrowed_amount(), o.fees.total_deposit + 1_100);
        o.state = OrderState::Delivered;
        assert_eq!(o.escrowed_amount(), 0);
    }

    #[test]
    fn order_json_round_trip() {
        let o = sample(OrderState::Open);
        let json = serde_json::to_string(&o).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.delivery_zone_commitment, [9; 32]);
        assert_eq!(back.secret_commitment, o.secret_commitment);
        assert_eq!(back.state, OrderState::Open);
    }
}
