//! Order events.
//!
//! Every successful transition appends one event. Consumers (indexers, the
//! node's metrics) drain the log with [`EventLog::drain`]; undrained events
//! stay put.

use hashdrop_protocol::crypto::Address;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::dispute::Resolution;
use crate::order::{OrderId, OrderState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created {
        order_id: OrderId,
        emitter: Address,
        receiver: Address,
        package_value: u64,
        delivery_fee: u64,
        total_deposit: u64,
        at: u64,
    },
    Accepted {
        order_id: OrderId,
        courier: Address,
        collateral: u64,
        at: u64,
    },
    PickedUp {
        order_id: OrderId,
        courier: Address,
        at: u64,
    },
    Delivered {
        order_id: OrderId,
        courier: Address,
        at: u64,
    },
    Cancelled {
        order_id: OrderId,
        at: u64,
    },
    Expired {
        order_id: OrderId,
        from: OrderState,
        at: u64,
    },
    Disputed {
        order_id: OrderId,
        dispute_id: String,
        initiator: Address,
        at: u64,
    },
    EvidenceSubmitted {
        order_id: OrderId,
        dispute_id: String,
        by: Address,
        at: u64,
    },
    DisputeResolved {
        order_id: OrderId,
        dispute_id: String,
        resolution: Resolution,
        outcome: OrderState,
        at: u64,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::Created { order_id, .. }
            | OrderEvent::Accepted { order_id, .. }
            | OrderEvent::PickedUp { order_id, .. }
            | OrderEvent::Delivered { order_id, .. }
            | OrderEvent::Cancelled { order_id, .. }
            | OrderEvent::Expired { order_id, .. }
            | OrderEvent::Disputed { order_id, .. }
            | OrderEvent::EvidenceSubmitted { order_id, .. }
            | OrderEvent::DisputeResolved { order_id, .. } => *order_id,
        }
    }

    /// Short name, used as a metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            OrderEvent::Created { .. } => "created",
            OrderEvent::Accepted { .. } => "accepted",
            OrderEvent::PickedUp { .. } => "picked_up",
            OrderEvent::Delivered { .. } => "delivered",
            OrderEvent::Cancelled { .. } => "cancelled",
            OrderEvent::Expired { .. } => "expired",
            OrderEvent::Disputed { .. } => "disputed",
            OrderEvent::EvidenceSubmitted { .. } => "evidence_submitted",
            OrderEvent::DisputeResolved { .. } => "dispute_resolved",
        }
    }
}

/// Append-only buffer of events awaiting a consumer.
#[derive(Debug, Default)]
pub struct EventLog {
    pending: Mutex<Vec<OrderEvent>>,
}

impl EventLog {
    pub fn push(&self, event: OrderEvent) {
        self.pending.lock().push(event);
    }

    /// Take everything recorded so far.
    pub fn drain(&self) -> Vec<OrderEvent> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_log() {
        let log = EventLog::default();
        log.push(OrderEvent::Cancelled {
            order_id: OrderId(4),
            at: 10,
        });
        assert_eq!(log.len(), 1);
        let events = log.drain();
        assert_eq!(events[0].order_id(), OrderId(4));
        assert_eq!(events[0].name(), "cancelled");
        assert!(log.is_empty());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let e = OrderEvent::Expired {
            order_id: OrderId(2),
            from: OrderState::Locked,
            at: 99,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "expired");
        assert_eq!(json["from"], "LOCKED");
    }
}
