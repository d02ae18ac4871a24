//! # HashDrop Escrow Contracts
//!
//! The order lifecycle of the HashDrop parcel escrow. An order moves
//!
//! ```text
//! OPEN ──accept──▶ LOCKED ──pickup──▶ PICKED_UP ──deliver──▶ DELIVERED
//! │ │               │ │                 │ │
//! │ │               │ └─────dispute─────┼─┴──▶ DISPUTED ──resolve──▶ terminal
//! │ │               │                   │
//! │ └─────expire────┴──────expire───────┴──▶ EXPIRED
//! └──cancel──▶ CANCELLED
//! ```
//!
//! and every arrow settles value through the [`ledger::Ledger`].
//!
//! - **escrow** — [`HashDropEscrow`], the state machine itself.
//! - **order** — The order record, its states and deadlines.
//! - **ledger** — Accounts, atomic transfer batches, the clock.
//! - **dispute** — Dispute records, evidence and rulings.
//! - **events** — One event per successful transition.
//! - **requests** — Typed inputs to each operation.
//!
//! ## Design Principles
//!
//! 1. A rejected operation changes nothing: no state, no balance, no event.
//! 2. States are enum variants, never boolean flags.
//! 3. Every amount that can overflow is checked before money moves.
//! 4. Every public record is serde-serializable.

pub mod dispute;
pub mod error;
pub mod escrow;
pub mod events;
pub mod ledger;
pub mod order;
pub mod params;
pub mod requests;

pub use dispute::{Dispute, DisputeError, DisputeStatus, Evidence, Resolution};
pub use error::{EscrowError, StateError};
pub use escrow::{ExpiryOutcome, HashDropEscrow};
pub use events::{EventLog, OrderEvent};
pub use ledger::{Account, InMemoryLedger, Ledger, LedgerError, Transfer};
pub use order::{Order, OrderId, OrderState};
pub use params::{EscrowParams, PrincipalRecipient};
pub use requests::{
    AcceptOrderRequest, CancelOrderRequest, ConfirmDeliveryRequest, ConfirmPickupRequest,
    CreateOrderRequest, InitiateDisputeRequest, ResolveDisputeRequest, SubmitEvidenceRequest,
};
