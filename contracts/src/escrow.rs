//! # HashDrop Escrow
//!
//! The order state machine. It owns every order, enforces the legal
//! transitions, and drives settlement through the [`Ledger`].
//!
//! ## Concurrency
//!
//! Each order sits behind its own mutex. A transition takes the lock, reads
//! the ledger clock, evaluates its guards, settles, and only then mutates
//! the order. Two racing operations on one order serialize; the loser sees
//! the winner's result and fails its guard. Operations on different orders
//! never contend, except order creation, which serializes on the id counter
//! so ids stay gapless.
//!
//! Proof *generation* never happens here. Couriers build proofs first and
//! submit them; only the verification runs under the lock.
//!
//! ## Settlement
//!
//! | Transition                 | Movements |
//! |----------------------------|-----------|
//! | create                     | emitter → escrow: total deposit |
//! | accept                     | courier → escrow: collateral |
//! | cancel, expire(OPEN)       | escrow → emitter: total deposit |
//! | expire(LOCKED)             | + escrow → courier: collateral |
//! | confirm delivery           | courier: fee + collateral; treasury: protocol fee; insurance: insurance fee; principal recipient: package value |
//! | expire(PICKED_UP)          | emitter: total deposit + package value out of collateral; insurance: rest of collateral |
//!
//! After any terminal state the order's escrow account holds zero.

use std::sync::Arc;

use dashmap::DashMap;
use hashdrop_protocol::crypto::{Address, Ed25519Scheme, SignatureScheme};
use hashdrop_protocol::fees::validate_package_value;
use hashdrop_protocol::pickup;
use hashdrop_protocol::zkp::{commitment, verify_delivery, CommitmentHasher, PoseidonHasher, ProofVerifier};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dispute::{Dispute, DisputeError, DisputeStatus, Resolution};
use crate::error::{EscrowError, StateError};
use crate::events::{EventLog, OrderEvent};
use crate::ledger::{Account, Ledger, Transfer};
use crate::order::{Order, OrderId, OrderState};
use crate::params::{EscrowParams, PrincipalRecipient};
use crate::requests::{
    AcceptOrderRequest, CancelOrderRequest, ConfirmDeliveryRequest, ConfirmPickupRequest,
    CreateOrderRequest, InitiateDisputeRequest, ResolveDisputeRequest, SubmitEvidenceRequest,
};

/// Result of [`HashDropEscrow::expire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "state")]
pub enum ExpiryOutcome {
    /// The order moved to EXPIRED.
    Expired,
    /// The order was already terminal. Nothing changed.
    AlreadyFinal(OrderState),
}

/// The escrow.
pub struct HashDropEscrow {
    params: EscrowParams,
    ledger: Arc<dyn Ledger>,
    signatures: Arc<dyn SignatureScheme>,
    hasher: Arc<dyn CommitmentHasher>,
    proofs: Arc<dyn ProofVerifier>,

    orders: DashMap<OrderId, Arc<Mutex<Order>>>,
    by_user: DashMap<Address, Vec<OrderId>>,
    next_id: Mutex<u64>,
    events: EventLog,
}

impl HashDropEscrow {
    /// New escrow with Ed25519 pickup signatures and Poseidon commitments.
    pub fn new(
        params: EscrowParams,
        ledger: Arc<dyn Ledger>,
        proofs: Arc<dyn ProofVerifier>,
    ) -> Self {
        Self {
            params,
            ledger,
            signatures: Arc::new(Ed25519Scheme),
            hasher: Arc::new(PoseidonHasher::new()),
            proofs,
            orders: DashMap::new(),
            by_user: DashMap::new(),
            next_id: Mutex::new(1),
            events: EventLog::default(),
        }
    }

    /// Replace the pickup signature scheme.
    pub fn with_signature_scheme(mut self, scheme: Arc<dyn SignatureScheme>) -> Self {
        self.signatures = scheme;
        self
    }

    /// Replace the hasher used to check revealed secrets.
    pub fn with_commitment_hasher(mut self, hasher: Arc<dyn CommitmentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Create an order and escrow the emitter's total deposit.
    pub fn create_order(&self, req: CreateOrderRequest) -> Result<OrderId, EscrowError> {
        let result = self.try_create_order(req);
        self.observe("create_order", None, result)
    }

    /// OPEN → LOCKED. The courier posts collateral.
    pub fn accept_order(&self, req: AcceptOrderRequest) -> Result<(), EscrowError> {
        let result = self.try_accept_order(req);
        self.observe("accept_order", Some(req.order_id), result)
    }

    /// LOCKED → PICKED_UP on a valid emitter attestation.
    pub fn confirm_pickup(&self, req: ConfirmPickupRequest) -> Result<(), EscrowError> {
        let id = req.order_id;
        let result = self.try_confirm_pickup(req);
        self.observe("confirm_pickup", Some(id), result)
    }

    /// PICKED_UP → DELIVERED on a valid secret and delivery proof.
    pub fn confirm_delivery(&self, req: ConfirmDeliveryRequest) -> Result<(), EscrowError> {
        let id = req.order_id;
        let result = self.try_confirm_delivery(req);
        self.observe("confirm_delivery", Some(id), result)
    }

    /// OPEN → CANCELLED. Emitter only.
    pub fn cancel_order(&self, req: CancelOrderRequest) -> Result<(), EscrowError> {
        let result = self.try_cancel_order(req);
        self.observe("cancel_order", Some(req.order_id), result)
    }

    /// LOCKED | PICKED_UP → DISPUTED. Returns the dispute id.
    pub fn initiate_dispute(&self, req: InitiateDisputeRequest) -> Result<String, EscrowError> {
        let id = req.order_id;
        let result = self.try_initiate_dispute(req);
        self.observe("initiate_dispute", Some(id), result)
    }

    /// Attach evidence to an open dispute.
    pub fn submit_dispute_evidence(&self, req: SubmitEvidenceRequest) -> Result<(), EscrowError> {
        let id = req.order_id;
        let result = self.try_submit_evidence(req);
        self.observe("submit_dispute_evidence", Some(id), result)
    }

    /// DISPUTED → terminal, by the configured arbiter.
    pub fn resolve_dispute(&self, req: ResolveDisputeRequest) -> Result<OrderState, EscrowError> {
        let result = self.try_resolve_dispute(req);
        self.observe("resolve_dispute", Some(req.order_id), result)
    }

    /// Expire an order whose deadline has passed. Anyone may call this, any
    /// number of times; on a terminal order it is a no-op.
    pub fn expire(&self, order_id: OrderId) -> Result<ExpiryOutcome, EscrowError> {
        let result = self.try_expire(order_id);
        self.observe("expire", Some(order_id), result)
    }

    /// Expire every order past its deadline. Returns the ids that moved.
    pub fn sweep_expired(&self) -> Vec<OrderId> {
        let now = self.ledger.now();
        let handles: Vec<(OrderId, Arc<Mutex<Order>>)> = self
            .orders
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();

        let mut expired = Vec::new();
        for (id, handle) in handles {
            if !handle.lock().is_expired(&self.params, now) {
                continue;
            }
            match self.expire(id) {
                Ok(ExpiryOutcome::Expired) => expired.push(id),
                Ok(ExpiryOutcome::AlreadyFinal(_)) => {}
                // Logged by `observe`; a raced transition is not a failure.
                Err(_) => {}
            }
        }
        expired.sort();
        expired
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Snapshot of an order.
    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).map(|e| e.value().lock().clone())
    }

    /// Collateral a courier must post to accept `order_id`.
    pub fn get_required_collateral(&self, order_id: OrderId) -> Result<u64, EscrowError> {
        let order = self.get_order(order_id).ok_or(StateError::NotFound(order_id))?;
        Ok(self.params.fees.required_collateral(order.package_value)?)
    }

    /// Whether `order_id` is past its current deadline right now.
    pub fn is_expired(&self, order_id: OrderId) -> Result<bool, EscrowError> {
        let handle = self.handle(order_id)?;
        let now = self.ledger.now();
        let expired = handle.lock().is_expired(&self.params, now);
        Ok(expired)
    }

    /// Every order in which `who` is emitter, receiver or courier, ascending.
    pub fn user_orders(&self, who: &Address) -> Vec<OrderId> {
        let mut ids = self
            .by_user
            .get(who)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// The id the next created order will get.
    pub fn next_order_id(&self) -> OrderId {
        OrderId(*self.next_id.lock())
    }

    /// Drain the event log.
    pub fn take_events(&self) -> Vec<OrderEvent> {
        self.events.drain()
    }

    /// Number of orders in each state.
    pub fn state_counts(&self) -> Vec<(OrderState, usize)> {
        let mut counts: Vec<(OrderState, usize)> = Vec::new();
        for entry in self.orders.iter() {
            let state = entry.value().lock().state;
            match counts.iter_mut().find(|(s, _)| *s == state) {
                Some((_, n)) => *n += 1,
                None => counts.push((state, 1)),
            }
        }
        counts
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn params(&self) -> &EscrowParams {
        &self.params
    }

    /// Current ledger time.
    pub fn now(&self) -> u64 {
        self.ledger.now()
    }

    // -----------------------------------------------------------------------
    // Transition bodies
    // -----------------------------------------------------------------------

    fn try_create_order(&self, req: CreateOrderRequest) -> Result<OrderId, EscrowError> {
        req.validate()?;
        validate_package_value(req.package_value)?;
        let fees = self.params.fees.quote(req.package_value, req.delivery_fee)?;
        // Acceptance must never fail on arithmetic.
        self.params.fees.required_collateral(req.package_value)?;

        let mut next = self.next_id.lock();
        let id = OrderId(*next);
        let following = next
            .checked_add(1)
            .ok_or_else(|| EscrowError::InvalidRequest("order id space exhausted".into()))?;
        let now = self.ledger.now();

        self.ledger.settle(&[Transfer::new(
            Account::Party(req.emitter),
            Account::Escrow(id),
            fees.total_deposit,
        )])?;
        *next = following;

        let order = Order {
            id,
            emitter: req.emitter,
            receiver: req.receiver,
            courier: None,
            package_value: req.package_value,
            delivery_fee: req.delivery_fee,
            fees,
            courier_collateral: 0,
            secret_commitment: req.secret_commitment,
            delivery_zone_commitment: req.delivery_zone_commitment,
            encrypted_details_ref: req.encrypted_details_ref,
            state: OrderState::Open,
            created_at: now,
            locked_at: None,
            picked_up_at: None,
            finalized_at: None,
            dispute: None,
        };
        self.orders.insert(id, Arc::new(Mutex::new(order)));
        drop(next);

        self.index(req.emitter, id);
        self.index(req.receiver, id);
        self.events.push(OrderEvent::Created {
            order_id: id,
            emitter: req.emitter,
            receiver: req.receiver,
            package_value: req.package_value,
            delivery_fee: req.delivery_fee,
            total_deposit: fees.total_deposit,
            at: now,
        });
        info!(
            order_id = %id,
            state = %OrderState::Open,
            package_value = req.package_value,
            total_deposit = fees.total_deposit,
            "order created"
        );
        Ok(id)
    }

    fn try_accept_order(&self, req: AcceptOrderRequest) -> Result<(), EscrowError> {
        let handle = self.handle(req.order_id)?;
        let mut order = handle.lock();
        let now = self.ledger.now();

        require_state(&order, OrderState::Open)?;
        if req.courier == order.emitter || req.courier == order.receiver {
            return Err(StateError::Unauthorized {
                order_id: order.id,
                caller: req.courier,
                role: "an independent courier",
            }
            .into());
        }
        self.require_before_deadline(&order, now)?;

        let collateral = self.params.fees.required_collateral(order.package_value)?;
        self.ledger.settle(&[Transfer::new(
            Account::Party(req.courier),
            Account::Escrow(order.id),
            collateral,
        )])?;

        order.courier = Some(req.courier);
        order.courier_collateral = collateral;
        order.locked_at = Some(now);
        order.state = OrderState::Locked;

        self.index(req.courier, order.id);
        self.events.push(OrderEvent::Accepted {
            order_id: order.id,
            courier: req.courier,
            collateral,
            at: now,
        });
        info!(order_id = %order.id, state = %order.state, courier = %req.courier, collateral, "order accepted");
        Ok(())
    }

    fn try_confirm_pickup(&self, req: ConfirmPickupRequest) -> Result<(), EscrowError> {
        let handle = self.handle(req.order_id)?;
        let mut order = handle.lock();
        let now = self.ledger.now();

        require_state(&order, OrderState::Locked)?;
        require_courier(&order, &req.courier)?;
        self.require_before_deadline(&order, now)?;

        if !pickup::verify(
            self.signatures.as_ref(),
            &req.signature,
            order.id.0,
            &req.courier,
            &order.emitter,
            now,
        ) {
            return Err(EscrowError::CryptoVerification(
                "pickup attestation rejected".into(),
            ));
        }

        order.picked_up_at = Some(now);
        order.state = OrderState::PickedUp;

        self.events.push(OrderEvent::PickedUp {
            order_id: order.id,
            courier: req.courier,
            at: now,
        });
        info!(order_id = %order.id, state = %order.state, courier = %req.courier, "pickup confirmed");
        Ok(())
    }

    fn try_confirm_delivery(&self, req: ConfirmDeliveryRequest) -> Result<(), EscrowError> {
        let handle = self.handle(req.order_id)?;
        let mut order = handle.lock();
        let now = self.ledger.now();

        require_state(&order, OrderState::PickedUp)?;
        require_courier(&order, &req.courier)?;
        self.require_before_deadline(&order, now)?;

        if !commitment::verify(self.hasher.as_ref(), &req.secret, &order.secret_commitment) {
            return Err(EscrowError::CryptoVerification(
                "revealed secret does not open the commitment".into(),
            ));
        }
        let valid = verify_delivery(
            self.proofs.as_ref(),
            &req.proof,
            &req.signals,
            order.id.0,
            &req.courier,
            &order.secret_commitment,
        )?;
        if !valid {
            return Err(EscrowError::CryptoVerification(
                "delivery proof rejected".into(),
            ));
        }

        self.ledger
            .settle(&self.delivery_settlement(&order, req.courier))?;

        order.state = OrderState::Delivered;
        order.finalized_at = Some(now);

        self.events.push(OrderEvent::Delivered {
            order_id: order.id,
            courier: req.courier,
            at: now,
        });
        info!(
            order_id = %order.id,
            state = %order.state,
            courier = %req.courier,
            delivery_fee = order.delivery_fee,
            collateral = order.courier_collateral,
            "delivery confirmed"
        );
        Ok(())
    }

    fn try_cancel_order(&self, req: CancelOrderRequest) -> Result<(), EscrowError> {
        let handle = self.handle(req.order_id)?;
        let mut order = handle.lock();
        let now = self.ledger.now();

        require_state(&order, OrderState::Open)?;
        if req.caller != order.emitter {
            return Err(StateError::Unauthorized {
                order_id: order.id,
                caller: req.caller,
                role: "the emitter",
            }
            .into());
        }

        self.ledger.settle(&refund(&order))?;

        order.state = OrderState::Cancelled;
        order.finalized_at = Some(now);

        self.events.push(OrderEvent::Cancelled {
            order_id: order.id,
            at: now,
        });
        info!(order_id = %order.id, state = %order.state, refund = order.fees.total_deposit, "order cancelled");
        Ok(())
    }

    fn try_initiate_dispute(&self, req: InitiateDisputeRequest) -> Result<String, EscrowError> {
        req.validate()?;
        let handle = self.handle(req.order_id)?;
        let mut order = handle.lock();
        let now = self.ledger.now();

        let frozen_state = order.state;
        let courier = match (frozen_state, order.courier) {
            (OrderState::Locked | OrderState::PickedUp, Some(courier)) => courier,
            _ => {
                return Err(StateError::WrongState {
                    order_id: order.id,
                    current: frozen_state,
                    expected: "LOCKED or PICKED_UP",
                }
                .into())
            }
        };

        let respondent = if req.caller == order.emitter {
            courier
        } else if req.caller == courier {
            order.emitter
        } else {
            return Err(StateError::Unauthorized {
                order_id: order.id,
                caller: req.caller,
                role: "the emitter or courier",
            }
            .into());
        };
        // An order that can already expire is settled by `expire`.
        self.require_before_deadline(&order, now)?;

        let dispute = Dispute::open(
            order.id,
            req.caller,
            respondent,
            order.receiver,
            req.reason.trim().to_string(),
            frozen_state,
            now,
        );
        let dispute_id = dispute.id.clone();
        order.dispute = Some(dispute);
        order.state = OrderState::Disputed;

        self.events.push(OrderEvent::Disputed {
            order_id: order.id,
            dispute_id: dispute_id.clone(),
            initiator: req.caller,
            at: now,
        });
        info!(
            order_id = %order.id,
            state = %order.state,
            frozen = %frozen_state,
            dispute_id = %dispute_id,
            "dispute opened"
        );
        Ok(dispute_id)
    }

    fn try_submit_evidence(&self, req: SubmitEvidenceRequest) -> Result<(), EscrowError> {
        req.validate()?;
        let handle = self.handle(req.order_id)?;
        let mut order = handle.lock();
        let now = self.ledger.now();

        let order_id = order.id;
        let current = order.state;
        let dispute = match (current, order.dispute.as_mut()) {
            (OrderState::Disputed, Some(dispute)) => dispute,
            _ => {
                return Err(StateError::WrongState {
                    order_id,
                    current,
                    expected: "DISPUTED",
                }
                .into())
            }
        };

        dispute
            .submit_evidence(&req.caller, req.description, req.data_hash, now)
            .map_err(|source| StateError::Dispute { order_id, source })?;
        let dispute_id = dispute.id.clone();

        self.events.push(OrderEvent::EvidenceSubmitted {
            order_id,
            dispute_id,
            by: req.caller,
            at: now,
        });
        debug!(order_id = %order_id, by = %req.caller, "dispute evidence submitted");
        Ok(())
    }

    fn try_resolve_dispute(&self, req: ResolveDisputeRequest) -> Result<OrderState, EscrowError> {
        if self.params.arbiter != Some(req.arbiter) {
            return Err(StateError::Unauthorized {
                order_id: req.order_id,
                caller: req.arbiter,
                role: "the arbiter",
            }
            .into());
        }

        let handle = self.handle(req.order_id)?;
        let mut order = handle.lock();
        let now = self.ledger.now();

        let (mut dispute, courier) = match (order.state, order.dispute.as_ref(), order.courier) {
            (OrderState::Disputed, Some(d), Some(c)) if d.status != DisputeStatus::Resolved => {
                (d.clone(), c)
            }
            (OrderState::Disputed, Some(_), Some(_)) => {
                return Err(StateError::Dispute {
                    order_id: order.id,
                    source: DisputeError::AlreadyResolved,
                }
                .into())
            }
            (current, _, _) => {
                return Err(StateError::WrongState {
                    order_id: order.id,
                    current,
                    expected: "DISPUTED",
                }
                .into())
            }
        };

        dispute
            .resolve(req.resolution, now)
            .map_err(|source| StateError::Dispute {
                order_id: order.id,
                source,
            })?;

        let transfers = match req.resolution {
            Resolution::ForCourier => self.delivery_settlement(&order, courier),
            Resolution::ForEmitter => refund_with_collateral(&order, courier),
            Resolution::CourierAtFault => forfeit(&order),
        };
        self.ledger.settle(&transfers)?;

        let outcome = req.resolution.outcome();
        let dispute_id = dispute.id.clone();
        order.dispute = Some(dispute);
        order.state = outcome;
        order.finalized_at = Some(now);

        self.events.push(OrderEvent::DisputeResolved {
            order_id: order.id,
            dispute_id,
            resolution: req.resolution,
            outcome,
            at: now,
        });
        info!(
            order_id = %order.id,
            state = %order.state,
            resolution = %req.resolution,
            "dispute resolved"
        );
        Ok(outcome)
    }

    fn try_expire(&self, order_id: OrderId) -> Result<ExpiryOutcome, EscrowError> {
        let handle = self.handle(order_id)?;
        let mut order = handle.lock();
        let now = self.ledger.now();

        let from = order.state;
        if from.is_terminal() {
            debug!(order_id = %order_id, state = %from, "expire on terminal order is a no-op");
            return Ok(ExpiryOutcome::AlreadyFinal(from));
        }
        if from == OrderState::Disputed {
            return Err(StateError::Frozen { order_id }.into());
        }

        let deadline = order.deadline(&self.params).ok_or(StateError::WrongState {
            order_id,
            current: from,
            expected: "OPEN, LOCKED or PICKED_UP",
        })?;
        if now <= deadline {
            return Err(StateError::DeadlineNotReached {
                order_id,
                deadline,
                now,
            }
            .into());
        }

        let transfers = match (from, order.courier) {
            (OrderState::Open, _) => refund(&order),
            (OrderState::Locked, Some(courier)) => refund_with_collateral(&order, courier),
            (OrderState::PickedUp, Some(_)) => forfeit(&order),
            _ => {
                return Err(StateError::WrongState {
                    order_id,
                    current: from,
                    expected: "OPEN, LOCKED or PICKED_UP",
                }
                .into())
            }
        };
        self.ledger.settle(&transfers)?;

        order.state = OrderState::Expired;
        order.finalized_at = Some(now);

        self.events.push(OrderEvent::Expired {
            order_id,
            from,
            at: now,
        });
        info!(order_id = %order_id, state = %order.state, from = %from, "order expired");
        Ok(ExpiryOutcome::Expired)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn handle(&self, order_id: OrderId) -> Result<Arc<Mutex<Order>>, StateError> {
        self.orders
            .get(&order_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(StateError::NotFound(order_id))
    }

    fn index(&self, who: Address, order_id: OrderId) {
        self.by_user.entry(who).or_default().push(order_id);
    }

    fn require_before_deadline(&self, order: &Order, now: u64) -> Result<(), StateError> {
        match order.deadline(&self.params) {
            Some(deadline) if now > deadline => Err(StateError::DeadlinePassed {
                order_id: order.id,
                deadline,
                now,
            }),
            _ => Ok(()),
        }
    }

    fn delivery_settlement(&self, order: &Order, courier: Address) -> Vec<Transfer> {
        let escrow = Account::Escrow(order.id);
        let principal_to = match self.params.principal_recipient {
            PrincipalRecipient::Emitter => order.emitter,
            PrincipalRecipient::Receiver => order.receiver,
        };
        non_zero(vec![
            Transfer::new(escrow, Account::Party(courier), order.fees.delivery_fee),
            Transfer::new(escrow, Account::Party(courier), order.courier_collateral),
            Transfer::new(escrow, Account::Treasury, order.fees.protocol_fee),
            Transfer::new(escrow, Account::InsurancePool, order.fees.insurance_fee),
            Transfer::new(escrow, Account::Party(principal_to), order.fees.package_value),
        ])
    }

    fn observe<T>(
        &self,
        op: &'static str,
        order_id: Option<OrderId>,
        result: Result<T, EscrowError>,
    ) -> Result<T, EscrowError> {
        if let Err(err) = &result {
            if err.is_retryable() {
                warn!(op, order_id = ?order_id, error = %err, "collaborator failure");
            } else {
                debug!(op, order_id = ?order_id, kind = err.kind(), error = %err, "operation rejected");
            }
        }
        result
    }
}

fn require_state(order: &Order, expected: OrderState) -> Result<(), StateError> {
    if order.state == expected {
        return Ok(());
    }
    if order.state == OrderState::Disputed {
        return Err(StateError::Frozen { order_id: order.id });
    }
    Err(StateError::WrongState {
        order_id: order.id,
        current: order.state,
        expected: expected.as_str(),
    })
}

fn require_courier(order: &Order, caller: &Address) -> Result<(), StateError> {
    if order.courier.as_ref() == Some(caller) {
        Ok(())
    } else {
        Err(StateError::Unauthorized {
            order_id: order.id,
            caller: *caller,
            role: "the courier",
        })
    }
}

/// Full deposit back to the emitter.
fn refund(order: &Order) -> Vec<Transfer> {
    non_zero(vec![Transfer::new(
        Account::Escrow(order.id),
        Account::Party(order.emitter),
        order.fees.total_deposit,
    )])
}

/// Full deposit back to the emitter, collateral back to the courier.
fn refund_with_collateral(order: &Order, courier: Address) -> Vec<Transfer> {
    let mut transfers = refund(order);
    transfers.extend(non_zero(vec![Transfer::new(
        Account::Escrow(order.id),
        Account::Party(courier),
        order.courier_collateral,
    )]));
    transfers
}

/// Deposit back to the emitter, who is also compensated the package value
/// out of the collateral. The rest of the collateral goes to insurance.
fn forfeit(order: &Order) -> Vec<Transfer> {
    let escrow = Account::Escrow(order.id);
    let compensation = order.package_value.min(order.courier_collateral);
    let remainder = order.courier_collateral - compensation;
    let mut transfers = refund(order);
    transfers.extend(non_zero(vec![
        Transfer::new(escrow, Account::Party(order.emitter), compensation),
        Transfer::new(escrow, Account::InsurancePool, remainder),
    ]));
    transfers
}

fn non_zero(transfers: Vec<Transfer>) -> Vec<Transfer> {
    transfers.into_iter().filter(|t| t.amount > 0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use hashdrop_protocol::crypto::{Keypair, Signature};
    use hashdrop_protocol::zkp::{
        CircuitId, DeliveryProof, DeliverySecret, Fr, ProofSystemError, PublicSignals,
        SecretCommitment,
    };

    const T0: u64 = 1_700_000_000;

    /// Accepts any proof whose signals match; the real Groth16 path is
    /// covered by the lifecycle tests.
    struct AcceptAll(CircuitId);

    impl ProofVerifier for AcceptAll {
        fn circuit_id(&self) -> &CircuitId {
            &self.0
        }

        fn verify(
            &self,
            _circuit_id: &CircuitId,
            _proof: &DeliveryProof,
            _signals: &PublicSignals,
        ) -> Result<bool, ProofSystemError> {
            Ok(true)
        }
    }

    struct Fixture {
        escrow: HashDropEscrow,
        ledger: Arc<InMemoryLedger>,
        emitter: Keypair,
        receiver: Address,
        courier: Address,
        secret: DeliverySecret,
        commitment: SecretCommitment,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new(T0));
        let emitter = Keypair::from_seed(&[1; 32]);
        let receiver = Keypair::from_seed(&[2; 32]).address();
        let courier = Keypair::from_seed(&[3; 32]).address();
        ledger.mint(Account::Party(emitter.address()), 1_000_000_000);
        ledger.mint(Account::Party(courier), 1_000_000_000);

        let secret = DeliverySecret::from_field(42u64.into());
        let commitment = commitment::commit(&PoseidonHasher::new(), &secret);
        let escrow = HashDropEscrow::new(
            EscrowParams::default(),
            ledger.clone(),
            Arc::new(AcceptAll(CircuitId::delivery_v1())),
        );
        Fixture {
            escrow,
            ledger,
            emitter,
            receiver,
            courier,
            secret,
            commitment,
        }
    }

    fn create(f: &Fixture) -> OrderId {
        f.escrow
            .create_order(CreateOrderRequest {
                emitter: f.emitter.address(),
                receiver: f.receiver,
                package_value: 5_000_000,
                delivery_fee: 1_000_000,
                secret_commitment: f.commitment,
                delivery_zone_commitment: [0; 32],
                encrypted_details_ref: "ipfs://details".into(),
            })
            .unwrap()
    }

    fn accept(f: &Fixture, id: OrderId) {
        f.escrow
            .accept_order(AcceptOrderRequest {
                order_id: id,
                courier: f.courier,
            })
            .unwrap();
    }

    fn pickup(f: &Fixture, id: OrderId) -> Result<(), EscrowError> {
        let signature =
            pickup::sign(&Ed25519Scheme, &f.emitter, id.0, &f.courier, f.ledger.now());
        f.escrow.confirm_pickup(ConfirmPickupRequest {
            order_id: id,
            courier: f.courier,
            signature,
        })
    }

    fn deliver(f: &Fixture, id: OrderId) -> Result<(), EscrowError> {
        f.escrow.confirm_delivery(ConfirmDeliveryRequest {
            order_id: id,
            courier: f.courier,
            secret: f.secret.clone(),
            proof: DeliveryProof::from_bytes(CircuitId::delivery_v1(), vec![0u8; 8]),
            signals: PublicSignals {
                commitment: f.commitment,
                order_id: id.0,
                courier: f.courier,
            },
        })
    }

    #[test]
    fn ids_start_at_one_and_are_gapless() {
        let f = fixture();
        assert_eq!(f.escrow.next_order_id(), OrderId(1));
        assert_eq!(create(&f), OrderId(1));
        assert_eq!(create(&f), OrderId(2));
        assert_eq!(f.escrow.next_order_id(), OrderId(3));
    }

    #[test]
    fn failed_create_does_not_consume_an_id() {
        let f = fixture();
        let broke = Keypair::from_seed(&[9; 32]).address();
        let err = f
            .escrow
            .create_order(CreateOrderRequest {
                emitter: broke,
                receiver: f.receiver,
                package_value: 5_000_000,
                delivery_fee: 0,
                secret_commitment: f.commitment,
                delivery_zone_commitment: [0; 32],
                encrypted_details_ref: String::new(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(f.escrow.next_order_id(), OrderId(1));
        assert_eq!(create(&f), OrderId(1));
    }

    #[test]
    fn zero_package_value_is_arithmetic_error() {
        let f = fixture();
        let err = f
            .escrow
            .create_order(CreateOrderRequest {
                emitter: f.emitter.address(),
                receiver: f.receiver,
                package_value: 0,
                delivery_fee: 10,
                secret_commitment: f.commitment,
                delivery_zone_commitment: [0; 32],
                encrypted_details_ref: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::Arithmetic(_)));
        assert_eq!(f.escrow.order_count(), 0);
    }

    #[test]
    fn emitter_cannot_courier_own_order() {
        let f = fixture();
        let id = create(&f);
        let err = f
            .escrow
            .accept_order(AcceptOrderRequest {
                order_id: id,
                courier: f.emitter.address(),
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::State(StateError::Unauthorized { .. })));
        let err = f
            .escrow
            .accept_order(AcceptOrderRequest {
                order_id: id,
                courier: f.receiver,
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::State(StateError::Unauthorized { .. })));
        assert_eq!(f.escrow.get_order(id).unwrap().state, OrderState::Open);
    }

    #[test]
    fn accept_after_open_expiry_fails() {
        let f = fixture();
        let id = create(&f);
        f.ledger.advance(86_401);
        let err = f
            .escrow
            .accept_order(AcceptOrderRequest {
                order_id: id,
                courier: f.courier,
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::State(StateError::DeadlinePassed { .. })));
    }

    #[test]
    fn pickup_from_stranger_rejected() {
        let f = fixture();
        let id = create(&f);
        accept(&f, id);
        let stranger = Keypair::from_seed(&[8; 32]);
        let signature = pickup::sign(&Ed25519Scheme, &stranger, id.0, &f.courier, T0);
        let err = f
            .escrow
            .confirm_pickup(ConfirmPickupRequest {
                order_id: id,
                courier: f.courier,
                signature,
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::CryptoVerification(_)));
        assert_eq!(f.escrow.get_order(id).unwrap().state, OrderState::Locked);
    }

    #[test]
    fn wrong_secret_rejected_before_proof() {
        let f = fixture();
        let id = create(&f);
        accept(&f, id);
        pickup(&f, id).unwrap();
        let err = f
            .escrow
            .confirm_delivery(ConfirmDeliveryRequest {
                order_id: id,
                courier: f.courier,
                secret: DeliverySecret::from_field(43u64.into()),
                proof: DeliveryProof::from_bytes(CircuitId::delivery_v1(), vec![0u8; 8]),
                signals: PublicSignals {
                    commitment: f.commitment,
                    order_id: id.0,
                    courier: f.courier,
                },
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::CryptoVerification(_)));
        assert_eq!(f.escrow.get_order(id).unwrap().state, OrderState::PickedUp);
    }

    #[test]
    fn signals_for_another_order_rejected() {
        let f = fixture();
        let id = create(&f);
        accept(&f, id);
        pickup(&f, id).unwrap();
        let err = f
            .escrow
            .confirm_delivery(ConfirmDeliveryRequest {
                order_id: id,
                courier: f.courier,
                secret: f.secret.clone(),
                proof: DeliveryProof::from_bytes(CircuitId::delivery_v1(), vec![0u8; 8]),
                signals: PublicSignals {
                    commitment: f.commitment,
                    order_id: id.0 + 1,
                    courier: f.courier,
                },
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::CryptoVerification(_)));
    }

    #[test]
    fn ledger_outage_is_retryable_and_changes_nothing() {
        let f = fixture();
        let id = create(&f);
        f.ledger.set_offline(true);
        let err = f
            .escrow
            .accept_order(AcceptOrderRequest {
                order_id: id,
                courier: f.courier,
            })
            .unwrap_err();
        assert!(err.is_retryable());
        let order = f.escrow.get_order(id).unwrap();
        assert_eq!(order.state, OrderState::Open);
        assert!(order.courier.is_none());
        assert_eq!(order.courier_collateral, 0);

        f.ledger.set_offline(false);
        accept(&f, id);
        assert_eq!(f.escrow.get_order(id).unwrap().state, OrderState::Locked);
    }

    #[test]
    fn expire_before_deadline_is_state_error() {
        let f = fixture();
        let id = create(&f);
        let err = f.escrow.expire(id).unwrap_err();
        assert!(matches!(
            err,
            EscrowError::State(StateError::DeadlineNotReached { deadline, .. }) if deadline == T0 + 86_400
        ));
        // Exactly at the deadline is still too early.
        f.ledger.set_time(T0 + 86_400);
        assert!(f.escrow.expire(id).is_err());
        f.ledger.advance(1);
        assert_eq!(f.escrow.expire(id).unwrap(), ExpiryOutcome::Expired);
    }

    #[test]
    fn expire_is_idempotent_on_terminal_orders() {
        let f = fixture();
        let id = create(&f);
        f.escrow
            .cancel_order(CancelOrderRequest {
                order_id: id,
                caller: f.emitter.address(),
            })
            .unwrap();
        for _ in 0..3 {
            assert_eq!(
                f.escrow.expire(id).unwrap(),
                ExpiryOutcome::AlreadyFinal(OrderState::Cancelled)
            );
        }
    }

    #[test]
    fn only_emitter_cancels() {
        let f = fixture();
        let id = create(&f);
        let err = f
            .escrow
            .cancel_order(CancelOrderRequest {
                order_id: id,
                caller: f.receiver,
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::State(StateError::Unauthorized { .. })));
    }

    #[test]
    fn receiver_cannot_open_dispute() {
        let f = fixture();
        let id = create(&f);
        accept(&f, id);
        let err = f
            .escrow
            .initiate_dispute(InitiateDisputeRequest {
                order_id: id,
                caller: f.receiver,
                reason: "late".into(),
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::State(StateError::Unauthorized { .. })));
    }

    #[test]
    fn dispute_on_open_order_rejected() {
        let f = fixture();
        let id = create(&f);
        let err = f
            .escrow
            .initiate_dispute(InitiateDisputeRequest {
                order_id: id,
                caller: f.emitter.address(),
                reason: "changed my mind".into(),
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::State(StateError::WrongState { .. })));
    }

    #[test]
    fn resolve_requires_configured_arbiter() {
        let f = fixture();
        let id = create(&f);
        accept(&f, id);
        f.escrow
            .initiate_dispute(InitiateDisputeRequest {
                order_id: id,
                caller: f.courier,
                reason: "emitter unreachable".into(),
            })
            .unwrap();
        let err = f
            .escrow
            .resolve_dispute(ResolveDisputeRequest {
                order_id: id,
                arbiter: f.emitter.address(),
                resolution: Resolution::ForEmitter,
            })
            .unwrap_err();
        assert!(matches!(err, EscrowError::State(StateError::Unauthorized { .. })));
        assert_eq!(f.escrow.get_order(id).unwrap().state, OrderState::Disputed);
    }

    #[test]
    fn user_index_covers_all_roles() {
        let f = fixture();
        let id = create(&f);
        accept(&f, id);
        assert_eq!(f.escrow.user_orders(&f.emitter.address()), vec![id]);
        assert_eq!(f.escrow.user_orders(&f.receiver), vec![id]);
        assert_eq!(f.escrow.user_orders(&f.courier), vec![id]);
        assert!(f.escrow.user_orders(&Address::from_bytes([0; 32])).is_empty());
    }

    #[test]
    fn events_follow_transitions() {
        let f = fixture();
        let id = create(&f);
        accept(&f, id);
        pickup(&f, id).unwrap();
        deliver(&f, id).unwrap();
        let names: Vec<&str> = f.escrow.take_events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["created", "accepted", "picked_up", "delivered"]);
        assert!(f.escrow.take_events().is_empty());
    }

    #[test]
    fn rejected_operations_emit_no_events() {
        let f = fixture();
        let id = create(&f);
        f.escrow.take_events();
        assert!(pickup(&f, id).is_err());
        assert!(f.escrow.expire(id).is_err());
        assert!(f.escrow.take_events().is_empty());
    }

    #[test]
    fn required_collateral_and_unknown_orders() {
        let f = fixture();
        let id = create(&f);
        assert_eq!(f.escrow.get_required_collateral(id).unwrap(), 5_500_000);
        assert!(matches!(
            f.escrow.get_required_collateral(OrderId(99)),
            Err(EscrowError::State(StateError::NotFound(OrderId(99))))
        ));
        assert!(f.escrow.is_expired(OrderId(99)).is_err());
        assert!(!f.escrow.is_expired(id).unwrap());
    }

    struct RejectingScheme;

    impl SignatureScheme for RejectingScheme {
        fn name(&self) -> &'static str {
            "reject-all"
        }

        fn sign(&self, keypair: &Keypair, message: &[u8]) -> Signature {
            keypair.sign(message)
        }

        fn verify(&self, _: &Address, _: &[u8], _: &Signature) -> bool {
            false
        }
    }

    /// `H(x) = x`.
    struct IdentityHasher;

    impl CommitmentHasher for IdentityHasher {
        fn name(&self) -> &'static str {
            "identity"
        }

        fn hash(&self, input: &Fr) -> Fr {
            *input
        }
    }

    #[test]
    fn injected_signature_scheme_decides_pickup() {
        let mut f = fixture();
        let escrow = HashDropEscrow::new(
            EscrowParams::default(),
            f.ledger.clone(),
            Arc::new(AcceptAll(CircuitId::delivery_v1())),
        )
        .with_signature_scheme(Arc::new(RejectingScheme));
        f.escrow = escrow;

        let id = create(&f);
        accept(&f, id);
        // A genuine Ed25519 attestation, but the configured scheme says no.
        let err = pickup(&f, id).unwrap_err();
        assert!(matches!(err, EscrowError::CryptoVerification(_)));
        assert_eq!(f.escrow.get_order(id).unwrap().state, OrderState::Locked);
    }

    #[test]
    fn injected_commitment_hasher_checks_the_secret() {
        let mut f = fixture();
        let escrow = HashDropEscrow::new(
            EscrowParams::default(),
            f.ledger.clone(),
            Arc::new(AcceptAll(CircuitId::delivery_v1())),
        )
        .with_commitment_hasher(Arc::new(IdentityHasher));
        f.escrow = escrow;
        f.commitment = SecretCommitment::from_field(42u64.into());

        let id = create(&f);
        accept(&f, id);
        pickup(&f, id).unwrap();
        deliver(&f, id).unwrap();
        assert_eq!(f.escrow.get_order(id).unwrap().state, OrderState::Delivered);
    }
}
