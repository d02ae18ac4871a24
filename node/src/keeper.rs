//! # Expiry Keeper
//!
//! Expiry is permissionless but nothing happens unless somebody calls it.
//! The keeper is that somebody: on every tick it syncs the ledger clock to
//! wall time, sweeps every overdue order, and folds the resulting events
//! into the metrics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hashdrop_contracts::{HashDropEscrow, InMemoryLedger, OrderId};

use crate::metrics::SharedMetrics;

/// Current wall time in unix seconds.
pub fn wall_clock_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// One keeper pass. Returns the ids that expired.
pub fn sweep_once(escrow: &HashDropEscrow, metrics: &SharedMetrics) -> Vec<OrderId> {
    let started = Instant::now();
    let expired = escrow.sweep_expired();

    metrics.record_events(&escrow.take_events());
    metrics.set_state_counts(&escrow.state_counts());
    metrics.sweeps_total.inc();
    metrics
        .sweep_duration_seconds
        .observe(started.elapsed().as_secs_f64());

    if expired.is_empty() {
        tracing::debug!(orders = escrow.order_count(), "sweep found nothing to expire");
    } else {
        tracing::info!(count = expired.len(), ids = ?expired, "sweep expired orders");
    }
    expired
}

/// Runs until the task is aborted.
pub async fn run(
    escrow: Arc<HashDropEscrow>,
    ledger: Arc<InMemoryLedger>,
    metrics: SharedMetrics,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        ledger.set_time(wall_clock_secs());
        sweep_once(&escrow, &metrics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NodeMetrics;
    use hashdrop_contracts::{Account, CreateOrderRequest, EscrowParams, OrderState};
    use hashdrop_protocol::crypto::Keypair;
    use hashdrop_protocol::zkp::{
        CircuitId, DeliveryProof, ProofSystemError, ProofVerifier, PublicSignals,
        SecretCommitment,
    };

    struct RejectAll(CircuitId);

    impl ProofVerifier for RejectAll {
        fn circuit_id(&self) -> &CircuitId {
            &self.0
        }

        fn verify(
            &self,
            _: &CircuitId,
            _: &DeliveryProof,
            _: &PublicSignals,
        ) -> Result<bool, ProofSystemError> {
            Ok(false)
        }
    }

    #[test]
    fn sweep_expires_and_counts() {
        let ledger = Arc::new(InMemoryLedger::new(1_000));
        let escrow = HashDropEscrow::new(
            EscrowParams::default(),
            ledger.clone(),
            Arc::new(RejectAll(CircuitId::delivery_v1())),
        );
        let metrics: SharedMetrics = Arc::new(NodeMetrics::new());

        let emitter = Keypair::from_seed(&[1; 32]).address();
        ledger.mint(Account::Party(emitter), 1_000_000);
        let id = escrow
            .create_order(CreateOrderRequest {
                emitter,
                receiver: Keypair::from_seed(&[2; 32]).address(),
                package_value: 1_000,
                delivery_fee: 100,
                secret_commitment: SecretCommitment::from_field(7u64.into()),
                delivery_zone_commitment: [0; 32],
                encrypted_details_ref: String::new(),
            })
            .unwrap();

        assert!(sweep_once(&escrow, &metrics).is_empty());
        ledger.advance(24 * 60 * 60 + 1);
        assert_eq!(sweep_once(&escrow, &metrics), vec![id]);

        assert_eq!(escrow.get_order(id).unwrap().state, OrderState::Expired);
        assert_eq!(metrics.orders_expired_total.get(), 1);
        assert_eq!(metrics.sweeps_total.get(), 2);
        assert_eq!(
            metrics.orders_by_state.with_label_values(&["EXPIRED"]).get(),
            1
        );
    }
}
