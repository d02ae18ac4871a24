//! # Prometheus Metrics
//!
//! Exposes escrow metrics for the keeper. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use hashdrop_contracts::{EscrowError, OrderEvent, OrderState};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Every order state, for the per-state gauge.
const ALL_STATES: [OrderState; 7] = [
    OrderState::Open,
    OrderState::Locked,
    OrderState::PickedUp,
    OrderState::Delivered,
    OrderState::Disputed,
    OrderState::Cancelled,
    OrderState::Expired,
];

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers and the keeper task.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Successful transitions, labelled by event name.
    pub transitions_total: IntCounterVec,
    /// Orders moved to EXPIRED by the keeper or the API.
    pub orders_expired_total: IntCounter,
    /// Rejected operations, labelled by error kind.
    pub operation_errors_total: IntCounterVec,
    /// Current number of orders in each state.
    pub orders_by_state: IntGaugeVec,
    /// Completed keeper sweeps.
    pub sweeps_total: IntCounter,
    /// Wall time of one keeper sweep in seconds.
    pub sweep_duration_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("hashdrop".into()), None)
            .expect("failed to create prometheus registry");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Successful order transitions by event"),
            &["event"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("metric registration");

        let orders_expired_total =
            IntCounter::new("orders_expired_total", "Orders moved to EXPIRED")
                .expect("metric creation");
        registry
            .register(Box::new(orders_expired_total.clone()))
            .expect("metric registration");

        let operation_errors_total = IntCounterVec::new(
            Opts::new("operation_errors_total", "Rejected escrow operations by error kind"),
            &["kind"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_errors_total.clone()))
            .expect("metric registration");

        let orders_by_state = IntGaugeVec::new(
            Opts::new("orders_by_state", "Current number of orders in each state"),
            &["state"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(orders_by_state.clone()))
            .expect("metric registration");

        let sweeps_total = IntCounter::new("sweeps_total", "Completed expiry sweeps")
            .expect("metric creation");
        registry
            .register(Box::new(sweeps_total.clone()))
            .expect("metric registration");

        let sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "sweep_duration_seconds",
                "Wall time of one expiry sweep in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(sweep_duration_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            transitions_total,
            orders_expired_total,
            operation_errors_total,
            orders_by_state,
            sweeps_total,
            sweep_duration_seconds,
        }
    }

    /// Count drained escrow events.
    pub fn record_events(&self, events: &[OrderEvent]) {
        for event in events {
            self.transitions_total
                .with_label_values(&[event.name()])
                .inc();
            if matches!(event, OrderEvent::Expired { .. }) {
                self.orders_expired_total.inc();
            }
        }
    }

    pub fn record_error(&self, err: &EscrowError) {
        self.operation_errors_total
            .with_label_values(&[err.kind()])
            .inc();
    }

    /// Overwrite the per-state gauge. States absent from `counts` read zero.
    pub fn set_state_counts(&self, counts: &[(OrderState, usize)]) {
        for state in ALL_STATES {
            let n = counts
                .iter()
                .find(|(s, _)| *s == state)
                .map_or(0, |(_, n)| *n);
            self.orders_by_state
                .with_label_values(&[state.as_str()])
                .set(n as i64);
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
