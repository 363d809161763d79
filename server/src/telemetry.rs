//! Tracing and Prometheus setup.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `inventory_actions_total{action,outcome}` - Actions handled, by outcome
//! - `inventory_reindex_total` - Renumbering passes that moved rows
//! - `inventory_import_rows_total{result}` - Imported rows by result
//! - `inventory_store_transactions_total{mode}` - Store transactions opened
//!
//! ## Histograms
//! - `inventory_action_duration_seconds{action}` - Action handling time

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DEFAULT_LOG_FILTER;

const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the global tracing subscriber.
///
/// `filter` uses `EnvFilter` syntax; an invalid filter falls back to
/// [`DEFAULT_LOG_FILTER`].
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus recorder and describe the inventory metrics.
///
/// # Errors
///
/// Returns error if the recorder cannot be built or another recorder is
/// already installed.
pub fn install_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        .install_recorder()?;
    describe_metrics();
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!(
        "inventory_actions_total",
        "Inventory actions handled, by action and outcome"
    );
    describe_counter!(
        "inventory_reindex_total",
        "Renumbering passes that moved at least one row"
    );
    describe_counter!(
        "inventory_import_rows_total",
        "Imported rows by result (added, updated, failed)"
    );
    describe_counter!(
        "inventory_store_transactions_total",
        "Inventory store transactions by mode"
    );
    describe_histogram!(
        "inventory_action_duration_seconds",
        "Time taken to handle an inventory action"
    );
}

/// Router serving `GET /metrics` in the Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}
