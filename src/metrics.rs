// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the keights controller.
//!
//! All metrics use the namespace prefix `keights_coredns_`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Rewrite passes and their outcomes
//! - **Input Metrics** - Corefile snapshots and queued Service requests
//! - **Error Metrics** - Write-back and watch failures
//!
//! # Example
//!
//! ```rust,no_run
//! use keights::metrics::record_pass;
//!
//! record_pass("success", std::time::Duration::from_millis(12));
//! ```

use crate::request_queue::RewriteEvent;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all keights metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "keights_coredns";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of rewrite passes by outcome
///
/// Labels:
/// - `status`: `success`, `noop`, `not_ready`, `error`
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of rewrite passes by outcome",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of rewrite passes in seconds, including write-back
///
/// Labels:
/// - `status`: outcome of the pass
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of rewrite passes in seconds",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Input Metrics
// ============================================================================

/// Total number of rewrite requests queued from Service events
///
/// Labels:
/// - `event`: `added`, `updated`, `deleted`
pub static REWRITE_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_rewrite_requests_total"),
        "Total number of rewrite requests queued by event kind",
    );
    let counter = CounterVec::new(opts, &["event"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of Corefile snapshots observed
pub static COREFILE_SNAPSHOTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_corefile_snapshots_total"),
        "Total number of Corefile snapshots observed",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of rewrite rules currently held in memory
pub static REWRITE_RULES: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_rewrite_rules"),
        "Number of rewrite rules currently held in memory",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by category
///
/// Labels:
/// - `error_type`: `write_back`, `watch`, `missing_data_key`
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by category",
    );
    let counter = CounterVec::new(opts, &["error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record the outcome of a rewrite pass
///
/// # Arguments
/// * `status` - Outcome (`success`, `noop`, `not_ready`, `error`)
/// * `duration` - Duration of the pass
pub fn record_pass(status: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[status]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration.as_secs_f64());
}

/// Record a queued rewrite request
pub fn record_rewrite_request(event: RewriteEvent) {
    REWRITE_REQUESTS_TOTAL
        .with_label_values(&[event.as_str()])
        .inc();
}

/// Record an observed Corefile snapshot and the rule count it produced
pub fn record_corefile_snapshot(rules: usize) {
    COREFILE_SNAPSHOTS_TOTAL.inc();
    set_rewrite_rules(rules);
}

/// Set the in-memory rewrite rule gauge
#[allow(clippy::cast_precision_loss)]
pub fn set_rewrite_rules(rules: usize) {
    REWRITE_RULES.set(rules as f64);
}

/// Record an error
///
/// # Arguments
/// * `error_type` - Category of error (e.g., `write_back`, `watch`)
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
