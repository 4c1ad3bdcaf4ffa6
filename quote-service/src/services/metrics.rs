//! Prometheus metrics for quote-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Payment submissions by path (submitted, auto_confirmed).
pub static PAYMENTS_SUBMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quote_payments_submitted_total",
        "Total number of quote payments submitted",
        &["path"]
    )
    .expect("Failed to register payments_submitted_total")
});

/// Finance decisions by outcome.
pub static FINANCE_DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quote_finance_decisions_total",
        "Total number of finance decisions on quote payments",
        &["decision"]
    )
    .expect("Failed to register finance_decisions_total")
});

/// Batch payments created.
pub static BATCH_PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quote_batch_payments_total",
        "Total number of batch payment allocations",
        &["status"]
    )
    .expect("Failed to register batch_payments_total")
});

/// Correction transitions by target type and resulting status.
pub static CORRECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quote_corrections_total",
        "Total number of correction transitions",
        &["target_type", "status"]
    )
    .expect("Failed to register corrections_total")
});

/// Notifications released by the dedup gate.
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quote_notifications_total",
        "Total number of gated notifications by gate and outcome",
        &["gate", "outcome"]
    )
    .expect("Failed to register notifications_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quote_errors_total",
        "Total number of errors by code",
        &["code"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "quote_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&PAYMENTS_SUBMITTED_TOTAL);
    Lazy::force(&FINANCE_DECISIONS_TOTAL);
    Lazy::force(&BATCH_PAYMENTS_TOTAL);
    Lazy::force(&CORRECTIONS_TOTAL);
    Lazy::force(&NOTIFICATIONS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Record an error by its stable code.
pub fn record_error(code: &str) {
    ERRORS_TOTAL.with_label_values(&[code]).inc();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
