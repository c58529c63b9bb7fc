//! Metrics module for the billing portal.
//! Provides Prometheus metrics for billing operations and dunning activity.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, register_counter_vec, register_histogram_vec, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!("portal_db_query_duration_seconds", "Database query duration"),
        &["operation"]
    )
    .expect("Failed to register portal_db_query_duration_seconds")
});

/// Invoice counter by status.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "portal_invoices_total",
        "Total number of invoices created by status",
        &["status"]
    )
    .expect("Failed to register portal_invoices_total")
});

/// Payment state-machine transition counter.
pub static PAYMENT_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "portal_payment_transitions_total",
        "Total payment state transitions by transition and outcome",
        &["transition", "outcome"]
    )
    .expect("Failed to register portal_payment_transitions_total")
});

/// Announcements written by the dunning engine, by kind.
pub static ANNOUNCEMENTS_GENERATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "portal_announcements_generated_total",
        "Total dunning announcements generated by kind",
        &["kind"]
    )
    .expect("Failed to register portal_announcements_generated_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&PAYMENT_TRANSITIONS_TOTAL);
    Lazy::force(&ANNOUNCEMENTS_GENERATED_TOTAL);
}

/// Render all registered metrics in the Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
