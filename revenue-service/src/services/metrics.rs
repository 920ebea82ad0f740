//! Prometheus metrics for revenue-service.

use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, Encoder, HistogramVec, TextEncoder, register_counter_vec, register_histogram_vec,
};

/// Histogram for database query duration by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "revenue_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for import units of work by provider and terminal status.
pub static IMPORT_UNITS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "revenue_import_units_total",
        "Import units of work by terminal status",
        &["provider", "status"]
    )
    .expect("Failed to register IMPORT_UNITS")
});

/// Counter for provider fetch calls by provider and outcome.
pub static PROVIDER_FETCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "revenue_provider_fetches_total",
        "Provider fetch calls by outcome",
        &["provider", "outcome"]
    )
    .expect("Failed to register PROVIDER_FETCHES")
});

/// Counter for recap mails by status.
pub static RECAP_MAILS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "revenue_recap_mails_total",
        "Recap mails by status",
        &["status"]
    )
    .expect("Failed to register RECAP_MAILS")
});

/// Counter for errors by type.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "revenue_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&IMPORT_UNITS);
    Lazy::force(&PROVIDER_FETCHES);
    Lazy::force(&RECAP_MAILS);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_import_unit(provider: &str, status: &str) {
    IMPORT_UNITS.with_label_values(&[provider, status]).inc();
}

pub fn record_provider_fetch(provider: &str, outcome: &str) {
    PROVIDER_FETCHES
        .with_label_values(&[provider, outcome])
        .inc();
}

pub fn record_recap_mail(status: &str) {
    RECAP_MAILS.with_label_values(&[status]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
