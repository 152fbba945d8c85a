//! Metrics collection for the Raito server
//!
//! This module defines the Prometheus metrics exposed at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec,
};

lazy_static! {
    // HTTP Request Metrics

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "raito_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL");

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "raito_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");

    /// In-flight HTTP requests
    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "raito_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        &["method", "path"]
    )
    .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT");

    // Access gate

    /// Gate decisions by gate and outcome (allowed/denied)
    pub static ref GATE_DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "raito_gate_decisions_total",
        "Access gate decisions",
        &["gate", "outcome"]
    )
    .expect("Failed to register GATE_DECISIONS_TOTAL");

    /// Access-log records persisted by the audit worker
    pub static ref AUDIT_RECORDS_WRITTEN_TOTAL: IntCounter = register_int_counter!(
        "raito_audit_records_written_total",
        "Access-log records persisted"
    )
    .expect("Failed to register AUDIT_RECORDS_WRITTEN_TOTAL");

    /// Access-log records lost (queue closed or write failed)
    pub static ref AUDIT_RECORDS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        "raito_audit_records_dropped_total",
        "Access-log records that could not be persisted"
    )
    .expect("Failed to register AUDIT_RECORDS_DROPPED_TOTAL");

    // Aggregation and exchange

    /// Category lookups that failed and degraded to empty
    pub static ref AGGREGATION_CATEGORY_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "raito_aggregation_category_failures_total",
        "Clinical category lookups that failed during aggregation",
        &["category"]
    )
    .expect("Failed to register AGGREGATION_CATEGORY_FAILURES_TOTAL");

    /// Bundle export duration
    pub static ref EXPORT_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "raito_export_duration_seconds",
        "Bundle export duration in seconds",
        &["scope"],
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register EXPORT_DURATION_SECONDS");

    /// Imported bundle entries by resource type and outcome
    pub static ref IMPORT_ENTRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "raito_import_entries_total",
        "Bundle entries processed by the importer",
        &["resource_type", "status"]
    )
    .expect("Failed to register IMPORT_ENTRIES_TOTAL");

    // Credential issuer

    /// Issuer calls by kind (issue/revoke) and outcome
    pub static ref ISSUER_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "raito_issuer_requests_total",
        "Requests made to the credential issuer",
        &["kind", "outcome"]
    )
    .expect("Failed to register ISSUER_REQUESTS_TOTAL");
}

/// Replace identifier segments with `{id}` to keep label cardinality bounded.
pub fn sanitize_path(path: &str) -> String {
    if path == "/" || path.is_empty() {
        return "/".to_string();
    }

    path.split('/')
        .map(|segment| if looks_like_id(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_id(segment: &str) -> bool {
    segment.len() >= 16 && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}
