//! Prometheus metrics for the integration layer.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_validations_total` - Inbound validations (label: outcome)
//! - `gateway_validation_skipped_total` - Requests exempted by a skip rule
//! - `gateway_microservice_requests_total` - Outbound calls (labels: method, outcome)
//! - `gateway_audit_records_total` - Audit records appended (label: status)
//! - `gateway_cdn_decisions_total` - Cache signalling decisions (label: decision)
//!
//! ## Histograms
//! - `gateway_validation_duration_seconds` - Round trip to the validation endpoint
//! - `gateway_audit_append_duration_seconds` - Log sink append latency
//!
//! Recording functions are no-ops until [`init_metrics`] installs an exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const VALIDATIONS_TOTAL: &str = "gateway_validations_total";
    pub const VALIDATION_SKIPPED_TOTAL: &str = "gateway_validation_skipped_total";
    pub const MICROSERVICE_REQUESTS_TOTAL: &str = "gateway_microservice_requests_total";
    pub const AUDIT_RECORDS_TOTAL: &str = "gateway_audit_records_total";
    pub const CDN_DECISIONS_TOTAL: &str = "gateway_cdn_decisions_total";
    pub const VALIDATION_DURATION_SECONDS: &str = "gateway_validation_duration_seconds";
    pub const AUDIT_APPEND_DURATION_SECONDS: &str = "gateway_audit_append_duration_seconds";
}

/// Install the Prometheus exporter and describe all metrics.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::VALIDATIONS_TOTAL,
        "Inbound request validations by outcome"
    );
    describe_counter!(
        names::VALIDATION_SKIPPED_TOTAL,
        "Requests exempted from validation by a skip rule"
    );
    describe_counter!(
        names::MICROSERVICE_REQUESTS_TOTAL,
        "Outbound microservice requests by method and outcome"
    );
    describe_counter!(
        names::AUDIT_RECORDS_TOTAL,
        "Audit records handed to the log sink"
    );
    describe_counter!(
        names::CDN_DECISIONS_TOTAL,
        "CDN cache signalling decisions (purge, tag, private)"
    );
    describe_histogram!(
        names::VALIDATION_DURATION_SECONDS,
        "Gateway validation round trip in seconds"
    );
    describe_histogram!(
        names::AUDIT_APPEND_DURATION_SECONDS,
        "Audit log append duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_validation(outcome: &'static str) {
    counter!(names::VALIDATIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_validation_skipped() {
    counter!(names::VALIDATION_SKIPPED_TOTAL).increment(1);
}

pub fn record_microservice_request(method: &str, outcome: &'static str) {
    counter!(names::MICROSERVICE_REQUESTS_TOTAL, "method" => method.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_audit_record(status: &'static str) {
    counter!(names::AUDIT_RECORDS_TOTAL, "status" => status).increment(1);
}

pub fn record_cdn_decision(decision: &'static str) {
    counter!(names::CDN_DECISIONS_TOTAL, "decision" => decision).increment(1);
}

pub fn record_validation_duration(duration_secs: f64) {
    histogram!(names::VALIDATION_DURATION_SECONDS).record(duration_secs);
}

pub fn record_audit_append_duration(duration_secs: f64) {
    histogram!(names::AUDIT_APPEND_DURATION_SECONDS).record(duration_secs);
}
