use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use lookup_service::{LookupError, QueryClassification};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Metrics recorder already initialized");
                return;
            }

            // Initialize metrics with zero values
            for query_type in ["whois", "ip", "asn"] {
                counter!("lookup_requests_total", "type" => query_type).absolute(0);
            }
            counter!("lookup_cache_hits_total").absolute(0);
            counter!("lookup_errors_total", "error_type" => "none").absolute(0);
        }
        Err(e) => {
            tracing::error!("Failed to install metrics recorder: {}", e);
        }
    }
}

pub fn increment_requests(query_type: QueryClassification) {
    counter!("lookup_requests_total", "type" => query_type.as_str()).increment(1);
}

pub fn increment_cache_hits() {
    counter!("lookup_cache_hits_total").increment(1);
}

pub fn increment_errors(error: &LookupError) {
    let error_type = match error {
        LookupError::InvalidQuery(_) => "invalid_query",
        LookupError::NotFound(_) => "not_found",
        LookupError::Timeout => "timeout",
        LookupError::ResponseTooLarge => "response_too_large",
        LookupError::Upstream { .. } => "upstream",
        _ => "other",
    };
    counter!("lookup_errors_total", "error_type" => error_type).increment(1);
}

pub fn record_query_time(duration_ms: u64) {
    histogram!("lookup_request_duration_seconds").record(duration_ms as f64 / 1000.0);
}

pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized".to_string()),
    }
}
