//! Prometheus metrics for the stub runner.
//!
//! Tracks stub server lifecycle and the traffic the stub servers answer.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Stub servers currently running across all pools in the process
    pub static ref STUB_SERVERS_RUNNING: Gauge = register_gauge!(
        "stub_runner_servers_running",
        "Number of stub servers currently running"
    )
    .unwrap();

    /// Stub server start attempts
    pub static ref STUB_SERVER_STARTS_TOTAL: CounterVec = register_counter_vec!(
        "stub_runner_server_starts_total",
        "Total number of stub server start attempts",
        &["result"]  // result: success|failure
    )
    .unwrap();

    /// Requests answered by stub servers
    pub static ref STUB_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "stub_runner_requests_total",
        "Total number of requests answered by stub servers",
        &["stub", "matched"]
    )
    .unwrap();

    /// Time spent resolving and unpacking stubs
    pub static ref STUB_RESOLUTION_DURATION_MS: HistogramVec = register_histogram_vec!(
        "stub_runner_resolution_duration_ms",
        "Histogram of stub resolution time in milliseconds",
        &["result"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_server_started() {
    STUB_SERVER_STARTS_TOTAL.with_label_values(&["success"]).inc();
    STUB_SERVERS_RUNNING.inc();
}

pub fn record_server_start_failure() {
    STUB_SERVER_STARTS_TOTAL.with_label_values(&["failure"]).inc();
}

pub fn record_server_stopped() {
    STUB_SERVERS_RUNNING.dec();
}

pub fn record_stub_request(stub: &str, matched: bool) {
    STUB_REQUESTS_TOTAL
        .with_label_values(&[stub, if matched { "true" } else { "false" }])
        .inc();
}

pub fn record_resolution(duration_ms: f64, success: bool) {
    STUB_RESOLUTION_DURATION_MS
        .with_label_values(&[if success { "success" } else { "failure" }])
        .observe(duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_metrics_collected() {
        record_server_started();
        record_server_start_failure();
        record_server_stopped();

        let metrics = collect_metrics();
        assert!(metrics.contains("stub_runner_server_starts_total"));
        assert!(metrics.contains("stub_runner_servers_running"));
    }

    #[test]
    fn test_request_metrics_collected() {
        record_stub_request("g:loanIssuance:stubs", true);
        record_stub_request("g:loanIssuance:stubs", false);

        let metrics = collect_metrics();
        assert!(metrics.contains("stub_runner_requests_total"));
    }

    #[test]
    fn test_resolution_histogram() {
        record_resolution(0.5, true);
        record_resolution(1200.0, false);

        let metrics = collect_metrics();
        assert!(metrics.contains("stub_runner_resolution_duration_ms"));
    }
}
