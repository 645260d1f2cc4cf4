//! Metrics collection and exposition.

use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder. Called once at startup.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record one dispatched request.
pub fn record_request(method: &str, path: &str, code: u16, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("code", code.to_string()),
    ];

    counter!("api_gateway_requests_routed_total", &labels).increment(1);
    histogram!("api_gateway_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}
