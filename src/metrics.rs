//! Prometheus metrics.
//!
//! Recording goes through the `metrics` facade; the exporter handle renders
//! the text exposition served at `/metrics`.

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder once and return its handle.
///
/// Later calls (every test router, for one) get the same handle.
pub fn init() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder: PrometheusRecorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if let Err(e) = ::metrics::set_global_recorder(recorder) {
                warn!("Metrics recorder already installed: {}", e);
            }
            handle
        })
        .clone()
}

/// Count a finished request by endpoint and status code
pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "vodstitch_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record handler latency since `start`
pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("vodstitch_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// Count a failed upstream playlist fetch
pub fn record_upstream_error() {
    counter!("vodstitch_upstream_errors_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_renders_counters() {
        let _ = init();
        let handle = init();

        record_request("master", 200);
        record_upstream_error();

        let rendered = handle.render();
        assert!(rendered.contains("vodstitch_requests_total"));
        assert!(rendered.contains("vodstitch_upstream_errors_total"));
    }
}
