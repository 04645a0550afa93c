use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram bucket boundaries for latency metrics (seconds).
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros (`counter!`,
/// `gauge!`, `histogram!`) can be used anywhere in the codebase. The
/// `PrometheusHandle` is retained solely for rendering the `/metrics`
/// endpoint.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric
    /// descriptions. Must be called **once** at startup before any
    /// `counter!` / `gauge!` / `histogram!` calls.
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
            .expect("valid matcher")
            .install_recorder()
            .expect("failed to install metrics recorder");

        describe_counter!(
            "gateway_http_requests_total",
            Unit::Count,
            "Total HTTP requests processed, labeled by pipeline outcome"
        );
        describe_histogram!(
            "gateway_http_request_duration_seconds",
            Unit::Seconds,
            "Total request duration from client perspective"
        );
        describe_histogram!(
            "gateway_upstream_request_duration_seconds",
            Unit::Seconds,
            "Upstream request duration (time spent waiting for upstream)"
        );
        describe_gauge!(
            "gateway_http_requests_in_flight",
            Unit::Count,
            "Number of requests currently being processed"
        );

        describe_counter!(
            "gateway_access_list_rejected_total",
            Unit::Count,
            "Requests rejected by the IP blacklist"
        );
        describe_counter!(
            "gateway_auth_rejected_total",
            Unit::Count,
            "Requests rejected by API-key authentication"
        );
        describe_counter!(
            "gateway_rate_limit_rejected_total",
            Unit::Count,
            "Total requests rejected by the rate limiter"
        );
        describe_counter!(
            "gateway_anomaly_rejected_total",
            Unit::Count,
            "Total requests rejected by the anomaly scorer"
        );

        describe_gauge!(
            "gateway_connections_active",
            Unit::Count,
            "Number of active downstream connections"
        );
        describe_counter!(
            "gateway_connections_total",
            Unit::Count,
            "Total connections accepted"
        );

        describe_counter!(
            "gateway_upstream_retries_total",
            Unit::Count,
            "Total upstream retry attempts"
        );
        describe_counter!(
            "gateway_circuit_breaker_rejected_total",
            Unit::Count,
            "Total requests rejected by the circuit breaker (fail fast)"
        );
        describe_counter!(
            "gateway_circuit_breaker_trips_total",
            Unit::Count,
            "Total breaker CLOSED/HALF_OPEN -> OPEN transitions"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
