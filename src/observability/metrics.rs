//! Metrics collection and exposition.
//!
//! # Metrics
//! - `upstream_requests_total` (counter): upstream attempts by status
//!   (`success`, `failure`, `timeout`, `rate_limited`)
//! - `upstream_request_duration_seconds` (histogram): per-attempt latency
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half_open
//! - `circuit_breaker_failure_count` (gauge): consecutive failures
//! - `http_requests_total` (counter): inbound requests by method, route, status
//! - `http_request_duration_seconds` (histogram): inbound latency by method, route
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Routes are labelled by template (`/earthquakes/{event_id}`), never raw path

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::resilience::CircuitState;

pub const UPSTREAM_REQUESTS_TOTAL: &str = "upstream_requests_total";
pub const UPSTREAM_REQUEST_DURATION_SECONDS: &str = "upstream_request_duration_seconds";
pub const CIRCUIT_BREAKER_STATE: &str = "circuit_breaker_state";
pub const CIRCUIT_BREAKER_FAILURE_COUNT: &str = "circuit_breaker_failure_count";
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

const UPSTREAM_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0];
const HTTP_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Routes excluded from HTTP metrics.
const UNTRACKED_ROUTES: &[&str] = &["/health"];

/// Outcome label for one upstream attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamOutcome {
    Success,
    Failure,
    Timeout,
    RateLimited,
}

impl UpstreamOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            UpstreamOutcome::Success => "success",
            UpstreamOutcome::Failure => "failure",
            UpstreamOutcome::Timeout => "timeout",
            UpstreamOutcome::RateLimited => "rate_limited",
        }
    }
}

/// Install the Prometheus recorder with a scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(UPSTREAM_REQUEST_DURATION_SECONDS.to_string()),
            UPSTREAM_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            HTTP_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_upstream_attempt(outcome: UpstreamOutcome, duration: Duration) {
    metrics::histogram!(UPSTREAM_REQUEST_DURATION_SECONDS).record(duration.as_secs_f64());
    metrics::counter!(UPSTREAM_REQUESTS_TOTAL, "status" => outcome.as_str()).increment(1);
}

pub fn record_breaker(state: CircuitState, failure_count: u32) {
    metrics::gauge!(CIRCUIT_BREAKER_STATE).set(state.gauge_value());
    metrics::gauge!(CIRCUIT_BREAKER_FAILURE_COUNT).set(f64::from(failure_count));
}

pub fn record_http_request(method: &str, route: &str, status: u16, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64();
    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => route.to_string()
    )
    .record(elapsed);
}

/// Axum middleware recording inbound request metrics.
pub async fn track_http_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    if let Some(route) = route.filter(|r| !UNTRACKED_ROUTES.contains(&r.as_str())) {
        record_http_request(&method, &route, response.status().as_u16(), start);
    }
    response
}
