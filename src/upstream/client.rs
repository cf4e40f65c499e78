//! Upstream client: one logical fetch with per-attempt timeout and bounded retries.
//!
//! # Attempt outcomes
//! ```text
//! 2xx           → parse, return immediately
//! 429           → RateLimited, no further attempts
//! >= 500        → ServerError, retry
//! timeout       → Timeout, retry
//! other failure → Transport, retry
//! ```
//! Between retryable attempts the client sleeps per the [`BackoffSchedule`];
//! when attempts run out the last classified error is returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::UpstreamConfig;
use crate::domain::{EventFilter, EventRecord};
use crate::observability::metrics::{self, UpstreamOutcome};
use crate::resilience::BackoffSchedule;
use crate::upstream::feed::parse_feed;
use crate::upstream::transport::{
    TransportError, UpstreamRequest, UpstreamResponse, UpstreamTransport,
};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Classified upstream failure. The display text doubles as the fallback reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("rate limited by upstream provider")]
    RateLimited,

    #[error("upstream server error: {status}")]
    ServerError { status: u16 },

    #[error("request error: {0}")]
    Transport(String),
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UpstreamError::RateLimited)
    }
}

/// What to ask the upstream for.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCriteria {
    pub filter: EventFilter,
    pub limit: u32,
}

pub struct UpstreamClient {
    transport: Arc<dyn UpstreamTransport>,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    backoff: BackoffSchedule,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig, transport: Arc<dyn UpstreamTransport>) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            backoff: BackoffSchedule::from_millis(&config.backoff_ms),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build_request(&self, criteria: &FetchCriteria) -> UpstreamRequest {
        let mut query = vec![
            ("format".to_string(), "geojson".to_string()),
            ("limit".to_string(), criteria.limit.to_string()),
            ("orderby".to_string(), "time".to_string()),
        ];

        let filter = &criteria.filter;
        if let Some(start) = filter.start {
            query.push(("starttime".into(), start.format(TIME_FORMAT).to_string()));
        }
        if let Some(end) = filter.end {
            query.push(("endtime".into(), end.format(TIME_FORMAT).to_string()));
        }
        if let Some(min) = filter.min_magnitude {
            query.push(("minmagnitude".into(), min.to_string()));
        }
        if let Some(max) = filter.max_magnitude {
            query.push(("maxmagnitude".into(), max.to_string()));
        }
        if let Some(bbox) = filter.bbox {
            query.push(("minlongitude".into(), bbox.min_lon.to_string()));
            query.push(("maxlongitude".into(), bbox.max_lon.to_string()));
            query.push(("minlatitude".into(), bbox.min_lat.to_string()));
            query.push(("maxlatitude".into(), bbox.max_lat.to_string()));
        }

        UpstreamRequest {
            url: self.base_url.clone(),
            query,
            timeout: self.timeout,
        }
    }

    pub async fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<EventRecord>, UpstreamError> {
        let request = self.build_request(criteria);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let started = Instant::now();
            let result = self.transport.get(&request).await;
            let elapsed = started.elapsed();

            let error = match classify(result) {
                Ok(records) => {
                    metrics::record_upstream_attempt(UpstreamOutcome::Success, elapsed);
                    tracing::debug!(
                        attempt = attempt + 1,
                        records = records.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Upstream fetch succeeded"
                    );
                    return Ok(records);
                }
                Err(error) => error,
            };

            metrics::record_upstream_attempt(outcome_label(&error), elapsed);
            tracing::warn!(
                attempt = attempt + 1,
                max_attempts = self.max_retries + 1,
                error = %error,
                elapsed_ms = elapsed.as_millis() as u64,
                "Upstream attempt failed"
            );

            if !error.is_retryable() {
                return Err(error);
            }
            last_error = Some(error);

            if attempt < self.max_retries {
                if let Some(delay) = self.backoff.delay_after(attempt) {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| UpstreamError::Transport("no attempt made".to_string())))
    }
}

fn classify(
    result: Result<UpstreamResponse, TransportError>,
) -> Result<Vec<EventRecord>, UpstreamError> {
    match result {
        Ok(response) => match response.status {
            429 => Err(UpstreamError::RateLimited),
            status if status >= 500 => Err(UpstreamError::ServerError { status }),
            200..=299 => parse_feed(&response.body)
                .map_err(|e| UpstreamError::Transport(format!("malformed upstream payload: {e}"))),
            status => Err(UpstreamError::Transport(format!(
                "unexpected upstream status {status}"
            ))),
        },
        Err(TransportError::Timeout(msg)) => Err(UpstreamError::Timeout(msg)),
        Err(TransportError::Connection(msg)) => Err(UpstreamError::Transport(msg)),
    }
}

fn outcome_label(error: &UpstreamError) -> UpstreamOutcome {
    match error {
        UpstreamError::Timeout(_) => UpstreamOutcome::Timeout,
        UpstreamError::RateLimited => UpstreamOutcome::RateLimited,
        UpstreamError::ServerError { .. } | UpstreamError::Transport(_) => UpstreamOutcome::Failure,
    }
}
