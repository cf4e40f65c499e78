//! Live query: prefer the upstream feed, fall back to the durable store.
//!
//! # Protocol
//! ```text
//! breaker.should_allow()?
//!     no  → fallback ("circuit breaker is open")
//!     yes → upstream.fetch()
//!             ok  → breaker.record_success() → source = upstream
//!             err → breaker.record_failure() → fallback (error text)
//! fallback → store.list_events(offset 0, newest first) + freshness marker
//! ```
//!
//! Upstream failures never escape this module; only a store failure on the
//! fallback path does.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EventQuery, EventRecord};
use crate::resilience::{CircuitBreaker, CircuitState};
use crate::store::{EventStore, StoreResult};
use crate::upstream::{FetchCriteria, UpstreamClient};

pub const BREAKER_OPEN_REASON: &str = "circuit breaker is open";

/// Where a live answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveSource {
    Upstream,
    CacheFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveQueryResponse {
    pub source: LiveSource,
    pub records: Vec<EventRecord>,
    /// Freshness marker: now for upstream answers, newest stored event for fallbacks.
    pub data_fresh_as_of: Option<DateTime<Utc>>,
    pub breaker_state: CircuitState,
    /// Present exactly when `source` is `CacheFallback`.
    pub fallback_reason: Option<String>,
}

pub struct LiveQueryService {
    breaker: Arc<CircuitBreaker>,
    upstream: Arc<UpstreamClient>,
    store: Arc<dyn EventStore>,
}

impl LiveQueryService {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        upstream: Arc<UpstreamClient>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            breaker,
            upstream,
            store,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn execute(&self, criteria: &FetchCriteria) -> StoreResult<LiveQueryResponse> {
        let reason = if self.breaker.should_allow() {
            match self.upstream.fetch(criteria).await {
                Ok(records) => {
                    self.breaker.record_success();
                    return Ok(LiveQueryResponse {
                        source: LiveSource::Upstream,
                        records,
                        data_fresh_as_of: Some(Utc::now()),
                        breaker_state: self.breaker.state(),
                        fallback_reason: None,
                    });
                }
                Err(e) => {
                    self.breaker.record_failure();
                    e.to_string()
                }
            }
        } else {
            BREAKER_OPEN_REASON.to_string()
        };

        tracing::warn!(reason = %reason, "Serving live query from store fallback");
        self.fallback(criteria, reason).await
    }

    async fn fallback(
        &self,
        criteria: &FetchCriteria,
        reason: String,
    ) -> StoreResult<LiveQueryResponse> {
        let query = EventQuery::latest(criteria.filter.clone(), criteria.limit);
        let records = self.store.list_events(&query).await?;
        let data_fresh_as_of = self.store.freshest_event_time().await?;

        Ok(LiveQueryResponse {
            source: LiveSource::CacheFallback,
            records,
            data_fresh_as_of,
            breaker_state: self.breaker.state(),
            fallback_reason: Some(reason),
        })
    }
}
