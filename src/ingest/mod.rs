//! Batch ingestion from the upstream feed into the durable store.
//!
//! # Data Flow
//! ```text
//! quake-api ingest --days-back N --min-magnitude M
//!     → window_criteria (now - N days .. now, magnitude >= M)
//!     → UpstreamClient::fetch (same timeout/retry/backoff as live queries)
//!     → EventStore::upsert_events (existing ids are left untouched)
//! ```
//!
//! # Design Decisions
//! - The circuit breaker is not consulted; ingestion is an operator action
//! - Features without an id cannot be keyed and are skipped
//! - Re-running over the same window inserts nothing new

use chrono::{DateTime, Duration, Utc};

use crate::domain::{EventFilter, EventRecord};
use crate::store::{EventStore, StoreError};
use crate::upstream::{FetchCriteria, UpstreamClient, UpstreamError};

pub const DEFAULT_DAYS_BACK: u32 = 7;
pub const DEFAULT_MIN_MAGNITUDE: f64 = 4.5;
/// Largest result set the FDSN event service returns for one query.
pub const MAX_FEED_LIMIT: u32 = 20_000;

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    pub days_back: u32,
    pub min_magnitude: f64,
    pub limit: u32,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            days_back: DEFAULT_DAYS_BACK,
            min_magnitude: DEFAULT_MIN_MAGNITUDE,
            limit: MAX_FEED_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Records returned by the feed.
    pub fetched: usize,
    /// Rows newly written to the store.
    pub inserted: u64,
    /// Records dropped for lacking an id.
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("store write failed: {0}")]
    Store(#[from] StoreError),
}

pub fn window_criteria(options: &IngestOptions, now: DateTime<Utc>) -> FetchCriteria {
    FetchCriteria {
        filter: EventFilter {
            start: Some(now - Duration::days(i64::from(options.days_back))),
            end: Some(now),
            min_magnitude: Some(options.min_magnitude),
            ..Default::default()
        },
        limit: options.limit,
    }
}

pub async fn run_ingest(
    client: &UpstreamClient,
    store: &dyn EventStore,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError> {
    let criteria = window_criteria(options, Utc::now());
    tracing::info!(
        days_back = options.days_back,
        min_magnitude = options.min_magnitude,
        "Fetching earthquake window from upstream"
    );

    let records = client.fetch(&criteria).await?;
    let fetched = records.len();
    let keyed: Vec<EventRecord> = records
        .into_iter()
        .filter(|r| !r.event_id.is_empty())
        .collect();
    let skipped = fetched - keyed.len();

    let inserted = store.upsert_events(&keyed).await?;

    tracing::info!(
        fetched,
        inserted,
        skipped,
        "Ingestion finished (existing events left unchanged)"
    );
    Ok(IngestReport {
        fetched,
        inserted,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::store::MemoryEventStore;
    use crate::upstream::{ScriptedTransport, UpstreamResponse};
    use chrono::TimeZone;
    use std::sync::Arc;

    const FEED: &str = r#"{"features":[
        {"id":"us1","properties":{"time":1700000000000,"mag":5.1},"geometry":{"coordinates":[140.1,36.2,10.0]}},
        {"id":"us2","properties":{"time":1700000100000,"mag":4.7}},
        {"properties":{"time":1700000200000,"mag":4.9}}
    ]}"#;

    fn client(transport: Arc<ScriptedTransport>) -> UpstreamClient {
        UpstreamClient::new(&UpstreamConfig::default(), transport)
    }

    fn existing() -> EventRecord {
        EventRecord {
            event_id: "us1".into(),
            time: None,
            magnitude: Some(9.9),
            place: Some("already stored".into()),
            latitude: None,
            longitude: None,
            depth_km: None,
            url: None,
        }
    }

    #[test]
    fn window_covers_the_last_n_days() {
        let now = Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap();
        let criteria = window_criteria(&IngestOptions::default(), now);

        assert_eq!(
            criteria.filter.start,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(criteria.filter.end, Some(now));
        assert_eq!(criteria.filter.min_magnitude, Some(4.5));
        assert_eq!(criteria.limit, MAX_FEED_LIMIT);
    }

    #[tokio::test]
    async fn inserts_new_events_and_keeps_existing_ones() {
        let transport = Arc::new(ScriptedTransport::new([Ok(UpstreamResponse::new(200, FEED))]));
        let store = MemoryEventStore::with_events([existing()]);

        let report = run_ingest(&client(transport.clone()), &store, &IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                fetched: 3,
                inserted: 1,
                skipped: 1,
            }
        );
        assert_eq!(store.len(), 2);
        let kept = store.get_event("us1").await.unwrap().unwrap();
        assert_eq!(kept.magnitude, Some(9.9));
        assert!(store.get_event("us2").await.unwrap().is_some());

        let request = transport.last_request().unwrap();
        assert_eq!(request.param("minmagnitude"), Some("4.5"));
        assert_eq!(request.param("limit"), Some("20000"));
        assert!(request.param("starttime").is_some());
        assert!(request.param("endtime").is_some());
    }

    #[tokio::test]
    async fn rerunning_the_same_window_inserts_nothing() {
        let transport = Arc::new(ScriptedTransport::new([
            Ok(UpstreamResponse::new(200, FEED)),
            Ok(UpstreamResponse::new(200, FEED)),
        ]));
        let client = client(transport);
        let store = MemoryEventStore::new();
        let options = IngestOptions {
            days_back: 1,
            min_magnitude: 4.0,
            limit: 100,
        };

        let first = run_ingest(&client, &store, &options).await.unwrap();
        let second = run_ingest(&client, &store, &options).await.unwrap();

        assert_eq!(first.inserted, 2);
        assert_eq!(second.inserted, 0);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn upstream_failure_writes_nothing() {
        let transport = Arc::new(ScriptedTransport::new([Ok(UpstreamResponse::new(429, ""))]));
        let store = MemoryEventStore::new();

        let err = run_ingest(&client(transport), &store, &IngestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Upstream(UpstreamError::RateLimited)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_outage_is_reported() {
        let transport = Arc::new(ScriptedTransport::new([Ok(UpstreamResponse::new(200, FEED))]));
        let store = MemoryEventStore::new();
        store.set_unavailable(true);

        let err = run_ingest(&client(transport), &store, &IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Store(_)));
    }
}
