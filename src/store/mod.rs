//! Durable event store.
//!
//! # Data Flow
//! ```text
//! /earthquakes, /earthquakes/{id}, live fallback, ingest
//!     → EventStore (trait object shared via Arc)
//!     → postgres.rs (stg_earthquakes, bound parameters)
//!       or memory.rs (tests, local runs)
//! ```
//!
//! # Design Decisions
//! - Store failures are never masked; they surface as service errors
//! - Ordering is by event time, ties broken by id ascending

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EventQuery, EventRecord};

pub use memory::MemoryEventStore;
pub use postgres::PgEventStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Filtered, ordered, paginated read.
    async fn list_events(&self, query: &EventQuery) -> StoreResult<Vec<EventRecord>>;

    async fn get_event(&self, event_id: &str) -> StoreResult<Option<EventRecord>>;

    /// Most recent stored event time (the freshness marker).
    async fn freshest_event_time(&self) -> StoreResult<Option<DateTime<Utc>>>;

    /// Insert events whose id is not stored yet; existing rows are left untouched.
    /// Returns how many rows were inserted.
    async fn upsert_events(&self, events: &[EventRecord]) -> StoreResult<u64>;

    /// Cheap connectivity check for readiness.
    async fn ping(&self) -> StoreResult<()>;
}
