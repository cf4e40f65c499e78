//! PostgreSQL event store over `<schema>.stg_earthquakes`.
//!
//! The pool is created lazily: the service starts while the database is
//! down, and readiness reports it until connections succeed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};

use crate::config::StoreConfig;
use crate::domain::{EventFilter, EventQuery, EventRecord};
use crate::store::{EventStore, StoreError, StoreResult};

const COLUMNS: &str = "id, time, place, magnitude, latitude, longitude, depth_km, url";

/// Rows per INSERT; eight binds each stays well under the 65535 parameter cap.
const INSERT_BATCH: usize = 1000;

#[derive(Debug, FromRow)]
struct EventRow {
    id: String,
    time: Option<DateTime<Utc>>,
    place: Option<String>,
    magnitude: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    depth_km: Option<f64>,
    url: Option<String>,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.id,
            time: row.time,
            magnitude: row.magnitude,
            place: row.place,
            latitude: row.latitude,
            longitude: row.longitude,
            depth_km: row.depth_km,
            url: row.url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
    table: String,
}

impl PgEventStore {
    /// Build a lazily connecting store. `config.schema` must already be validated.
    pub fn connect_lazy(config: &StoreConfig) -> StoreResult<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("no database URL configured".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .test_before_acquire(true)
            .connect_lazy(url)?;

        Ok(Self::with_pool(pool, &config.schema))
    }

    pub fn with_pool(pool: PgPool, schema: &str) -> Self {
        Self {
            pool,
            table: format!("{schema}.stg_earthquakes"),
        }
    }

    fn select(&self) -> QueryBuilder<'static, Postgres> {
        QueryBuilder::new(format!("SELECT {COLUMNS} FROM {} WHERE 1=1", self.table))
    }
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &EventFilter) {
    if let Some(start) = filter.start {
        qb.push(" AND time >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        qb.push(" AND time <= ").push_bind(end);
    }
    if let Some(min) = filter.min_magnitude {
        qb.push(" AND magnitude >= ").push_bind(min);
    }
    if let Some(max) = filter.max_magnitude {
        qb.push(" AND magnitude <= ").push_bind(max);
    }
    if let Some(bbox) = filter.bbox {
        qb.push(" AND longitude >= ").push_bind(bbox.min_lon);
        qb.push(" AND longitude <= ").push_bind(bbox.max_lon);
        qb.push(" AND latitude >= ").push_bind(bbox.min_lat);
        qb.push(" AND latitude <= ").push_bind(bbox.max_lat);
    }
}

fn push_page(qb: &mut QueryBuilder<'static, Postgres>, query: &EventQuery) {
    qb.push(" ORDER BY time ")
        .push(query.order.as_sql())
        .push(" NULLS LAST, id LIMIT ")
        .push_bind(i64::from(query.limit))
        .push(" OFFSET ")
        .push_bind(i64::from(query.offset));
}

impl PgEventStore {
    fn insert(&self, events: &[EventRecord]) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("INSERT INTO {} ({COLUMNS}) ", self.table));
        qb.push_values(events.iter().cloned(), |mut row, e| {
            row.push_bind(e.event_id)
                .push_bind(e.time)
                .push_bind(e.place)
                .push_bind(e.magnitude)
                .push_bind(e.latitude)
                .push_bind(e.longitude)
                .push_bind(e.depth_km)
                .push_bind(e.url);
        });
        qb.push(" ON CONFLICT (id) DO NOTHING");
        qb
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn list_events(&self, query: &EventQuery) -> StoreResult<Vec<EventRecord>> {
        let mut qb = self.select();
        push_filter(&mut qb, &query.filter);
        push_page(&mut qb, query);

        let rows = qb.build_query_as::<EventRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(EventRecord::from).collect())
    }

    async fn get_event(&self, event_id: &str) -> StoreResult<Option<EventRecord>> {
        let mut qb = self.select();
        qb.push(" AND id = ").push_bind(event_id.to_string());

        let row = qb
            .build_query_as::<EventRow>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(EventRecord::from))
    }

    async fn freshest_event_time(&self) -> StoreResult<Option<DateTime<Utc>>> {
        let sql = format!("SELECT MAX(time) FROM {}", self.table);
        let max = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(max)
    }

    async fn upsert_events(&self, events: &[EventRecord]) -> StoreResult<u64> {
        let mut inserted = 0;
        for batch in events.chunks(INSERT_BATCH) {
            let result = self.insert(batch).build().execute(&self.pool).await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
