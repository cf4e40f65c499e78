//! In-memory event store.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{EventQuery, EventRecord, SortOrder};
use crate::store::{EventStore, StoreError, StoreResult};

/// Event store held in process memory, keyed by event id.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<EventRecord>>,
    unavailable: AtomicBool,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: impl IntoIterator<Item = EventRecord>) -> Self {
        let store = Self::new();
        for event in events {
            store.upsert(event);
        }
        store
    }

    /// Insert or replace by `event_id`.
    pub fn upsert(&self, event: EventRecord) {
        let mut events = self.events.write();
        match events.iter_mut().find(|e| e.event_id == event.event_id) {
            Some(existing) => *existing = event,
            None => events.push(event),
        }
    }

    fn insert_if_absent(&self, event: &EventRecord) -> bool {
        let mut events = self.events.write();
        if events.iter().any(|e| e.event_id == event.event_id) {
            return false;
        }
        events.push(event.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent call fail, as a database outage would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

/// Time in the requested direction, unknown times last, then id ascending.
fn compare(a: &EventRecord, b: &EventRecord, order: SortOrder) -> CmpOrdering {
    let by_time = match (a.time, b.time) {
        (Some(x), Some(y)) => match order {
            SortOrder::Asc => x.cmp(&y),
            SortOrder::Desc => y.cmp(&x),
        },
        (Some(_), None) => CmpOrdering::Less,
        (None, Some(_)) => CmpOrdering::Greater,
        (None, None) => CmpOrdering::Equal,
    };
    by_time.then_with(|| a.event_id.cmp(&b.event_id))
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn list_events(&self, query: &EventQuery) -> StoreResult<Vec<EventRecord>> {
        self.check_available()?;
        let mut matched: Vec<EventRecord> = self
            .events
            .read()
            .iter()
            .filter(|e| query.filter.matches(e))
            .cloned()
            .collect();

        matched.sort_by(|a, b| compare(a, b, query.order));
        Ok(matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn get_event(&self, event_id: &str) -> StoreResult<Option<EventRecord>> {
        self.check_available()?;
        Ok(self
            .events
            .read()
            .iter()
            .find(|e| e.event_id == event_id)
            .cloned())
    }

    async fn freshest_event_time(&self) -> StoreResult<Option<DateTime<Utc>>> {
        self.check_available()?;
        Ok(self.events.read().iter().filter_map(|e| e.time).max())
    }

    async fn upsert_events(&self, events: &[EventRecord]) -> StoreResult<u64> {
        self.check_available()?;
        let mut inserted = 0;
        for event in events {
            if self.insert_if_absent(event) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}
