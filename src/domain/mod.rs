//! Earthquake domain types shared by the store, the upstream client and the HTTP layer.
//!
//! # Data Flow
//! ```text
//! HTTP query string
//!     → http/params.rs (validation)
//!     → EventFilter (+ limit/offset/order as EventQuery)
//!     → store (durable read path) or upstream (live feed)
//!     → Vec<EventRecord>
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single seismic event, as served to API callers.
///
/// Every field except the identifier may be unknown; upstream feeds are
/// allowed to omit any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub time: Option<DateTime<Utc>>,
    pub magnitude: Option<f64>,
    pub place: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth_km: Option<f64>,
    pub url: Option<String>,
}

/// Geographic rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        longitude >= self.min_lon
            && longitude <= self.max_lon
            && latitude >= self.min_lat
            && latitude <= self.max_lat
    }
}

/// Error returned when a `min_lon,min_lat,max_lon,max_lat` string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("bbox must be four comma-separated numbers: min_lon,min_lat,max_lon,max_lat")]
pub struct InvalidBoundingBox;

impl FromStr for BoundingBox {
    type Err = InvalidBoundingBox;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let coords = s
            .split(',')
            .map(|part| part.trim().parse::<f64>().map_err(|_| InvalidBoundingBox))
            .collect::<Result<Vec<_>, _>>()?;

        match coords.as_slice() {
            &[min_lon, min_lat, max_lon, max_lat] if coords.iter().all(|c| c.is_finite()) => {
                Ok(Self {
                    min_lon,
                    min_lat,
                    max_lon,
                    max_lat,
                })
            }
            _ => Err(InvalidBoundingBox),
        }
    }
}

/// Filter vocabulary understood by both the store and the upstream feed.
///
/// An absent criterion means "unfiltered" on that axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    pub bbox: Option<BoundingBox>,
}

impl EventFilter {
    /// Whether a record satisfies every present criterion.
    ///
    /// Records with an unknown value on a filtered axis never match it.
    pub fn matches(&self, record: &EventRecord) -> bool {
        if let Some(start) = self.start {
            if !record.time.is_some_and(|t| t >= start) {
                return false;
            }
        }
        if let Some(end) = self.end {
            if !record.time.is_some_and(|t| t <= end) {
                return false;
            }
        }
        if let Some(min) = self.min_magnitude {
            if !record.magnitude.is_some_and(|m| m >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_magnitude {
            if !record.magnitude.is_some_and(|m| m <= max) {
                return false;
            }
        }
        if let Some(bbox) = self.bbox {
            match (record.longitude, record.latitude) {
                (Some(lon), Some(lat)) if bbox.contains(lon, lat) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Sort direction on event time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

/// A paginated read against the durable store.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub filter: EventFilter,
    pub limit: u32,
    pub offset: u32,
    pub order: SortOrder,
}

impl EventQuery {
    /// The shape used by the live fallback: first page, most recent first.
    pub fn latest(filter: EventFilter, limit: u32) -> Self {
        Self {
            filter,
            limit,
            offset: 0,
            order: SortOrder::Desc,
        }
    }
}
