//! Query-string parameters and their validation.
//!
//! # Responsibilities
//! - Deserialize raw query parameters (serde handles type errors)
//! - Enforce value ranges: limit, offset, magnitudes
//! - Parse bounding boxes and timestamps into domain types
//!
//! # Design Decisions
//! - Every violation is a 422 with a `detail` message
//! - Naive timestamps are interpreted as UTC

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::domain::{BoundingBox, EventFilter, EventQuery, SortOrder};
use crate::http::response::ApiError;
use crate::upstream::FetchCriteria;

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 200;
pub const MAX_OFFSET: u32 = 5000;
pub const MAX_MAGNITUDE: f64 = 10.0;

/// Parameters of `GET /earthquakes`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    pub bbox: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order: Option<SortOrder>,
}

impl ListParams {
    pub fn into_query(self) -> Result<EventQuery, ApiError> {
        let filter = build_filter(
            self.start.as_deref(),
            self.end.as_deref(),
            self.min_magnitude,
            self.max_magnitude,
            self.bbox.as_deref(),
        )?;

        let offset = self.offset.unwrap_or(0);
        if offset > MAX_OFFSET {
            return Err(ApiError::Validation(format!(
                "offset must be between 0 and {MAX_OFFSET}"
            )));
        }

        Ok(EventQuery {
            filter,
            limit: validate_limit(self.limit)?,
            offset,
            order: self.order.unwrap_or_default(),
        })
    }
}

/// Parameters of `GET /earthquakes/live`.
#[derive(Debug, Default, Deserialize)]
pub struct LiveParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    pub bbox: Option<String>,
    pub limit: Option<u32>,
}

impl LiveParams {
    pub fn into_criteria(self) -> Result<FetchCriteria, ApiError> {
        let filter = build_filter(
            self.start.as_deref(),
            self.end.as_deref(),
            self.min_magnitude,
            self.max_magnitude,
            self.bbox.as_deref(),
        )?;
        Ok(FetchCriteria {
            filter,
            limit: validate_limit(self.limit)?,
        })
    }
}

fn validate_limit(limit: Option<u32>) -> Result<u32, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok(limit)
}

fn validate_magnitude(field: &str, value: Option<f64>) -> Result<Option<f64>, ApiError> {
    match value {
        Some(m) if !(0.0..=MAX_MAGNITUDE).contains(&m) => Err(ApiError::Validation(format!(
            "{field} must be between 0 and {MAX_MAGNITUDE}"
        ))),
        other => Ok(other),
    }
}

fn build_filter(
    start: Option<&str>,
    end: Option<&str>,
    min_magnitude: Option<f64>,
    max_magnitude: Option<f64>,
    bbox: Option<&str>,
) -> Result<EventFilter, ApiError> {
    Ok(EventFilter {
        start: start.map(|v| parse_time("start", v)).transpose()?,
        end: end.map(|v| parse_time("end", v)).transpose()?,
        min_magnitude: validate_magnitude("min_magnitude", min_magnitude)?,
        max_magnitude: validate_magnitude("max_magnitude", max_magnitude)?,
        bbox: bbox
            .map(|v| {
                v.parse::<BoundingBox>()
                    .map_err(|e| ApiError::Validation(e.to_string()))
            })
            .transpose()?,
    })
}

/// Accepts RFC 3339, naive ISO-8601 date-times (as UTC) and bare dates.
pub fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        return Ok(naive.and_utc());
    }
    if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    Err(ApiError::Validation(format!(
        "{field} must be an ISO-8601 timestamp"
    )))
}
