//! Response bodies and error mapping.
//!
//! # Responsibilities
//! - Define the JSON shapes returned by every route
//! - Map API errors to HTTP status codes with a `{"detail": ...}` body
//!
//! # Design Decisions
//! - Store failures are 503 and logged; their internals never reach the client
//! - Validation failures are 422

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::EventRecord;
use crate::live::{LiveQueryResponse, LiveSource};
use crate::resilience::CircuitState;
use crate::store::StoreError;

/// Where a list response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Db,
    Upstream,
    CacheFallback,
}

impl From<LiveSource> for ResponseSource {
    fn from(source: LiveSource) -> Self {
        match source {
            LiveSource::Upstream => ResponseSource::Upstream,
            LiveSource::CacheFallback => ResponseSource::CacheFallback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventListResponse {
    pub source: ResponseSource,
    pub data_fresh_as_of: Option<DateTime<Utc>>,
    pub count: usize,
    pub limit: u32,
    pub offset: u32,
    pub items: Vec<EventRecord>,
    pub breaker_state: Option<CircuitState>,
    pub fallback_reason: Option<String>,
}

impl EventListResponse {
    pub fn from_store(
        items: Vec<EventRecord>,
        data_fresh_as_of: Option<DateTime<Utc>>,
        limit: u32,
        offset: u32,
    ) -> Self {
        Self {
            source: ResponseSource::Db,
            data_fresh_as_of,
            count: items.len(),
            limit,
            offset,
            items,
            breaker_state: None,
            fallback_reason: None,
        }
    }

    pub fn from_live(live: LiveQueryResponse, limit: u32) -> Self {
        Self {
            source: live.source.into(),
            data_fresh_as_of: live.data_fresh_as_of,
            count: live.records.len(),
            limit,
            offset: 0,
            items: live.records,
            breaker_state: Some(live.breaker_state),
            fallback_reason: live.fallback_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetailResponse {
    pub source: ResponseSource,
    pub item: EventRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub status: String,
    pub db: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Event store request failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "event store unavailable".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
