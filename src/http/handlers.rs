//! Route handlers for the public API.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};

use crate::http::params::{ListParams, LiveParams};
use crate::http::response::{
    ApiError, EventDetailResponse, EventListResponse, HealthResponse, ReadyResponse,
    ResponseSource,
};
use crate::http::server::AppState;
use crate::resilience::BreakerStatus;

/// Liveness: the process is up.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness: reports whether the event store answers.
///
/// Always 200; a failing store is reported as `degraded` in the body.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    match state.store.ping().await {
        Ok(()) => Json(ReadyResponse {
            status: "ok".to_string(),
            db: "ok".to_string(),
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            Json(ReadyResponse {
                status: "degraded".to_string(),
                db: "down".to_string(),
            })
        }
    }
}

pub async fn breaker_status(State(state): State<AppState>) -> Json<BreakerStatus> {
    Json(state.breaker.status())
}

pub async fn list_earthquakes(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<EventListResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let query = params.into_query()?;

    let items = state.store.list_events(&query).await?;
    let fresh = state.store.freshest_event_time().await?;

    Ok(Json(EventListResponse::from_store(
        items,
        fresh,
        query.limit,
        query.offset,
    )))
}

pub async fn live_earthquakes(
    State(state): State<AppState>,
    params: Result<Query<LiveParams>, QueryRejection>,
) -> Result<Json<EventListResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let criteria = params.into_criteria()?;

    let live = state.live.execute(&criteria).await?;
    Ok(Json(EventListResponse::from_live(live, criteria.limit)))
}

pub async fn get_earthquake(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<EventDetailResponse>, ApiError> {
    match state.store.get_event(&event_id).await? {
        Some(item) => Ok(Json(EventDetailResponse {
            source: ResponseSource::Db,
            item,
        })),
        None => Err(ApiError::NotFound(format!(
            "Earthquake with id '{event_id}' not found"
        ))),
    }
}
