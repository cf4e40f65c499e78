use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::request::request_id;
use crate::http::server::AppState;

/// Admin routes require `Authorization: Bearer <api_key>`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if token == Some(state.admin.api_key.as_str()) {
        return Ok(next.run(request).await);
    }

    tracing::warn!(
        request_id = %request_id(&request),
        path = %request.uri().path(),
        "Rejected admin request"
    );
    Err(StatusCode::UNAUTHORIZED)
}
