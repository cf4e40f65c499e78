//! End-to-end API behavior through the full middleware stack.

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use quake_api::config::{AdminConfig, AppConfig, CircuitBreakerConfig, UpstreamConfig};
use quake_api::http::{AppState, HttpServer};
use quake_api::lifecycle::assemble_state;
use quake_api::store::MemoryEventStore;
use quake_api::upstream::{ScriptedTransport, TransportError, UpstreamResponse};

use common::{feed_with, stored_event};

const ADMIN_KEY: &str = "test-admin-key";

struct TestApp {
    router: Router,
    state: AppState,
    transport: Arc<ScriptedTransport>,
    store: Arc<MemoryEventStore>,
}

fn app(failure_threshold: u32) -> TestApp {
    let config = AppConfig {
        upstream: UpstreamConfig {
            max_retries: 0,
            ..UpstreamConfig::default()
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold,
            recovery_secs: 60,
        },
        admin: AdminConfig {
            enabled: true,
            api_key: ADMIN_KEY.to_string(),
        },
        ..AppConfig::default()
    };
    let transport = Arc::new(ScriptedTransport::default());
    let store = Arc::new(MemoryEventStore::with_events([
        stored_event("old", 1, 2.5),
        stored_event("mid", 2, 4.0),
        stored_event("new", 3, 6.1),
    ]));
    let state = assemble_state(&config, transport.clone(), store.clone());
    let router = HttpServer::new(&config, state.clone()).router();
    TestApp {
        router,
        state,
        transport,
        store,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn health_and_request_id() {
    let app = app(3);
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "trace-me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn readiness_reports_store_state() {
    let app = app(3);
    let (status, body) = get(&app.router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    app.store.set_unavailable(true);
    let (status, body) = get(&app.router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["db"], "down");
}

#[tokio::test]
async fn list_reads_store_newest_first() {
    let app = app(3);
    let (status, body) = get(&app.router, "/earthquakes?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "db");
    assert_eq!(body["count"], 2);
    assert_eq!(body["items"][0]["event_id"], "new");
    assert_eq!(body["items"][1]["event_id"], "mid");
    assert_eq!(body["data_fresh_as_of"], "2024-01-03T00:00:00Z");
    assert!(body["breaker_state"].is_null());
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let app = app(3);
    let (_, body) = get(&app.router, "/earthquakes?min_magnitude=3&order=asc").await;
    let ids: Vec<_> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["event_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["mid", "new"]);

    let (_, body) = get(&app.router, "/earthquakes?offset=2").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["offset"], 2);
    assert_eq!(body["items"][0]["event_id"], "old");
}

#[tokio::test]
async fn invalid_parameters_are_422() {
    let app = app(3);
    for uri in [
        "/earthquakes?limit=0",
        "/earthquakes?limit=201",
        "/earthquakes?offset=5001",
        "/earthquakes?min_magnitude=11",
        "/earthquakes?bbox=invalid",
        "/earthquakes?start=not-a-date",
        "/earthquakes?limit=abc",
        "/earthquakes?order=sideways",
        "/earthquakes/live?min_magnitude=11",
        "/earthquakes/live?bbox=1,2,3",
    ] {
        let (status, body) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert!(body["detail"].is_string(), "{uri}");
    }
    assert_eq!(app.transport.calls(), 0);
}

#[tokio::test]
async fn detail_found_and_missing() {
    let app = app(3);
    let (status, body) = get(&app.router, "/earthquakes/mid").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["event_id"], "mid");

    let (status, body) = get(&app.router, "/earthquakes/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Earthquake with id 'nope' not found");
}

#[tokio::test]
async fn live_serves_upstream_when_healthy() {
    let app = app(3);
    app.transport
        .push(Ok(UpstreamResponse::new(200, feed_with("us7000", 5.5))));

    let (status, body) = get(&app.router, "/earthquakes/live?min_magnitude=5&limit=5").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "upstream");
    assert_eq!(body["items"][0]["event_id"], "us7000");
    assert_eq!(body["breaker_state"], "closed");
    assert!(body["fallback_reason"].is_null());

    let request = app.transport.last_request().unwrap();
    assert_eq!(request.param("minmagnitude"), Some("5"));
    assert_eq!(request.param("limit"), Some("5"));
}

#[tokio::test]
async fn live_falls_back_and_trips_breaker() {
    let app = app(2);
    app.transport
        .push(Err(TransportError::Timeout("Connection timeout".into())));
    app.transport.push(Ok(UpstreamResponse::new(500, "")));

    let (status, body) = get(&app.router, "/earthquakes/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "cache_fallback");
    assert_eq!(body["items"][0]["event_id"], "new");
    assert_eq!(body["data_fresh_as_of"], "2024-01-03T00:00:00Z");
    assert!(body["fallback_reason"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("timeout"));

    let (_, body) = get(&app.router, "/earthquakes/live").await;
    assert_eq!(body["breaker_state"], "open");

    let (_, body) = get(&app.router, "/earthquakes/live").await;
    assert_eq!(body["source"], "cache_fallback");
    assert_eq!(body["fallback_reason"], "circuit breaker is open");
    assert_eq!(app.transport.calls(), 2);

    let (status, body) = get(&app.router, "/circuit-breaker/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "open");
    assert_eq!(body["failure_count"], 2);
    assert_eq!(body["allowing_requests"], false);
}

#[tokio::test]
async fn store_outage_is_503() {
    let app = app(1);
    app.state.breaker.record_failure();
    app.store.set_unavailable(true);

    let (status, body) = get(&app.router, "/earthquakes").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].is_string());

    let (status, _) = get(&app.router, "/earthquakes/live").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_requires_bearer_key() {
    let app = app(1);
    app.state.breaker.record_failure();

    let (status, _) = send(
        &app.router,
        Request::post("/admin/circuit-breaker/reset")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app.router,
        Request::post("/admin/circuit-breaker/reset")
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.state.breaker.status().failure_count, 1);

    let (status, body) = send(
        &app.router,
        Request::post("/admin/circuit-breaker/reset")
            .header("authorization", format!("Bearer {ADMIN_KEY}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "closed");
    assert_eq!(body["failure_count"], 0);

    let (status, body) = send(
        &app.router,
        Request::get("/admin/status")
            .header("authorization", format!("Bearer {ADMIN_KEY}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["circuit_breaker"]["state"], "closed");
}

#[tokio::test]
async fn admin_routes_absent_when_disabled() {
    let config = AppConfig::default();
    let store = Arc::new(MemoryEventStore::new());
    let state = assemble_state(&config, Arc::new(ScriptedTransport::default()), store);
    let router = HttpServer::new(&config, state).router();

    let response = router
        .oneshot(
            Request::get("/admin/status")
                .header("authorization", "Bearer anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
