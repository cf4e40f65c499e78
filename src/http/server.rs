//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, metrics)
//! - Mount the admin API when enabled
//! - Bind server to listener and drain on shutdown

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::{AdminConfig, AppConfig};
use crate::http::handlers;
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::live::LiveQueryService;
use crate::observability::metrics::track_http_metrics;
use crate::resilience::CircuitBreaker;
use crate::store::EventStore;

/// Application state injected into handlers.
///
/// The breaker is shared with `live`; both point at the same instance.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub breaker: Arc<CircuitBreaker>,
    pub live: Arc<LiveQueryService>,
    pub admin: AdminConfig,
}

impl AppState {
    pub fn new(live: Arc<LiveQueryService>, store: Arc<dyn EventStore>, admin: AdminConfig) -> Self {
        Self {
            breaker: live.breaker().clone(),
            store,
            live,
            admin,
        }
    }
}

/// HTTP server for the earthquake API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &AppConfig, state: AppState) -> Self {
        Self {
            router: build_router(config, state),
        }
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal arrives, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &AppConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/circuit-breaker/status", get(handlers::breaker_status))
        .route("/earthquakes", get(handlers::list_earthquakes))
        .route("/earthquakes/live", get(handlers::live_earthquakes))
        .route("/earthquakes/{event_id}", get(handlers::get_earthquake))
        .with_state(state.clone());

    if config.admin.enabled {
        app = app.merge(setup_admin_router(state));
    }

    app.layer(middleware::from_fn(track_http_metrics))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
}
