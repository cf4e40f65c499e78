//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the event store selected by configuration
//! - Wire transport, upstream client, breaker and live query service
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The database pool connects lazily; an unreachable database is a
//!   readiness problem, not a startup one

use std::sync::Arc;

use crate::config::{AppConfig, StoreKind};
use crate::http::server::AppState;
use crate::live::LiveQueryService;
use crate::resilience::CircuitBreaker;
use crate::store::{EventStore, MemoryEventStore, PgEventStore, StoreError};
use crate::upstream::{ReqwestTransport, UpstreamClient, UpstreamTransport};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to initialise event store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build upstream HTTP client: {0}")]
    Transport(#[from] reqwest::Error),
}

pub fn build_store(config: &AppConfig) -> Result<Arc<dyn EventStore>, StartupError> {
    let store: Arc<dyn EventStore> = match config.store.kind {
        StoreKind::Postgres => Arc::new(PgEventStore::connect_lazy(&config.store)?),
        StoreKind::Memory => {
            tracing::warn!("Using in-memory event store; data is not durable");
            Arc::new(MemoryEventStore::new())
        }
    };
    Ok(store)
}

/// Build application state with an explicit transport and store.
pub fn assemble_state(
    config: &AppConfig,
    transport: Arc<dyn UpstreamTransport>,
    store: Arc<dyn EventStore>,
) -> AppState {
    let breaker = Arc::new(CircuitBreaker::new(&config.circuit_breaker));
    let upstream = Arc::new(UpstreamClient::new(&config.upstream, transport));
    let live = Arc::new(LiveQueryService::new(breaker, upstream, store.clone()));
    AppState::new(live, store, config.admin.clone())
}

fn build_transport(config: &AppConfig) -> Result<Arc<dyn UpstreamTransport>, StartupError> {
    Ok(Arc::new(ReqwestTransport::new(&config.upstream.user_agent)?))
}

/// Upstream client for one-shot jobs such as ingestion.
pub fn build_upstream(config: &AppConfig) -> Result<UpstreamClient, StartupError> {
    Ok(UpstreamClient::new(&config.upstream, build_transport(config)?))
}

pub fn build_state(config: &AppConfig) -> Result<AppState, StartupError> {
    let store = build_store(config)?;
    let transport = build_transport(config)?;

    tracing::info!(
        upstream = %config.upstream.base_url,
        store = ?config.store.kind,
        failure_threshold = config.circuit_breaker.failure_threshold,
        recovery_secs = config.circuit_breaker.recovery_secs,
        "Subsystems initialised"
    );
    Ok(assemble_state(config, transport, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::upstream::ScriptedTransport;

    #[tokio::test]
    async fn memory_store_state_shares_one_breaker() {
        let config = AppConfig {
            store: StoreConfig {
                kind: StoreKind::Memory,
                ..StoreConfig::default()
            },
            ..AppConfig::default()
        };
        let store = build_store(&config).unwrap();
        let state = assemble_state(&config, Arc::new(ScriptedTransport::default()), store);

        state.breaker.record_failure();
        assert_eq!(state.live.breaker().status().failure_count, 1);
    }

    #[test]
    fn postgres_without_url_fails() {
        let config = AppConfig::default();
        assert!(matches!(build_store(&config), Err(StartupError::Store(_))));
    }
}
