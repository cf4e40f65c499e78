//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Placeholder admin key; an enabled admin surface must not use it.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration for the earthquake API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// HTTP layer timeouts.
    pub timeouts: TimeoutConfig,

    /// Upstream event feed settings.
    pub upstream: UpstreamConfig,

    /// Circuit breaker guarding the upstream feed.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Durable event store.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for one inbound request, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Upstream feed configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// FDSN event query endpoint.
    pub base_url: String,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,

    /// Delay after each failed attempt, in milliseconds, indexed by attempt.
    pub backoff_ms: Vec<u64>,

    /// User-Agent sent upstream.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://earthquake.usgs.gov/fdsnws/event/1/query".to_string(),
            timeout_secs: 3,
            max_retries: 2,
            backoff_ms: vec![500, 1000],
            user_agent: concat!("quake-api/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,

    /// Seconds after the last failure before a trial call is allowed.
    pub recovery_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_secs: 60,
        }
    }
}

/// Which event store implementation to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Postgres,
    Memory,
}

/// Durable store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// PostgreSQL connection string. Overridden by `DATABASE_URL`.
    pub database_url: Option<String>,

    /// Schema holding the `stg_earthquakes` table.
    pub schema: String,

    pub max_connections: u32,

    pub acquire_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Postgres,
            database_url: None,
            schema: "transformed_data".to_string(),
            max_connections: 15,
            acquire_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Administrative routes configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_secs, 60);
        assert_eq!(config.upstream.max_retries, 2);
        assert_eq!(config.upstream.backoff_ms, vec![500, 1000]);
        assert_eq!(config.store.kind, StoreKind::Postgres);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [circuit_breaker]
            failure_threshold = 3

            [store]
            kind = "memory"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.recovery_secs, 60);
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.store.schema, "transformed_data");
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
