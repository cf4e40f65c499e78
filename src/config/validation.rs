//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, timeouts, retry counts)
//! - Validate addresses, URLs and SQL identifiers before they reach a socket or a query
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::{AppConfig, StoreKind, PLACEHOLDER_API_KEY};

/// Upper bound on configured retries.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be at least 1"));
    }

    match url::Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("upstream.base_url", e.to_string())),
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be at least 1"));
    }
    if config.upstream.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::new(
            "upstream.max_retries",
            format!("must be at most {MAX_RETRIES_LIMIT}"),
        ));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be at least 1",
        ));
    }
    if config.circuit_breaker.recovery_secs == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.recovery_secs",
            "must be at least 1",
        ));
    }

    if !is_sql_identifier(&config.store.schema) {
        errors.push(ValidationError::new(
            "store.schema",
            format!("'{}' is not a plain SQL identifier", config.store.schema),
        ));
    }
    if config.store.kind == StoreKind::Postgres {
        if config.store.database_url.as_deref().map_or(true, str::is_empty) {
            errors.push(ValidationError::new(
                "store.database_url",
                "required for the postgres store (or set DATABASE_URL)",
            ));
        }
        if config.store.max_connections == 0 {
            errors.push(ValidationError::new("store.max_connections", "must be at least 1"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled
        && (config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY)
    {
        errors.push(ValidationError::new(
            "admin.api_key",
            "must be set to a real secret when admin is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
