//! Earthquake data API library.
//!
//! Serves stored earthquake events and a live query path that prefers the
//! upstream feed, guarded by a circuit breaker, with the durable store as
//! fallback.

// Core subsystems
pub mod config;
pub mod domain;
pub mod http;
pub mod ingest;
pub mod live;
pub mod store;
pub mod upstream;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
