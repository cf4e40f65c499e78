//! Upstream event feed subsystem.
//!
//! # Data Flow
//! ```text
//! FetchCriteria
//!     → client.rs (query params, attempt loop, classification, metrics)
//!     → transport.rs (one HTTP GET with a deadline)
//!     → feed.rs (GeoJSON → EventRecord)
//! ```
//!
//! # Design Decisions
//! - The transport is a trait so the retry policy is testable without a network
//! - Failures are a closed taxonomy; callers never see reqwest types

pub mod client;
pub mod feed;
pub mod transport;

pub use client::{FetchCriteria, UpstreamClient, UpstreamError};
pub use transport::{
    ReqwestTransport, ScriptedTransport, TransportError, UpstreamRequest, UpstreamResponse,
    UpstreamTransport,
};
