//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Live query:
//!     → circuit_breaker.rs (may we call upstream at all?)
//!     → upstream client (per-attempt timeout, bounded retries)
//!     → backoff.rs (fixed delay between retryable attempts)
//!     → outcome recorded back into circuit_breaker.rs
//! ```
//!
//! # Design Decisions
//! - Every upstream attempt has a deadline
//! - Rate limiting is never retried tightly; it goes straight back to the breaker
//! - Breaker rejection is a routing decision, not an error

pub mod backoff;
pub mod circuit_breaker;

pub use backoff::BackoffSchedule;
pub use circuit_breaker::{
    BreakerStatus, CircuitBreaker, CircuitState, Clock, ManualClock, MonotonicClock,
};
