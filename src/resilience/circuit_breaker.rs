//! Circuit breaker for the upstream event feed.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: trial calls test whether upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: recovery period elapsed since last failure (evaluated lazily on read)
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! # Design Decisions
//! - One instance per protected dependency, shared by `Arc`, never a global
//! - No background timer; the Open → Half-Open transition happens on observation
//! - The lock only guards in-memory state, never a network call
//! - Half-Open does not single-flight: concurrent requests may all reach upstream
//! - Every failure refreshes `last_failure`, including failures observed while Open

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker state as reported to callers and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Value exported on the `circuit_breaker_state` gauge.
    pub fn gauge_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic time source, injectable for tests.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// The process monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Read-only snapshot returned by [`CircuitBreaker::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_secs: u64,
    pub seconds_until_recovery: Option<f64>,
    pub allowing_requests: bool,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

impl Default for BreakerInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
        }
    }
}

/// Thread-safe three-state breaker guarding one upstream dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    pub fn with_clock(config: &CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let breaker = Self {
            failure_threshold: config.failure_threshold,
            recovery: Duration::from_secs(config.recovery_secs),
            clock,
            inner: Mutex::new(BreakerInner::default()),
        };
        metrics::record_breaker(CircuitState::Closed, 0);
        breaker
    }

    /// Whether a call to upstream may be attempted right now.
    pub fn should_allow(&self) -> bool {
        let mut inner = self.inner.lock();
        self.check_recovery(&mut inner);
        inner.state != CircuitState::Open
    }

    /// Current state, after evaluating the lazy recovery transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.check_recovery(&mut inner);
        inner.state
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            tracing::info!("Circuit breaker closed after successful trial call");
        }
        inner.failure_count = 0;
        inner.last_failure = None;
        metrics::record_breaker(inner.state, inner.failure_count);
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(self.clock.now());

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                tracing::warn!(
                    failure_count = inner.failure_count,
                    "Trial call failed, circuit breaker re-opened"
                );
            }
            CircuitState::Closed if inner.failure_count >= self.failure_threshold => {
                inner.state = CircuitState::Open;
                tracing::warn!(
                    failure_count = inner.failure_count,
                    failure_threshold = self.failure_threshold,
                    recovery_secs = self.recovery.as_secs(),
                    "Circuit breaker opened"
                );
            }
            _ => {}
        }
        metrics::record_breaker(inner.state, inner.failure_count);
    }

    /// Administrative override back to a fresh Closed breaker.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        *inner = BreakerInner::default();
        tracing::info!("Circuit breaker manually reset");
        metrics::record_breaker(inner.state, inner.failure_count);
    }

    pub fn status(&self) -> BreakerStatus {
        let mut inner = self.inner.lock();
        self.check_recovery(&mut inner);

        let seconds_until_recovery = match (inner.state, inner.last_failure) {
            (CircuitState::Open, Some(last)) => {
                let elapsed = self.clock.now().saturating_duration_since(last);
                Some(self.recovery.saturating_sub(elapsed).as_secs_f64())
            }
            _ => None,
        };

        BreakerStatus {
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.failure_threshold,
            recovery_secs: self.recovery.as_secs(),
            seconds_until_recovery,
            allowing_requests: inner.state != CircuitState::Open,
        }
    }

    fn check_recovery(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let Some(last) = inner.last_failure else {
            return;
        };
        if self.clock.now().saturating_duration_since(last) >= self.recovery {
            inner.state = CircuitState::HalfOpen;
            tracing::info!("Recovery period elapsed, circuit breaker half-open");
            metrics::record_breaker(inner.state, inner.failure_count);
        }
    }
}
