//! Fixed backoff schedule between upstream retry attempts.

use std::time::Duration;

/// Delays indexed by the attempt that just failed.
///
/// The schedule is the bound: an attempt index past its end gets no delay,
/// and the delay never grows on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl BackoffSchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self::new(delays_ms.iter().copied().map(Duration::from_millis).collect())
    }

    /// Delay to wait after `attempt` (0-based) failed, if any.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        self.delays
            .get(attempt as usize)
            .copied()
            .filter(|d| !d.is_zero())
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::from_millis(&[500, 1000])
    }
}
