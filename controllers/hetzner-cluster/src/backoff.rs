//! # Fibonacci Backoff
//!
//! Requeue delays for clusters whose reconciliation keeps failing. The delay
//! grows along the Fibonacci sequence in minutes (1m, 1m, 2m, 3m, 5m, 8m) and
//! is capped, so a cluster stuck on a Hetzner Cloud outage is retried at a
//! steady pace without hammering the API.

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, in minutes, capped at `max_minutes`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_minutes` and capped at `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Next delay, advancing the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = Duration::from_secs(self.current_minutes * 60);

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next_minutes.min(self.max_minutes);

        result
    }

    /// Back to the first delay, after a successful reconcile
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

impl Default for FibonacciBackoff {
    /// 1 minute minimum, 10 minutes maximum
    fn default() -> Self {
        Self::new(1, 10)
    }
}
