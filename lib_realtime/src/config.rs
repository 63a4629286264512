//! # Per-Domain Polling Configuration
//!
//! Every knob the scheduler honors is injectable here; nothing is
//! hard-coded. Each domain carries its own `PollConfig`, so statistics can
//! refresh on a 30s cadence while content idles at several minutes.

use std::time::Duration;

/// Polling behavior for a single domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Nominal refresh cadence while the upstream is healthy.
    pub interval: Duration,
    /// Deadline handed to the fetch adapter for each attempt.
    pub timeout: Duration,
    /// Upper bound for the failure backoff delay.
    pub backoff_ceiling: Duration,
    /// Fire the first fetch immediately on `start` instead of waiting one
    /// interval, so dashboards are not empty at first render.
    pub fetch_immediately: bool,
    /// Age past which a `Fresh` snapshot reads as `Stale`.
    pub stale_after: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::for_interval(Duration::from_secs(30))
    }
}

impl PollConfig {
    /// Builds a config around a nominal interval: backoff capped at 8x the
    /// interval, staleness at 2x.
    pub fn for_interval(interval: Duration) -> Self {
        Self {
            interval,
            timeout: Duration::from_secs(10),
            backoff_ceiling: interval.saturating_mul(8),
            fetch_immediately: true,
            stale_after: interval.saturating_mul(2),
        }
    }

    /// Delay before the next poll after `consecutive_failures` failed
    /// attempts in a row. The first failed attempt retries at the base
    /// interval, then the delay doubles (x1, x2, x4, ...) until the
    /// ceiling. Zero failures yields the nominal interval.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        // 2^16 already dwarfs any sane ceiling; clamping keeps the shift safe.
        let factor = 2u32.saturating_pow(consecutive_failures.saturating_sub(1).min(16));
        self.interval
            .saturating_mul(factor)
            .min(self.backoff_ceiling.max(self.interval))
    }
}
