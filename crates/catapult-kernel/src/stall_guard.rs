//! Actuator stall detection.
//!
//! A stall is a commanded output above the moving threshold while the
//! measured rate stays near zero for longer than the stall interval.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct StallDetector {
    threshold: f64,
    rate_epsilon: f64,
    interval: Duration,
    since: Option<Instant>,
}

impl StallDetector {
    pub fn new(threshold: f64, rate_epsilon: f64, interval: Duration) -> Self {
        Self {
            threshold,
            rate_epsilon,
            interval,
            since: None,
        }
    }

    /// Feed one tick. Returns `true` once the stall condition has held for
    /// the full interval; keeps returning `true` until the condition clears.
    pub fn update(&mut self, output: f64, rate: f64, now: Instant) -> bool {
        if output.abs() > self.threshold && rate.abs() < self.rate_epsilon {
            let since = *self.since.get_or_insert(now);
            now.saturating_duration_since(since) >= self.interval
        } else {
            self.since = None;
            false
        }
    }

    pub fn reset(&mut self) {
        self.since = None;
    }
}
