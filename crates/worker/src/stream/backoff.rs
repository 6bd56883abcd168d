//! Idle backoff between empty polls.

use crate::config::BackoffConfig;
use std::time::Duration;

/// Doubling sleep schedule, bounded by `[floor, ceiling]`.
///
/// Keeps the worker from hot-looping against an idle broker while staying
/// responsive when traffic resumes: any successful read resets the schedule
/// to the floor.
#[derive(Debug)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_secs(config.floor_secs),
            Duration::from_secs(config.ceiling_secs),
        )
    }

    /// The next sleep duration. Doubles on every call, capped at the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        delay
    }

    /// Back to the floor; call after any non-empty poll.
    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}
