//! Exponential backoff for broker reconnection.
//!
//! When the event loop reports a connection error, the driver waits an
//! increasing amount of time before the next attempt instead of hammering a
//! recovering broker. The delay grows as
//!
//! ```text
//! delay[n] = min(initial * multiplier^(n-1), max)
//! ```
//!
//! and resets to `initial` once a connection succeeds. There is no attempt
//! ceiling: a broker that stays down for hours is expected to be picked up
//! whenever it returns, the same way the meter side retries without bound.

use std::time::Duration;

/// Reconnect delay controller.
///
/// Not thread-safe on its own; the driver task owns a single instance.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    current: Duration,
    max: Duration,
    multiplier: f64,
    attempt: u32,
}

impl Backoff {
    /// Creates a controller with custom timing.
    ///
    /// `multiplier` values at or below 1.0 degenerate to a fixed delay of
    /// `initial`, which is still a valid policy.
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            current: initial,
            max,
            multiplier,
            attempt: 0,
        }
    }

    /// Returns the delay to sleep before the next attempt and advances the
    /// schedule.
    pub fn next_sleep(&mut self) -> Duration {
        self.attempt += 1;
        let sleep = self.current;

        let next = self.current.as_secs_f64() * self.multiplier.max(1.0);
        self.current = Duration::from_secs_f64(next).min(self.max);

        sleep
    }

    /// Resets the schedule after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempt = 0;
    }

    /// Attempts made since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    /// 1s initial, 60s cap, 10% growth per attempt. Gentle on short network
    /// hiccups, saturates quickly for sustained outages.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 1.1)
    }
}
