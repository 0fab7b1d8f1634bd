//! Time source shared by the filter, the tracks and the registry.
//!
//! All timestamps are `f64` seconds since the clock's origin. One clock is
//! handed to the registry and every "now" comes from it.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    /// Seconds since the clock origin. Never decreases.
    fn now(&self) -> f64;
}

/// Wall clock backed by [`Instant`], immune to system time jumps.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock advanced explicitly. Used by the simulator and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.advance_secs(by.as_secs_f64());
    }

    /// Negative or non-finite steps are ignored.
    pub fn advance_secs(&self, secs: f64) {
        if secs.is_finite() && secs > 0.0 {
            *self.now.lock() += secs;
        }
    }

    /// Move to `t` if it lies in the future.
    pub fn set(&self, t: f64) {
        let mut now = self.now.lock();
        if t > *now {
            *now = t;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}
