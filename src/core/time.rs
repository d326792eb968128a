//! Time source abstraction for testable time-dependent logic

use chrono::{DateTime, Utc};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Abstraction over wall-clock time so cooldown math and scan durations
/// can be pinned in tests
pub trait Clock: Send + Sync {
    /// Current UTC time
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Production clock using actual system time
#[derive(Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for deterministic testing
#[cfg(test)]
#[derive(Clone)]
pub struct FixedClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

#[cfg(test)]
impl FixedClock {
    /// Create a clock pinned at the given time
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(time)),
        }
    }

    /// Move the clock forward by the given duration
    pub fn advance(&self, duration: chrono::Duration) {
        let mut current = self.current.lock().unwrap();
        *current += duration;
    }

    /// Pin the clock at a new time
    pub fn set(&self, time: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap();
        *current = time;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}
