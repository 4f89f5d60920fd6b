//! Injectable time source.
//!
//! Store expiration is defined against wall-clock time, so the stores take
//! a [`Clock`] handle instead of calling `Utc::now()` directly. Production
//! code uses [`SystemClock`]; tests use [`ManualClock`] and advance time
//! explicitly instead of sleeping.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// A source of "now" for expiration decisions.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic expiry tests.
///
/// Starts at the real current time; `advance` moves it forward. Safe to
/// share across tasks.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    /// Create a clock frozen at the real current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            micros: AtomicI64::new(Utc::now().timestamp_micros()),
        }
    }

    /// Create a clock frozen at the given instant.
    #[must_use]
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.num_microseconds().unwrap_or(i64::MAX), Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.micros.load(Ordering::SeqCst);
        Utc.timestamp_micros(micros)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        let before = clock.now();
        clock.advance(Duration::seconds(31));
        assert_eq!(clock.now() - before, Duration::seconds(31));
    }

    #[test]
    fn manual_clock_is_frozen_between_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), clock.now());
    }
}
