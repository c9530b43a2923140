//! Timestamp type and clock abstraction.
//!
//! Timestamps are Unix epoch seconds (UTC). Deadlines and "now" are always
//! compared in this one time base; no timezone conversion happens anywhere.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub const fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    ///
    /// A system clock set before 1970 reads as the epoch.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    /// This timestamp shifted `secs` into the future.
    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds left until this timestamp, or `None` once `now` has reached it.
    pub fn remaining_from(&self, now: Timestamp) -> Option<u64> {
        match self.0.checked_sub(now.0) {
            Some(0) | None => None,
            Some(secs) => Some(secs),
        }
    }

    /// Whether this deadline has passed relative to `now`.
    pub fn has_passed(&self, now: Timestamp) -> bool {
        now.0 >= self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of "now".
///
/// Everything that compares against a deadline takes a clock instead of
/// reading system time, so tests can pin or advance it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_is_none_at_and_after_deadline() {
        let deadline = Timestamp::new(100);
        assert_eq!(deadline.remaining_from(Timestamp::new(40)), Some(60));
        assert_eq!(deadline.remaining_from(Timestamp::new(100)), None);
        assert_eq!(deadline.remaining_from(Timestamp::new(150)), None);
    }

    #[test]
    fn deadline_passes_at_exact_instant() {
        let deadline = Timestamp::new(100);
        assert!(!deadline.has_passed(Timestamp::new(99)));
        assert!(deadline.has_passed(Timestamp::new(100)));
    }

    #[test]
    fn plus_secs_saturates() {
        assert_eq!(Timestamp::new(u64::MAX).plus_secs(5), Timestamp::new(u64::MAX));
    }
}
