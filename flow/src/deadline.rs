//! Deadline countdown.
//!
//! Expiry is reported, never acted on here: whether an expired request blocks
//! anything is decided by [`veriflow_types::ExpiryPolicy`] in the flows.

use std::fmt;
use veriflow_types::Timestamp;
use veriflow_utils::{format_clock, split_duration};

/// Time left until a request's deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Countdown {
    Running {
        days: u64,
        hours: u64,
        minutes: u64,
        seconds: u64,
    },
    Expired,
}

impl Countdown {
    /// Label shown once the deadline has passed.
    pub const EXPIRED_LABEL: &'static str = "EXPIRED";

    pub fn until(expires_at: Timestamp, now: Timestamp) -> Self {
        match expires_at.remaining_from(now) {
            None => Self::Expired,
            Some(secs) => {
                let p = split_duration(secs);
                Self::Running {
                    days: p.days,
                    hours: p.hours,
                    minutes: p.minutes,
                    seconds: p.seconds,
                }
            }
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }

    /// Whole seconds left; zero once expired.
    pub fn remaining_secs(&self) -> u64 {
        match *self {
            Self::Expired => 0,
            Self::Running {
                days,
                hours,
                minutes,
                seconds,
            } => days * 86_400 + hours * 3_600 + minutes * 60 + seconds,
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => f.write_str(Self::EXPIRED_LABEL),
            Self::Running { .. } => f.write_str(&format_clock(self.remaining_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_days_hours_minutes_seconds() {
        let now = Timestamp::new(1_700_000_000);
        let countdown = Countdown::until(now.plus_secs(90_125), now);
        assert_eq!(countdown.to_string(), "01:01:02:05");
        assert!(!countdown.is_expired());
    }

    #[test]
    fn past_deadline_renders_expired() {
        let now = Timestamp::new(1_700_000_000);
        let countdown = Countdown::until(Timestamp::new(1_699_999_000), now);
        assert_eq!(countdown, Countdown::Expired);
        assert_eq!(countdown.to_string(), "EXPIRED");
    }

    #[test]
    fn zero_remaining_counts_as_expired() {
        let now = Timestamp::new(500);
        assert!(Countdown::until(now, now).is_expired());
        assert_eq!(Countdown::until(now.plus_secs(1), now).to_string(), "00:00:00:01");
    }
}
