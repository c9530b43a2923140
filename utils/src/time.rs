//! Time formatting helpers.

/// A duration split into whole days, hours, minutes and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationParts {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

pub fn split_duration(secs: u64) -> DurationParts {
    DurationParts {
        days: secs / 86_400,
        hours: (secs % 86_400) / 3_600,
        minutes: (secs % 3_600) / 60,
        seconds: secs % 60,
    }
}

/// Format seconds as `DD:HH:MM:SS`, each field zero-padded to two digits.
///
/// Days wider than two digits are printed in full.
pub fn format_clock(secs: u64) -> String {
    let p = split_duration(secs);
    format!(
        "{:02}:{:02}:{:02}:{:02}",
        p.days, p.hours, p.minutes, p.seconds
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_every_field() {
        assert_eq!(format_clock(90_125), "01:01:02:05");
        assert_eq!(format_clock(0), "00:00:00:00");
        assert_eq!(format_clock(59), "00:00:00:59");
    }

    #[test]
    fn long_deadlines_keep_all_day_digits() {
        assert_eq!(format_clock(123 * 86_400 + 1), "123:00:00:01");
    }

    #[test]
    fn splits_into_parts() {
        let p = split_duration(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5);
        assert_eq!(
            p,
            DurationParts {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5
            }
        );
    }
}
