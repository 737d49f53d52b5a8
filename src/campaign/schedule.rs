use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use rand::Rng;

/// One calendar day of sending, bounded by the configured reset time (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DailyWindow {
    pub fn containing(now: DateTime<Utc>, reset: NaiveTime) -> Self {
        let todays_reset = now.date_naive().and_time(reset).and_utc();
        let start = if todays_reset <= now {
            todays_reset
        } else {
            todays_reset - TimeDelta::days(1)
        };
        Self {
            start,
            end: start + TimeDelta::days(1),
        }
    }
}

/// Uniformly random pause between two sends, inclusive on both ends.
pub fn random_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn window_after_reset_starts_today() {
        let reset = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        let window = DailyWindow::containing(at(9, 30), reset);
        assert_eq!(window.start, at(6, 0));
        assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 3, 11, 6, 0, 0).unwrap());
    }

    #[test]
    fn window_before_reset_started_yesterday() {
        let reset = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        let window = DailyWindow::containing(at(5, 59), reset);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 9, 6, 0, 0).unwrap());
        assert_eq!(window.end, at(6, 0));
    }

    #[test]
    fn reset_instant_belongs_to_the_new_window() {
        let window = DailyWindow::containing(at(0, 0), NaiveTime::MIN);
        assert_eq!(window.start, at(0, 0));
    }

    #[test]
    fn random_delay_stays_in_range() {
        let min = Duration::from_secs(10);
        let max = Duration::from_secs(30);
        for _ in 0..200 {
            let d = random_delay(min, max);
            assert!(d >= min && d <= max, "{d:?} out of range");
        }
    }

    #[test]
    fn degenerate_range_returns_min() {
        assert_eq!(random_delay(Duration::ZERO, Duration::ZERO), Duration::ZERO);
        let d = Duration::from_secs(5);
        assert_eq!(random_delay(d, d), d);
    }
}
