//! Wall-clock time
//!
//! The host supplies the current UTC time through [`Clock`]. Day arithmetic
//! used for rotation and expiry lives here as well.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::Cell;
use std::rc::Rc;

const SECONDS_PER_DAY: i64 = 86_400;

/// Source of the current UTC time
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// Clones share the same instant, so a test can keep one copy and hand the
/// other to an engine.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Whole UTC days elapsed since the Unix epoch, flooring partial days
pub fn days_since_epoch(at: DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(SECONDS_PER_DAY)
}

/// Start of the UTC day following `at`
pub fn next_utc_midnight(at: DateTime<Utc>) -> DateTime<Utc> {
    let next_day = days_since_epoch(at) + 1;
    Utc.timestamp_opt(next_day * SECONDS_PER_DAY, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_since_epoch_is_stable_within_day() {
        let morning = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 59).unwrap();
        assert_eq!(days_since_epoch(morning), 19737);
        assert_eq!(days_since_epoch(night), 19737);
    }

    #[test]
    fn test_days_since_epoch_floors_before_epoch() {
        let before = Utc.with_ymd_and_hms(1969, 12, 31, 12, 0, 0).unwrap();
        assert_eq!(days_since_epoch(before), -1);
    }

    #[test]
    fn test_next_utc_midnight() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 13, 45, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap();
        assert_eq!(next_utc_midnight(at), expected);

        // exactly midnight rolls to the following day
        assert_eq!(
            next_utc_midnight(expected),
            Utc.with_ymd_and_hms(2024, 1, 17, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let handle = clock.clone();
        handle.advance(Duration::hours(2));
        assert_eq!(clock.now(), start + Duration::hours(2));
    }
}
