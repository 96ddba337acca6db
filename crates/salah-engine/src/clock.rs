//! Injected time source.
//!
//! All wall-clock reads go through [`Clock`] so tests can simulate arbitrary
//! times without real waiting.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current local wall-clock date and time.
    fn now_local(&self) -> NaiveDateTime;

    /// Current local calendar date.
    fn today(&self) -> NaiveDate {
        self.now_local().date()
    }

    /// Current local time of day.
    fn time_of_day(&self) -> NaiveTime {
        self.now_local().time()
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for tests. Treats the configured wall clock as UTC so that
/// instants and local times stay consistent.
#[derive(Debug)]
pub struct FixedClock {
    now: parking_lot::Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: parking_lot::Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.now.lock())
    }

    fn now_local(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_fixed_clock_set_and_advance() {
        let clock = FixedClock::at(dt("2024-06-21 10:00:00"));
        assert_eq!(clock.time_of_day(), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 21).unwrap());

        clock.advance(chrono::Duration::hours(15));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 22).unwrap());

        clock.set(dt("2024-06-23 00:00:01"));
        assert_eq!(clock.now().date_naive(), clock.today());
    }
}
