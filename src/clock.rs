//! Wall-clock access
//!
//! Every timer decision is made against an injected clock so that a host
//! suspension (or a test) can move time forward without the countdown
//! having ticked in between.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Source of wall-clock time for the timer authority
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;

    /// Calendar day used for stats buckets and streaks
    fn today(&self) -> NaiveDate;
}

/// Real system clock; day keys follow the local timezone
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock that only moves when told to. Day keys are taken in UTC.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// Start at midnight UTC of the given day
    pub fn at_date(date: NaiveDate) -> Self {
        let start = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or_default();
        Self::new(start)
    }

    pub fn set_ms(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs * 1000);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn today(&self) -> NaiveDate {
        DateTime::<Utc>::from_timestamp_millis(self.now_ms())
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_rolls_over_midnight() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let clock = ManualClock::at_date(day);
        assert_eq!(clock.today(), day);

        clock.advance_secs(24 * 3600 - 1);
        assert_eq!(clock.today(), day);

        clock.advance_secs(1);
        assert_eq!(clock.today(), day.succ_opt().unwrap());
    }
}
