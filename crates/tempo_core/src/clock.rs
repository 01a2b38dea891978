//! Wall-clock access and local calendar helpers.
//!
//! # Responsibility
//! - Provide an injectable source of "now" so day boundaries are testable.
//! - Convert epoch milliseconds to local calendar dates and back.
//!
//! # Invariants
//! - Session date strings always use `DATE_FORMAT` in the local timezone.

use chrono::{DateTime, Local, NaiveDate};
use std::sync::atomic::{AtomicI64, Ordering};

/// Calendar date string format stored on session documents.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;

    /// Local calendar date for the current instant.
    fn today(&self) -> NaiveDate {
        local_date(self.now_ms()).unwrap_or_default()
    }
}

/// Clock backed by the operating system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Local::now().timestamp_millis()
    }
}

/// Manually driven clock for tests and deterministic seeding.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Converts epoch milliseconds into a local date-time.
pub fn local_datetime(epoch_ms: i64) -> Option<DateTime<Local>> {
    DateTime::from_timestamp_millis(epoch_ms).map(|utc| utc.with_timezone(&Local))
}

/// Local calendar date of an instant.
pub fn local_date(epoch_ms: i64) -> Option<NaiveDate> {
    local_datetime(epoch_ms).map(|value| value.date_naive())
}

/// `YYYY-MM-DD` string of the local date of an instant.
///
/// Returns an empty string for out-of-range timestamps.
pub fn local_date_string(epoch_ms: i64) -> String {
    local_date(epoch_ms)
        .map(format_date)
        .unwrap_or_default()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Epoch milliseconds of local midnight starting `date`.
pub fn local_day_start_ms(date: NaiveDate) -> Option<i64> {
    date.and_hms_opt(0, 0, 0)?
        .and_local_timezone(Local)
        .earliest()
        .map(|value| value.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::{
        format_date, local_date, local_date_string, local_day_start_ms, parse_date, Clock,
        ManualClock, HOUR_MS,
    };
    use chrono::NaiveDate;

    #[test]
    fn day_start_maps_back_to_same_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let start = local_day_start_ms(date).unwrap();
        assert_eq!(local_date(start), Some(date));
        assert_eq!(local_date_string(start + HOUR_MS), "2024-03-09");
    }

    #[test]
    fn parse_and_format_are_inverse() {
        let date = parse_date(" 2023-12-31 ").unwrap();
        assert_eq!(format_date(date), "2023-12-31");
        assert!(parse_date("12/31/2023").is_none());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }
}
