// src/ledger/clock.rs
//
// Timestamp source for ledger entries.
//
// Ledger timestamps are fixed-width UTC strings with microsecond precision,
// so lexicographic order equals chronological order.

use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Format used for ledger timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that starts at a fixed instant and advances by `step` per reading.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }

    /// Frozen clock: every reading returns `at`.
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::new(at, Duration::zero())
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self
            .next
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = *next;
        *next = now + self.step;
        now
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a ledger timestamp. Returns None for foreign formats.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let body = s.strip_suffix('Z')?;
    NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Timestamp for a new entry: the clock reading, pushed forward to 1us past
/// `previous` when needed so timestamps strictly increase.
pub fn next_timestamp(clock: &dyn Clock, previous: Option<&str>) -> String {
    let mut at = clock.now();
    if let Some(prev) = previous.and_then(parse_timestamp) {
        if at <= prev {
            at = prev + Duration::microseconds(1);
        }
    }
    format_timestamp(&at)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn format_is_fixed_width_and_parses_back() {
        let s = format_timestamp(&t0());
        assert_eq!(s, "2026-01-02T03:04:05.000000Z");
        assert_eq!(parse_timestamp(&s), Some(t0()));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn frozen_clock_still_yields_increasing_timestamps() {
        let clock = SteppingClock::fixed(t0());
        let a = next_timestamp(&clock, None);
        let b = next_timestamp(&clock, Some(&a));
        let c = next_timestamp(&clock, Some(&b));
        assert!(a < b && b < c);
        assert_eq!(b, "2026-01-02T03:04:05.000001Z");
    }

    #[test]
    fn stepping_clock_advances() {
        let clock = SteppingClock::new(t0(), Duration::seconds(1));
        assert_eq!(clock.now(), t0());
        assert_eq!(clock.now(), t0() + Duration::seconds(1));
    }
}
