//! Wall-clock access for elapsed-time math and local calendar dates.
//!
//! The engine and the day-boundary scheduler only ever read time through
//! [`Clock`], so tests can drive both with a [`ManualClock`].

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDate, TimeZone, Utc};
use std::sync::{Mutex, PoisonError};

pub const MILLIS_PER_HOUR: f64 = 3_600_000.0;

pub trait Clock: Send + Sync {
    /// Current local wall-clock time.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Time left until the next local midnight.
    fn until_next_midnight(&self) -> std::time::Duration;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The process's local timezone (`TZ`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        chrono::Local::now().fixed_offset()
    }

    fn until_next_midnight(&self) -> std::time::Duration {
        to_std(duration_until_next_midnight(&chrono::Local::now()))
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Parse an RFC 3339 timestamp, e.g. `2025-03-10T10:00:00+07:00`.
    pub fn at(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(rfc3339).map(Self::new)
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn until_next_midnight(&self) -> std::time::Duration {
        to_std(duration_until_next_midnight(&self.now()))
    }
}

/// Time from `now` until the start of the next calendar day in `now`'s zone.
///
/// Local midnight may be skipped or repeated around DST changes: a repeated
/// midnight resolves to its first occurrence, a skipped one to the first
/// valid local time after it.
pub fn duration_until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let tz = now.timezone();
    let Some(tomorrow) = now.date_naive().succ_opt() else {
        return Duration::days(1);
    };
    let Some(mut candidate) = tomorrow.and_hms_opt(0, 0, 0) else {
        return Duration::days(1);
    };

    let next = loop {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(t) => break Some(t),
            LocalResult::Ambiguous(earliest, _) => break Some(earliest),
            LocalResult::None => {
                candidate += Duration::minutes(15);
                if candidate.date() != tomorrow {
                    break None;
                }
            }
        }
    };

    match next {
        Some(next) => {
            let wait = next.with_timezone(&Utc) - now.with_timezone(&Utc);
            // never hand a non-positive wait to a firing loop
            if wait > Duration::zero() {
                wait
            } else {
                Duration::seconds(1)
            }
        }
        None => Duration::days(1),
    }
}

fn to_std(d: Duration) -> std::time::Duration {
    d.to_std().unwrap_or(std::time::Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until_midnight_in_fixed_offset() {
        let now = DateTime::parse_from_rfc3339("2025-03-10T23:59:00+07:00").unwrap();
        assert_eq!(duration_until_next_midnight(&now), Duration::seconds(60));

        let now = DateTime::parse_from_rfc3339("2025-03-10T00:00:00+07:00").unwrap();
        assert_eq!(duration_until_next_midnight(&now), Duration::hours(24));
    }

    #[test]
    fn test_until_midnight_in_utc() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 18, 30, 0).unwrap();
        assert_eq!(duration_until_next_midnight(&now), Duration::minutes(330));
    }

    #[test]
    fn test_manual_clock_derives_local_date() {
        let clock = ManualClock::at("2025-03-10T23:30:00+07:00").unwrap();
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        clock.advance(Duration::minutes(45));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
        assert_eq!(
            clock.until_next_midnight(),
            std::time::Duration::from_secs(23 * 3600 + 45 * 60)
        );
    }

    #[test]
    fn test_system_clock_wait_is_at_most_a_day_and_change() {
        let wait = SystemClock.until_next_midnight();
        assert!(wait > std::time::Duration::ZERO);
        assert!(wait <= std::time::Duration::from_secs(25 * 3600));
    }

    #[test]
    fn test_until_skipped_midnight() {
        // Santiago springs forward at 00:00 on 2024-09-08, straight to 01:00
        let tz = chrono_tz::America::Santiago;
        let now = tz.with_ymd_and_hms(2024, 9, 7, 23, 0, 0).unwrap();
        assert_eq!(duration_until_next_midnight(&now), Duration::minutes(60));
    }

    #[test]
    fn test_until_midnight_on_long_day() {
        // Santiago falls back from 00:00 to 23:00 on 2024-04-07
        let tz = chrono_tz::America::Santiago;
        let now = tz.with_ymd_and_hms(2024, 4, 6, 22, 0, 0).unwrap();
        assert_eq!(duration_until_next_midnight(&now), Duration::minutes(180));
    }

    #[test]
    fn test_until_repeated_midnight_takes_first() {
        // Havana falls back from 01:00 to 00:00 on 2024-11-03
        let tz = chrono_tz::America::Havana;
        let now = tz.with_ymd_and_hms(2024, 11, 2, 23, 0, 0).unwrap();
        assert_eq!(duration_until_next_midnight(&now), Duration::minutes(60));
    }
}
