//! Minute-granularity time buckets.
//!
//! Every poll result is filed under the minute it was produced in. Two results
//! from the same minute share a bucket. There is no timezone or leap-second
//! handling: the clock's local wall time is used as-is.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};

/// Source of wall-clock time for bucket keys.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A timestamp truncated to the minute.
///
/// Rendered as `D.M.Y h.m` with no zero padding, e.g. `5.3.2024 9.7`.
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey(NaiveDateTime);

impl BucketKey {
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        // Seconds and below never distinguish two buckets.
        let minute = at
            .date()
            .and_hms_opt(at.hour(), at.minute(), 0)
            .unwrap_or(at);
        Self(minute)
    }

    pub fn now(clock: &dyn Clock) -> Self {
        Self::from_datetime(clock.now())
    }

    pub fn minute(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.0;
        write!(f, "{}.{}.{} {}.{}", t.day(), t.month(), t.year(), t.hour(), t.minute())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed bucket key '{0}', expected 'D.M.Y h.m'")]
pub struct ParseBucketKeyError(String);

impl FromStr for BucketKey {
    type Err = ParseBucketKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseBucketKeyError(s.to_string());

        let (date, time) = s.trim().split_once(' ').ok_or_else(malformed)?;
        let date: Vec<&str> = date.split('.').collect();
        let time: Vec<&str> = time.split('.').collect();
        let &[day, month, year] = date.as_slice() else {
            return Err(malformed());
        };
        let &[hour, minute] = time.as_slice() else {
            return Err(malformed());
        };

        let num = |part: &str| part.parse::<u32>().map_err(|_| malformed());
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let (month, day, hour, minute) = (num(month)?, num(day)?, num(hour)?, num(minute)?);

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .map(Self)
            .ok_or_else(malformed)
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn renders_without_zero_padding() {
        let key = BucketKey::from_datetime(at(2024, 3, 5, 9, 7, 41));
        assert_eq!(key.to_string(), "5.3.2024 9.7");
    }

    #[test]
    fn same_minute_collides() {
        let a = BucketKey::from_datetime(at(2024, 12, 31, 23, 59, 0));
        let b = BucketKey::from_datetime(at(2024, 12, 31, 23, 59, 59));
        assert_eq!(a, b);
    }

    #[test]
    fn parses_its_own_output() {
        let key = BucketKey::from_datetime(at(2023, 11, 20, 14, 5, 0));
        let parsed: BucketKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn rejects_garbage() {
        assert!("yesterday".parse::<BucketKey>().is_err());
        assert!("32.1.2024 10.0".parse::<BucketKey>().is_err());
        assert!("1.1.2024 10".parse::<BucketKey>().is_err());
    }

    #[test]
    fn orders_chronologically() {
        let earlier = BucketKey::from_datetime(at(2024, 1, 9, 10, 0, 0));
        let later = BucketKey::from_datetime(at(2024, 1, 10, 9, 0, 0));
        assert!(earlier < later);
    }
}
