// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::file::FILE_EXTENSION;
use chrono::{NaiveDate, Timelike};
use std::path::{Path, PathBuf};

const NS_PER_SEC: i64 = 1_000_000_000;
const SECS_PER_HOUR: i64 = 3_600;

/// A UTC hour bucket
///
/// Every event belongs to exactly one hour bucket, derived from its
/// timestamp; each bucket maps to one file named `YYYY-MM-DDTHH.bin`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HourStamp(i64);

impl HourStamp {
    /// Returns the hour bucket containing the given timestamp (ns since epoch).
    #[must_use]
    pub fn containing(timestamp_ns: i64) -> Self {
        let secs = timestamp_ns.div_euclid(NS_PER_SEC);
        Self(secs - secs.rem_euclid(SECS_PER_HOUR))
    }

    /// Constructs an hour bucket from a unix timestamp in seconds.
    ///
    /// Non-aligned timestamps are truncated down to the enclosing hour.
    #[must_use]
    pub fn from_unix_secs(secs: i64) -> Self {
        Self(secs - secs.rem_euclid(SECS_PER_HOUR))
    }

    /// Constructs an hour bucket from calendar components (UTC).
    #[must_use]
    pub fn from_ymdh(year: i32, month: u32, day: u32, hour: u32) -> Option<Self> {
        let dt = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)?;
        Some(Self(dt.and_utc().timestamp()))
    }

    /// Unix timestamp (seconds) of the start of the hour.
    #[must_use]
    pub fn unix_secs(self) -> i64 {
        self.0
    }

    /// First nanosecond timestamp inside the hour.
    #[must_use]
    pub fn start_ns(self) -> i64 {
        self.0 * NS_PER_SEC
    }

    /// First nanosecond timestamp after the hour (exclusive upper bound).
    #[must_use]
    pub fn end_ns(self) -> i64 {
        (self.0 + SECS_PER_HOUR) * NS_PER_SEC
    }

    /// The following hour bucket.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + SECS_PER_HOUR)
    }

    /// The preceding hour bucket.
    #[must_use]
    pub fn prev(self) -> Self {
        Self(self.0 - SECS_PER_HOUR)
    }

    /// Returns `true` if the timestamp falls inside this hour.
    #[must_use]
    pub fn contains(self, timestamp_ns: i64) -> bool {
        timestamp_ns >= self.start_ns() && timestamp_ns < self.end_ns()
    }

    /// File name of this hour's file, `YYYY-MM-DDTHH.bin`.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{self}.{FILE_EXTENSION}")
    }

    /// Path of this hour's file inside the given data directory.
    #[must_use]
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Parses an hour bucket back out of a file name.
    ///
    /// Returns `None` for anything that is not a well-formed hourly file name.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(&format!(".{FILE_EXTENSION}"))?;
        let (date, hour) = stem.split_once('T')?;

        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;

        // NOTE: Reject things like "9" or "+9"; the format is two digits
        if hour.len() != 2 || !hour.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hour: u32 = hour.parse().ok()?;

        let dt = date.and_hms_opt(hour, 0, 0)?;
        Some(Self(dt.and_utc().timestamp()))
    }

    /// Iterates all hour buckets covering the given timestamp range (ns, inclusive).
    pub fn covering(start_ns: i64, end_ns: i64) -> impl Iterator<Item = Self> {
        let mut cursor = Self::containing(start_ns);
        let last = Self::containing(end_ns);

        std::iter::from_fn(move || {
            if cursor > last {
                None
            } else {
                let item = cursor;
                cursor = cursor.next();
                Some(item)
            }
        })
    }
}

impl std::fmt::Display for HourStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match chrono::DateTime::from_timestamp(self.0, 0) {
            Some(dt) => {
                debug_assert_eq!(0, dt.minute());
                write!(f, "{}", dt.format("%Y-%m-%dT%H"))
            }
            None => write!(f, "invalid-hour-{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn hour_file_name_round_trip() {
        let hour = HourStamp::from_ymdh(2025, 3, 14, 9).unwrap();
        assert_eq!("2025-03-14T09.bin", hour.file_name());
        assert_eq!(
            Some(hour),
            HourStamp::from_file_name("2025-03-14T09.bin")
        );
    }

    #[test]
    fn hour_file_name_rejects_garbage() {
        assert_eq!(None, HourStamp::from_file_name("2025-03-14T09"));
        assert_eq!(None, HourStamp::from_file_name("2025-03-14T9.bin"));
        assert_eq!(None, HourStamp::from_file_name("2025-03-14T25.bin"));
        assert_eq!(None, HourStamp::from_file_name("manifest.bin"));
        assert_eq!(None, HourStamp::from_file_name(".DS_Store"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn hour_containing() {
        let hour = HourStamp::from_ymdh(2025, 3, 14, 9).unwrap();

        assert_eq!(hour, HourStamp::containing(hour.start_ns()));
        assert_eq!(hour, HourStamp::containing(hour.end_ns() - 1));
        assert_ne!(hour, HourStamp::containing(hour.end_ns()));

        assert!(hour.contains(hour.start_ns()));
        assert!(!hour.contains(hour.end_ns()));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn hour_covering_range() {
        let hour = HourStamp::from_ymdh(2025, 3, 14, 9).unwrap();

        let hours: Vec<_> =
            HourStamp::covering(hour.start_ns(), hour.next().next().start_ns()).collect();

        assert_eq!(3, hours.len());
        assert_eq!(hour, *hours.first().unwrap());
        assert_eq!(hour.next().next(), *hours.last().unwrap());

        let single: Vec<_> =
            HourStamp::covering(hour.start_ns() + 5, hour.start_ns() + 10).collect();
        assert_eq!(vec![hour], single);
    }
}
