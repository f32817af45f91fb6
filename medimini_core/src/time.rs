//! ISO-8601 administration times.
//!
//! Medication times are stored as the strings the user typed. They are parsed
//! only when a computation needs them, and formatted back in the same shape
//! they arrived in: a time without an offset stays without one.

use crate::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt;

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A parsed administration time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timestamp {
    /// Wall-clock time with no offset, compared as if it were UTC
    Naive(NaiveDateTime),
    /// Time with an explicit UTC offset
    Zoned(DateTime<FixedOffset>),
}

impl Timestamp {
    /// Parse an ISO-8601 string.
    ///
    /// Accepts RFC 3339 (`2025-12-11T08:00:00+01:00`, `...Z`), offsets
    /// without a colon or without seconds (`...T08:00:00+0100`,
    /// `...T08:00+01:00`), offset-less date-times with optional seconds and
    /// fractions, and bare dates (midnight).
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::Timestamp {
                value: value.to_string(),
                reason: "empty value".into(),
            });
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::Zoned(dt));
        }

        for format in ZONED_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
                return Ok(Self::Zoned(dt));
            }
        }

        for format in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self::Naive(dt));
            }
        }

        match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            Ok(date) => Ok(Self::Naive(date.and_time(NaiveTime::default()))),
            Err(e) => Err(Error::Timestamp {
                value: value.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// The absolute instant this time denotes
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            Self::Naive(dt) => dt.and_utc(),
            Self::Zoned(dt) => dt.with_timezone(&Utc),
        }
    }

    /// Absolute distance to `other` in milliseconds
    pub fn abs_diff_millis(&self, other: &Timestamp) -> i64 {
        (self.instant() - other.instant()).num_milliseconds().abs()
    }

    /// Shift by `offset`, keeping the naive/zoned form
    ///
    /// Fails when the result falls outside the representable date range.
    pub fn shifted(&self, offset: Duration) -> Result<Self> {
        let shifted = match self {
            Self::Naive(dt) => dt.checked_add_signed(offset).map(Self::Naive),
            Self::Zoned(dt) => dt.checked_add_signed(offset).map(Self::Zoned),
        };

        shifted.ok_or_else(|| Error::Timestamp {
            value: self.to_string(),
            reason: format!("shifting by {} minutes leaves the supported range", offset.num_minutes()),
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Naive(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Self::Zoned(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f%:z")),
        }
    }
}
