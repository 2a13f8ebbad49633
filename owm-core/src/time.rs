//! Timestamp helpers. Every datetime in this crate is UTC.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::error::OwmError;

/// Default pattern used when rendering dates in messages and cache keys.
pub const DATE_PATTERN: &str = "%Y-%m-%d";

/// Calendar component a datetime can be floored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl FromStr for TimeUnit {
    type Err = OwmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "year" => Ok(TimeUnit::Year),
            "month" => Ok(TimeUnit::Month),
            "day" => Ok(TimeUnit::Day),
            "hour" => Ok(TimeUnit::Hour),
            "minute" => Ok(TimeUnit::Minute),
            "second" => Ok(TimeUnit::Second),
            _ => Err(OwmError::InvalidGranularity(s.to_string())),
        }
    }
}

pub fn to_epoch_seconds(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp()
}

pub fn from_epoch_seconds(ts: i64) -> Result<DateTime<Utc>, OwmError> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| OwmError::InvalidInput(format!("timestamp {ts} is out of range")))
}

/// Zero every component finer than `unit` (day and month reset to 1).
pub fn floor(dt: &DateTime<Utc>, unit: TimeUnit) -> DateTime<Utc> {
    let (month, day) = match unit {
        TimeUnit::Year => (1, 1),
        TimeUnit::Month => (dt.month(), 1),
        _ => (dt.month(), dt.day()),
    };
    let hour = if matches!(unit, TimeUnit::Hour | TimeUnit::Minute | TimeUnit::Second) {
        dt.hour()
    } else {
        0
    };
    let minute = if matches!(unit, TimeUnit::Minute | TimeUnit::Second) {
        dt.minute()
    } else {
        0
    };
    let second = if unit == TimeUnit::Second {
        dt.second()
    } else {
        0
    };

    // Components come from a valid datetime, so the result is always representable.
    Utc.with_ymd_and_hms(dt.year(), month, day, hour, minute, second)
        .single()
        .unwrap_or(*dt)
}

/// Same as [`floor`], with the unit given by name.
pub fn floor_by_name(dt: &DateTime<Utc>, unit: &str) -> Result<DateTime<Utc>, OwmError> {
    Ok(floor(dt, unit.parse()?))
}

pub fn format(dt: &DateTime<Utc>, pattern: &str) -> String {
    dt.format(pattern).to_string()
}

/// Parse `text` with `pattern`; date-only patterns yield midnight UTC.
pub fn parse(text: &str, pattern: &str) -> Result<DateTime<Utc>, OwmError> {
    let invalid = |e: chrono::ParseError| {
        OwmError::InvalidInput(format!("'{text}' does not match '{pattern}': {e}"))
    };

    match NaiveDateTime::parse_from_str(text, pattern) {
        Ok(ndt) => Ok(ndt.and_utc()),
        Err(err) => NaiveDate::parse_from_str(text, pattern)
            .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
            .map_err(|_| invalid(err)),
    }
}
