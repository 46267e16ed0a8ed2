use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, NaiveDateTime, Utc};
use derive_more::{From, Into};
use snafu::{ResultExt, Snafu, ensure};

use crate::ext::SystemTimeExt;

/// Layout of `lastArchivized` values and of the progress output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S GMT";

/// A point in time with second precision, counted from the Unix epoch in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn now() -> Self {
        SystemTime::now().to_timestamp()
    }

    pub fn to_system_time(self) -> SystemTime {
        let offset = Duration::from_secs(self.0.unsigned_abs());
        if self.0 >= 0 {
            SystemTime::UNIX_EPOCH + offset
        } else {
            SystemTime::UNIX_EPOCH - offset
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp(self.0, 0) {
            Some(datetime) => write!(f, "{}", datetime.format(TIMESTAMP_FORMAT)),
            // Outside chrono's range; never produced by a real clock.
            None => write!(f, "@{}", self.0),
        }
    }
}

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ensure!(has_plain_fields(value), LayoutSnafu);
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
            .map(|datetime| Self(datetime.and_utc().timestamp()))
            .context(InvalidDateTimeSnafu)
    }
}

/// Date and time fields made of digits only, with a four-digit year and no
/// surrounding whitespace. The layout parser alone accepts signs, padding and
/// longer years.
fn has_plain_fields(value: &str) -> bool {
    let digits = |field: &str| !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit());
    if value.trim() != value {
        return false;
    }
    let Some((date, rest)) = value.split_once(char::is_whitespace) else {
        return false;
    };
    let Some((time, _zone)) = rest.trim_start().split_once(char::is_whitespace) else {
        return false;
    };

    let mut date_fields = date.split('-');
    let year_is_plain = date_fields
        .next()
        .is_some_and(|year| year.len() == 4 && digits(year));
    year_is_plain && date_fields.all(digits) && time.split(':').all(digits)
}

#[derive(Debug, Snafu)]
pub enum TimestampParseError {
    #[snafu(display("expected {TIMESTAMP_FORMAT} with a four-digit year"))]
    Layout,
    #[snafu(display("{source}"))]
    InvalidDateTimeError { source: chrono::ParseError },
}
