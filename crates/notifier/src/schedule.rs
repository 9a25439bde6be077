//! Outage window parsing

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, ParseResult};

/// Accepted `--start-time` format, e.g. `09:30 24-03-2025`
pub const START_TIME_FORMAT: &str = "%H:%M %d-%m-%Y";

/// How window boundaries appear in rendered notifications
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SECONDS_PER_DAY: i64 = 86_400;

pub fn parse_start_time(value: &str) -> ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, START_TIME_FORMAT)
}

/// A scheduled outage, in the local time of `--timezone`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutageWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl OutageWindow {
    /// Window of `hours` starting at `start`; fails when the end is not a
    /// representable date
    pub fn from_start(start: NaiveDateTime, hours: u32) -> Result<Self> {
        let end = start
            .checked_add_signed(Duration::hours(i64::from(hours)))
            .with_context(|| {
                format!("Outage of {} hours from {} ends out of range", hours, start)
            })?;

        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whole days in the window
    pub fn days(&self) -> i64 {
        self.duration().num_days()
    }

    /// Hours left over after whole days
    pub fn hours(&self) -> i64 {
        self.duration().num_seconds().rem_euclid(SECONDS_PER_DAY) / 3600
    }

    pub fn start_ts(&self) -> String {
        self.start.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn end_ts(&self) -> String {
        self.end.format(TIMESTAMP_FORMAT).to_string()
    }
}
