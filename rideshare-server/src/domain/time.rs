//! Date-time handling for driver route schedules.
//!
//! Schedules and rider requests carry times as "YYYY-MM-DD HH:mm" strings,
//! sometimes with seconds and a trailing `Z`. All times are treated as naive
//! wall-clock UTC; the matcher never converts between zones.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::DomainError;

/// Accepted input layouts, most specific first.
const INPUT_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Layout used for display and serialization.
const OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Upper bound for any minute offset carried by route data or requests:
/// departure flexibility, rider and driver transit times. One day.
pub const MAX_OFFSET_MINUTES: i64 = 24 * 60;

/// Reject a minute offset outside `0..=MAX_OFFSET_MINUTES`.
pub fn check_offset(field: &'static str, minutes: i64) -> Result<(), DomainError> {
    if (0..=MAX_OFFSET_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(DomainError::OutOfRange {
            field,
            value: minutes,
        })
    }
}

/// Error returned when parsing an invalid date-time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date-time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A point in time on a driver route schedule.
///
/// # Examples
///
/// ```
/// use rideshare_server::domain::RouteTime;
///
/// let t = RouteTime::parse("2024-03-15 09:05").unwrap();
/// assert_eq!(t.to_string(), "2024-03-15 09:05:00");
/// assert_eq!(t.plus_minutes(10).to_string(), "2024-03-15 09:15:00");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteTime(NaiveDateTime);

impl RouteTime {
    /// Wrap an existing chrono date-time.
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self(datetime)
    }

    /// Parse "YYYY-MM-DD HH:mm" or "YYYY-MM-DD HH:mm:ss".
    ///
    /// A `T` date/time separator and a trailing `Z` are tolerated.
    ///
    /// ```
    /// use rideshare_server::domain::RouteTime;
    ///
    /// assert!(RouteTime::parse("2024-03-15 09:05").is_ok());
    /// assert!(RouteTime::parse("2024-03-15 09:05:30Z").is_ok());
    /// assert!(RouteTime::parse("2024-03-15T09:05:30").is_ok());
    /// assert!(RouteTime::parse("09:05").is_err());
    /// assert!(RouteTime::parse("").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TimeError::new("empty input"));
        }

        let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed).trim_end();
        let normalized = trimmed.replacen('T', " ", 1);

        INPUT_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
            .map(Self)
            .ok_or_else(|| TimeError::new("expected YYYY-MM-DD HH:mm[:ss]"))
    }

    /// Returns the underlying chrono date-time.
    pub fn to_datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Add a (possibly negative) number of minutes.
    ///
    /// Saturates at the representable range instead of overflowing.
    pub fn plus_minutes(&self, minutes: i64) -> Self {
        self.saturating_add(Duration::try_minutes(minutes), minutes >= 0)
    }

    /// Add a provider duration in seconds, rounded to the nearest second.
    ///
    /// Saturates like [`RouteTime::plus_minutes`].
    pub fn plus_seconds(&self, seconds: f64) -> Self {
        let whole = seconds.round();
        self.saturating_add(Duration::try_seconds(whole as i64), whole >= 0.0)
    }

    fn saturating_add(&self, delta: Option<Duration>, forward: bool) -> Self {
        let bound = if forward {
            NaiveDateTime::MAX
        } else {
            NaiveDateTime::MIN
        };
        Self(delta.and_then(|d| self.0.checked_add_signed(d)).unwrap_or(bound))
    }

    /// Signed duration from `other` to `self`.
    pub fn signed_duration_since(&self, other: Self) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Whole minutes from `other` to `self`, truncated toward zero.
    pub fn minutes_since(&self, other: Self) -> i64 {
        self.signed_duration_since(other).num_minutes()
    }
}

impl fmt::Debug for RouteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouteTime({})", self.0.format(OUTPUT_FORMAT))
    }
}

impl fmt::Display for RouteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(OUTPUT_FORMAT))
    }
}

impl Serialize for RouteTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RouteTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RouteTime::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Inclusive time window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: RouteTime,
    pub end: RouteTime,
}

impl TimeWindow {
    pub fn new(start: RouteTime, end: RouteTime) -> Self {
        Self { start, end }
    }

    /// Window of `length_mins` minutes starting at `start`.
    pub fn starting_at(start: RouteTime, length_mins: i64) -> Self {
        Self::new(start, start.plus_minutes(length_mins))
    }

    /// Both bounds moved later by `minutes`.
    pub fn shifted(&self, minutes: i64) -> Self {
        Self::new(self.start.plus_minutes(minutes), self.end.plus_minutes(minutes))
    }

    pub fn contains(&self, time: RouteTime) -> bool {
        self.start <= time && time <= self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
