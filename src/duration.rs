// Duration parsing and layover arithmetic
// Itinerary durations arrive as restricted ISO-8601 strings ("PT[nH][nM]");
// everything downstream works with the parsed hour/minute pair.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

// Error types for duration parsing. Each variant carries the offending
// substring so callers can report exactly what was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("duration does not start with 'PT': '{0}'")]
    MissingPrefix(String),

    #[error("invalid hour count '{0}'")]
    InvalidHours(String),

    #[error("invalid minute count '{0}'")]
    InvalidMinutes(String),

    #[error("unexpected trailing input '{0}'")]
    TrailingInput(String),
}

// A parsed duration, kept as the raw hour/minute pair. The Display impl
// renders the tabular form: two-digit minimum on both fields, the hour field
// growing as needed ("03:05", "120:00").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationDisplay {
    pub hours: u32,
    pub minutes: u32,
}

impl DurationDisplay {
    pub fn new(hours: u32, minutes: u32) -> Self {
        Self { hours, minutes }
    }

    pub fn from_minutes(total: u32) -> Self {
        Self {
            hours: total / 60,
            minutes: total % 60,
        }
    }

    pub fn total_minutes(&self) -> u32 {
        self.hours * 60 + self.minutes
    }
}

impl fmt::Display for DurationDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

// Rows are handed to the presentation side as plain strings, so the duration
// serializes as its display form rather than as a struct.
impl Serialize for DurationDisplay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// Parse a duration in the restricted "PT[nH][nM]" grammar. Both components
// are optional; a bare "PT" is zero. Anything outside the grammar is rejected
// rather than guessed at.
pub fn parse_duration(raw: &str) -> Result<DurationDisplay, ParseError> {
    let body = raw
        .strip_prefix("PT")
        .ok_or_else(|| ParseError::MissingPrefix(raw.to_string()))?;

    let mut hours = 0;
    let mut minutes = 0;

    if let Some((hour_part, rest)) = body.split_once('H') {
        hours =
            parse_count(hour_part).ok_or_else(|| ParseError::InvalidHours(hour_part.to_string()))?;
        if let Some((minute_part, tail)) = rest.split_once('M') {
            minutes = parse_count(minute_part)
                .ok_or_else(|| ParseError::InvalidMinutes(minute_part.to_string()))?;
            if !tail.is_empty() {
                return Err(ParseError::TrailingInput(tail.to_string()));
            }
        } else if !rest.is_empty() {
            return Err(ParseError::TrailingInput(rest.to_string()));
        }
    } else if let Some((minute_part, tail)) = body.split_once('M') {
        minutes = parse_count(minute_part)
            .ok_or_else(|| ParseError::InvalidMinutes(minute_part.to_string()))?;
        if !tail.is_empty() {
            return Err(ParseError::TrailingInput(tail.to_string()));
        }
    } else if !body.is_empty() {
        return Err(ParseError::TrailingInput(body.to_string()));
    }

    Ok(DurationDisplay { hours, minutes })
}

// A non-negative decimal integer, nothing else. Leading zeros are fine.
fn parse_count(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

// A connection whose departure precedes the previous arrival. Carries both
// timestamps and the size of the deficit so the caller can report it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("departure {departure} precedes arrival {arrival} by {deficit}")]
pub struct NegativeLayover {
    pub arrival: NaiveDateTime,
    pub departure: NaiveDateTime,
    pub deficit: DurationDisplay,
}

// Wall-clock gap between an arrival and the following departure, at minute
// granularity. A departure before the arrival is returned as an error value
// instead of a wrapped or negative rendering.
pub fn layover_duration(
    arrival: NaiveDateTime,
    departure: NaiveDateTime,
) -> Result<DurationDisplay, NegativeLayover> {
    let gap_minutes = departure.signed_duration_since(arrival).num_minutes();
    if gap_minutes < 0 {
        return Err(NegativeLayover {
            arrival,
            departure,
            deficit: DurationDisplay {
                hours: (-gap_minutes / 60) as u32,
                minutes: (-gap_minutes % 60) as u32,
            },
        });
    }
    Ok(DurationDisplay {
        hours: (gap_minutes / 60) as u32,
        minutes: (gap_minutes % 60) as u32,
    })
}
