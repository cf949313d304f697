//! Duration string parsing for the beads system.
//!
//! Used for `BEADS_REMOTE_SYNC_INTERVAL`, the tombstone TTL, and any other
//! human-authored duration in configuration or the environment. Accepts
//! Go-style duration strings: a sequence of `<number><unit>` pairs (e.g.
//! `"1h30m"`), or a single bare number of seconds, or `"0"`/`"0s"` to mean
//! "disabled".

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while parsing a duration or timestamp string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("empty duration string")]
    Empty,

    #[error("invalid duration string '{0}'")]
    InvalidFormat(String),

    #[error("unknown duration unit '{0}' in '{1}'")]
    UnknownUnit(String, String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Recognized units, longest-prefix-first so `"ms"` is tried before `"m"`.
const UNITS: &[(&str, f64)] = &[
    ("ns", 1e-9),
    ("us", 1e-6),
    ("µs", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3600.0),
    ("d", 86400.0),
    ("w", 604800.0,),
];

/// Parse a Go-style duration string into a [`Duration`].
///
/// Examples: `"0"`, `"0s"`, `"5s"`, `"30s"`, `"5m"`, `"1h30m"`, `"720h"`,
/// `"30d"`. A bare integer with no unit is interpreted as whole seconds.
pub fn parse_duration(input: &str) -> Result<Duration, TimeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::Empty);
    }

    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let mut total_seconds = 0.0f64;
    let mut rest = trimmed;
    let mut matched_any = false;

    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| TimeParseError::InvalidFormat(input.to_string()))?;
        if num_end == 0 {
            return Err(TimeParseError::InvalidFormat(input.to_string()));
        }
        let number: f64 = rest[..num_end]
            .parse()
            .map_err(|_| TimeParseError::InvalidFormat(input.to_string()))?;

        let unit_rest = &rest[num_end..];
        let (unit_len, multiplier) = UNITS
            .iter()
            .find(|(unit, _)| unit_rest.starts_with(unit))
            .map(|(unit, mult)| (unit.len(), *mult))
            .ok_or_else(|| {
                let end = unit_rest
                    .find(|c: char| c.is_ascii_digit())
                    .unwrap_or(unit_rest.len());
                TimeParseError::UnknownUnit(unit_rest[..end].to_string(), input.to_string())
            })?;

        total_seconds += number * multiplier;
        matched_any = true;
        rest = &unit_rest[unit_len..];
    }

    if !matched_any {
        return Err(TimeParseError::InvalidFormat(input.to_string()));
    }

    Ok(Duration::from_secs_f64(total_seconds.max(0.0)))
}

/// Parse a duration, clamping it to `minimum` if the parsed value is smaller
/// and nonzero. A parsed value of exactly zero is passed through unchanged
/// (the caller's convention for "disabled").
pub fn parse_duration_with_floor(
    input: &str,
    minimum: Duration,
) -> Result<Duration, TimeParseError> {
    let parsed = parse_duration(input)?;
    if parsed.is_zero() {
        Ok(parsed)
    } else {
        Ok(parsed.max(minimum))
    }
}

/// Parse an RFC 3339 timestamp, as used throughout the issue/event model.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, TimeParseError> {
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimeParseError::InvalidTimestamp(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zero_forms() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parses_bare_integer_as_seconds() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parses_single_unit() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("30d").unwrap(), Duration::from_secs(30 * 86400));
    }

    #[test]
    fn parses_compound_duration() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn rejects_unknown_unit() {
        let err = parse_duration("5q").unwrap_err();
        assert!(matches!(err, TimeParseError::UnknownUnit(_, _)));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(parse_duration("").unwrap_err(), TimeParseError::Empty);
        assert_eq!(parse_duration("   ").unwrap_err(), TimeParseError::Empty);
    }

    #[test]
    fn floor_clamps_nonzero_only() {
        let min = Duration::from_secs(5);
        assert_eq!(parse_duration_with_floor("0", min).unwrap(), Duration::ZERO);
        assert_eq!(parse_duration_with_floor("1s", min).unwrap(), min);
        assert_eq!(
            parse_duration_with_floor("30s", min).unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn parses_rfc3339_timestamp() {
        let ts = parse_timestamp("2026-07-26T12:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-07-26T12:00:00+00:00");
    }

    #[test]
    fn rejects_bad_timestamp() {
        assert!(parse_timestamp("not-a-time").is_err());
    }
}
