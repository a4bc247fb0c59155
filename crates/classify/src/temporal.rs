//! Ordered-fallback coercion of text into temporal values.
//!
//! CDC sources emit both ISO-style (`2024-01-02T03:04:05`) and space-separated
//! (`2024-01-02 03:04:05`) text depending on upstream formatting. Each kind
//! carries an ordered pattern list, most specific first; the first pattern
//! that parses strictly, in UTC, wins.
use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::ClassifyError;
use crate::types::{FieldValue, TemporalKind};

pub const TIMESTAMP_PATTERNS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];
pub const DATE_PATTERNS: &[&str] = &["%Y-%m-%d"];
pub const TIME_PATTERNS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S"];

/// chrono resolves fractions to nanoseconds.
const MAX_FRACTION_DIGITS: usize = 9;

/// Canonical rendering of an event timestamp.
const CANONICAL_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn patterns_for(kind: TemporalKind) -> &'static [&'static str] {
    match kind {
        TemporalKind::Timestamp => TIMESTAMP_PATTERNS,
        TemporalKind::Date => DATE_PATTERNS,
        TemporalKind::Time => TIME_PATTERNS,
    }
}

/// Parses `value` as `kind`.
///
/// Blank input yields [`FieldValue::Null`]. When no pattern matches, the error
/// lists every pattern tried along with the offending input.
///
/// ```rust
/// use classify::{coerce, FieldValue, TemporalKind};
///
/// let value = coerce("2024-01-02 03:04:05", TemporalKind::Timestamp).unwrap();
/// assert!(matches!(value, FieldValue::Timestamp(_)));
///
/// assert_eq!(coerce("   ", TemporalKind::Date).unwrap(), FieldValue::Null);
/// assert!(coerce("2024-13-40", TemporalKind::Date).is_err());
/// ```
pub fn coerce(value: &str, kind: TemporalKind) -> Result<FieldValue, ClassifyError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(FieldValue::Null);
    }

    let patterns = patterns_for(kind);
    let parsed = patterns.iter().find_map(|pattern| match kind {
        TemporalKind::Timestamp => NaiveDateTime::parse_from_str(trimmed, pattern)
            .ok()
            .map(|naive| FieldValue::Timestamp(naive.and_utc())),
        TemporalKind::Date => NaiveDate::parse_from_str(trimmed, pattern)
            .ok()
            .map(FieldValue::Date),
        TemporalKind::Time => NaiveTime::parse_from_str(trimmed, pattern)
            .ok()
            .map(FieldValue::Time),
    });

    parsed.ok_or_else(|| ClassifyError::TimestampParseFailure {
        value: value.to_string(),
        kind,
        patterns: patterns.iter().map(|pattern| pattern.to_string()).collect(),
    })
}

/// Parses a timestamp header and renders it as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Journal timestamps carry up to 12 fractional digits; digits past
/// nanosecond precision are dropped before parsing. Output of this function
/// is accepted as input. Blank input yields `Ok(None)`.
pub fn canonical_timestamp(value: &str) -> Result<Option<String>, ClassifyError> {
    let trimmed = value.trim();
    let clamped = clamp_fraction(trimmed.strip_suffix('Z').unwrap_or(trimmed));
    match coerce(&clamped, TemporalKind::Timestamp) {
        Ok(FieldValue::Timestamp(ts)) => Ok(Some(render_timestamp(&ts))),
        Ok(_) => Ok(None),
        Err(ClassifyError::TimestampParseFailure { kind, patterns, .. }) => {
            Err(ClassifyError::TimestampParseFailure {
                value: value.to_string(),
                kind,
                patterns,
            })
        }
        Err(other) => Err(other),
    }
}

pub fn render_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(CANONICAL_TIMESTAMP).to_string()
}

fn clamp_fraction(value: &str) -> Cow<'_, str> {
    let Some(dot) = value.rfind('.') else {
        return Cow::Borrowed(value);
    };
    let fraction = &value[dot + 1..];
    let digits = fraction
        .bytes()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if digits <= MAX_FRACTION_DIGITS {
        return Cow::Borrowed(value);
    }
    let mut clamped = String::with_capacity(value.len());
    clamped.push_str(&value[..dot + 1 + MAX_FRACTION_DIGITS]);
    clamped.push_str(&fraction[digits..]);
    Cow::Owned(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn iso_timestamp_with_millis_parses() {
        let value = coerce("2024-01-02T03:04:05.678", TemporalKind::Timestamp).unwrap();
        let FieldValue::Timestamp(ts) = value else {
            panic!("expected timestamp, got {value:?}");
        };
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 1, 2));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (3, 4, 5));
        assert_eq!(ts.timestamp_subsec_millis(), 678);
    }

    #[test]
    fn space_separated_timestamp_parses() {
        let value = coerce(" 2026-01-15 12:01:00 ", TemporalKind::Timestamp).unwrap();
        assert_eq!(
            value,
            FieldValue::Timestamp(
                NaiveDate::from_ymd_opt(2026, 1, 15)
                    .unwrap()
                    .and_hms_opt(12, 1, 0)
                    .unwrap()
                    .and_utc()
            )
        );
    }

    #[test]
    fn garbage_lists_all_four_timestamp_patterns() {
        let err = coerce("not-a-date", TemporalKind::Timestamp).unwrap_err();
        let ClassifyError::TimestampParseFailure {
            value,
            kind,
            patterns,
        } = &err
        else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(value, "not-a-date");
        assert_eq!(*kind, TemporalKind::Timestamp);
        assert_eq!(patterns.len(), 4);
        for pattern in TIMESTAMP_PATTERNS {
            assert!(err.to_string().contains(pattern));
        }
    }

    #[test]
    fn impossible_dates_are_not_accepted() {
        assert!(coerce("2024-02-30", TemporalKind::Date).is_err());
        assert!(coerce("2024-13-01 00:00:00", TemporalKind::Timestamp).is_err());
        assert!(coerce("25:00:00", TemporalKind::Time).is_err());
    }

    #[test]
    fn time_with_and_without_millis() {
        let with = coerce("12:00:00.250", TemporalKind::Time).unwrap();
        let without = coerce("12:00:00", TemporalKind::Time).unwrap();
        assert_eq!(
            with,
            FieldValue::Time(NaiveTime::from_hms_milli_opt(12, 0, 0, 250).unwrap())
        );
        assert_eq!(
            without,
            FieldValue::Time(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
        );
    }

    #[test]
    fn canonical_rendering_is_idempotent() {
        let first = canonical_timestamp("2024-01-02 03:04:05.678")
            .unwrap()
            .unwrap();
        assert_eq!(first, "2024-01-02T03:04:05.678Z");

        let again = canonical_timestamp(&first).unwrap().unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn journal_timestamp_with_long_fraction_parses() {
        let rendered = canonical_timestamp("2026-01-15 12:00:00.000000000000")
            .unwrap()
            .unwrap();
        assert_eq!(rendered, "2026-01-15T12:00:00.000Z");
    }

    #[test]
    fn canonical_failure_reports_original_input() {
        let err = canonical_timestamp("15/01/2026 12:00").unwrap_err();
        assert!(err.to_string().starts_with("cannot parse '15/01/2026 12:00' as timestamp"));
    }

    #[test]
    fn blank_timestamp_has_no_canonical_form() {
        assert_eq!(canonical_timestamp("  ").unwrap(), None);
    }
}
