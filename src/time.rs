//! Date-time and duration parsers.
//!
//! Date-times accept an ISO-8601-like family of string forms. One case is
//! rejected on purpose: a `+` or `-` at the date/time boundary (byte 10),
//! as in `2000-01-01+01:00`, where the tail reads equally well as a time or
//! a timezone offset. The error suggests `T` as the separator instead.
//!
//! Durations use a compact unit-suffixed grammar: an optional leading `-`,
//! then ordered optional groups for weeks, days, hours, minutes, seconds,
//! milliseconds and microseconds (`17w 3d 5h 19m 22s 10ms 42us`),
//! concatenable in that fixed order only. The sign makes the grammar a
//! superset of what `Display` renders, so serialized values re-parse.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;

use crate::error::FlagError;
use crate::parsers::ArgParser;
use crate::value::Value;

/// Maximum accepted datetime input length in bytes.
pub const MAX_DATETIME_LEN: usize = 64;

/// Maximum accepted duration input length in bytes.
pub const MAX_DURATION_LEN: usize = 128;

/// Upper bound on duration magnitude: one thousand Julian years.
pub const MAX_DURATION_SECONDS: i64 = 1000 * 31_557_600;

pub struct DateTimeParser;

impl DateTimeParser {
    fn parse_str(&self, s: &str) -> Result<DateTime<FixedOffset>, FlagError> {
        if s.trim().is_empty() {
            return Err(FlagError::BadDateTime {
                value: s.to_string(),
                reason: "empty or whitespace-only input".to_string(),
            });
        }
        if s.len() > MAX_DATETIME_LEN {
            return Err(FlagError::BoundExceeded {
                what: "datetime input length",
                max: MAX_DATETIME_LEN,
            });
        }

        // `2000-01-01+01:00` could be date+time or date+offset. Refuse to
        // guess and point at an unambiguous separator.
        if let Some(boundary) = s.get(10..11)
            && (boundary == "+" || boundary == "-")
            && let Some(date) = s.get(..10)
            && let Some(time) = s.get(11..)
        {
            return Err(FlagError::AmbiguousDateTimeSeparator {
                value: s.to_string(),
                separator: boundary.chars().next().unwrap_or('-'),
                suggestion: format!("{date}T{time}"),
            });
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt);
        }
        for format in [
            "%Y-%m-%d %H:%M:%S%.f%:z",
            "%Y-%m-%dT%H:%M%:z",
            "%Y-%m-%d %H:%M%:z",
        ] {
            if let Ok(dt) = DateTime::parse_from_str(s, format) {
                return Ok(dt);
            }
        }
        for format in [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(naive.and_utc().fixed_offset());
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            && let Some(midnight) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(midnight.and_utc().fixed_offset());
        }
        Err(FlagError::BadDateTime {
            value: s.to_string(),
            reason: "unrecognized ISO-8601 form".to_string(),
        })
    }
}

impl ArgParser for DateTimeParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        match raw {
            Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
            Value::Str(s) => self.parse_str(s).map(Value::DateTime),
            other => Err(FlagError::BadDateTime {
                value: other.to_string(),
                reason: format!("expected a datetime or string, got {}", other.type_name()),
            }),
        }
    }

    fn flag_type(&self) -> &'static str {
        "datetime"
    }
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?x)^\s*
              (-)?\s*
              (?:(\d+)\s*w\s*)?
              (?:(\d+)\s*d\s*)?
              (?:(\d+)\s*h\s*)?
              (?:(\d+)\s*m\s*)?
              (?:(\d+)\s*s\s*)?
              (?:(\d+)\s*ms\s*)?
              (?:(\d+)\s*us\s*)?
              $",
        )
        .expect("flagtree: duration pattern is a constant")
    })
}

pub struct DurationParser;

impl DurationParser {
    fn parse_str(&self, s: &str) -> Result<TimeDelta, FlagError> {
        if s.trim().is_empty() {
            return Err(FlagError::BadDuration {
                value: s.to_string(),
                reason: "empty or whitespace-only input".to_string(),
            });
        }
        if s.len() > MAX_DURATION_LEN {
            return Err(FlagError::BoundExceeded {
                what: "duration input length",
                max: MAX_DURATION_LEN,
            });
        }
        let captures = duration_pattern().captures(s).ok_or_else(|| {
            FlagError::BadDuration {
                value: s.to_string(),
                reason: "expected ordered groups of <integer><unit> with units \
                         w, d, h, m, s, ms, us"
                    .to_string(),
            }
        })?;

        const MICROS_PER_UNIT: [i64; 7] = [
            7 * 24 * 3_600_000_000, // w
            24 * 3_600_000_000,     // d
            3_600_000_000,          // h
            60_000_000,             // m
            1_000_000,              // s
            1_000,                  // ms
            1,                      // us
        ];

        let negative = captures.get(1).is_some();
        let mut total_micros: i64 = 0;
        let mut any = false;
        for (i, unit_micros) in MICROS_PER_UNIT.iter().enumerate() {
            let Some(group) = captures.get(i + 2) else {
                continue;
            };
            any = true;
            let count: i64 = group.as_str().parse().map_err(|_| {
                FlagError::DurationOutOfRange {
                    value: s.to_string(),
                }
            })?;
            total_micros = count
                .checked_mul(*unit_micros)
                .and_then(|part| total_micros.checked_add(part))
                .ok_or_else(|| FlagError::DurationOutOfRange {
                    value: s.to_string(),
                })?;
        }
        if !any {
            return Err(FlagError::BadDuration {
                value: s.to_string(),
                reason: "no duration groups found".to_string(),
            });
        }
        if negative {
            total_micros = -total_micros;
        }
        check_magnitude(TimeDelta::microseconds(total_micros), s)
    }
}

fn check_magnitude(d: TimeDelta, raw: &str) -> Result<TimeDelta, FlagError> {
    if d.num_seconds().abs() > MAX_DURATION_SECONDS {
        return Err(FlagError::DurationOutOfRange {
            value: raw.to_string(),
        });
    }
    Ok(d)
}

impl ArgParser for DurationParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        match raw {
            Value::Duration(d) => check_magnitude(*d, &raw.to_string()).map(Value::Duration),
            Value::Str(s) => self.parse_str(s).map(Value::Duration),
            other => Err(FlagError::BadDuration {
                value: other.to_string(),
                reason: format!("expected a duration or string, got {}", other.type_name()),
            }),
        }
    }

    fn flag_type(&self) -> &'static str {
        "duration"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_full_iso_with_offset() {
        let p = DateTimeParser;
        let parsed = p
            .parse(&Value::Str("1970-01-01T08:00:00-08:00".into()))
            .unwrap();
        let dt = parsed.as_datetime().unwrap();
        assert_eq!(dt.timestamp(), 8 * 3600 + 8 * 3600);
    }

    #[test]
    fn datetime_ambiguous_boundary_separator_rejected() {
        let p = DateTimeParser;
        let err = p.parse(&Value::Str("1970-01-01-08:00".into())).unwrap_err();
        match err {
            FlagError::AmbiguousDateTimeSeparator { suggestion, .. } => {
                assert_eq!(suggestion, "1970-01-01T08:00");
            }
            other => panic!("expected AmbiguousDateTimeSeparator, got: {other:?}"),
        }
        assert!(matches!(
            p.parse(&Value::Str("2000-01-01+01:00".into())),
            Err(FlagError::AmbiguousDateTimeSeparator { .. })
        ));
    }

    #[test]
    fn datetime_naive_forms() {
        let p = DateTimeParser;
        for input in [
            "2001-02-03",
            "2001-02-03 04:05",
            "2001-02-03T04:05:06",
            "2001-02-03 04:05:06.500",
        ] {
            assert!(
                p.parse(&Value::Str(input.into())).is_ok(),
                "failed for {input}"
            );
        }
    }

    #[test]
    fn datetime_rejects_empty_and_garbage() {
        let p = DateTimeParser;
        assert!(p.parse(&Value::Str("".into())).is_err());
        assert!(p.parse(&Value::Str("   ".into())).is_err());
        assert!(p.parse(&Value::Str("not a date".into())).is_err());
    }

    #[test]
    fn datetime_rejects_over_long_input() {
        let p = DateTimeParser;
        let input = "2001-01-01".repeat(20);
        assert!(matches!(
            p.parse(&Value::Str(input)),
            Err(FlagError::BoundExceeded { .. })
        ));
    }

    #[test]
    fn datetime_typed_passthrough() {
        let p = DateTimeParser;
        let dt = DateTime::parse_from_rfc3339("2020-05-01T12:00:00+02:00").unwrap();
        assert_eq!(p.parse(&Value::DateTime(dt)).unwrap(), Value::DateTime(dt));
    }

    #[test]
    fn duration_all_groups() {
        let p = DurationParser;
        let parsed = p
            .parse(&Value::Str("17w 3d 5h 19m 22s 10ms 42us".into()))
            .unwrap();
        let expected = TimeDelta::weeks(17)
            + TimeDelta::days(3)
            + TimeDelta::hours(5)
            + TimeDelta::minutes(19)
            + TimeDelta::seconds(22)
            + TimeDelta::milliseconds(10)
            + TimeDelta::microseconds(42);
        assert_eq!(parsed.as_duration().unwrap(), expected);
    }

    #[test]
    fn duration_compact_and_partial() {
        let p = DurationParser;
        assert_eq!(
            p.parse(&Value::Str("1h30m".into())).unwrap().as_duration(),
            Some(TimeDelta::minutes(90))
        );
        assert_eq!(
            p.parse(&Value::Str("250ms".into())).unwrap().as_duration(),
            Some(TimeDelta::milliseconds(250))
        );
    }

    #[test]
    fn duration_negative_round_trips_through_display() {
        let p = DurationParser;
        assert_eq!(
            p.parse(&Value::Str("-1m30s".into())).unwrap().as_duration(),
            Some(TimeDelta::seconds(-90))
        );
        let rendered = Value::Duration(TimeDelta::seconds(-90)).to_string();
        assert_eq!(rendered, "-1m30s");
        assert_eq!(
            p.parse(&Value::Str(rendered)).unwrap(),
            Value::Duration(TimeDelta::seconds(-90))
        );
        // A bare sign is not a duration.
        assert!(p.parse(&Value::Str("-".into())).is_err());
    }

    #[test]
    fn duration_unknown_unit_rejected() {
        let p = DurationParser;
        assert!(matches!(
            p.parse(&Value::Str("53u".into())),
            Err(FlagError::BadDuration { .. })
        ));
        assert!(p.parse(&Value::Str("5x".into())).is_err());
    }

    #[test]
    fn duration_out_of_order_groups_rejected() {
        let p = DurationParser;
        assert!(p.parse(&Value::Str("10s 5m".into())).is_err());
    }

    #[test]
    fn duration_magnitude_bounded() {
        let p = DurationParser;
        assert!(matches!(
            p.parse(&Value::Str("99999999w".into())),
            Err(FlagError::DurationOutOfRange { .. })
        ));
        // Just under the bound is fine.
        assert!(p.parse(&Value::Str("52000w".into())).is_ok());
    }

    #[test]
    fn duration_round_trips_through_display() {
        let p = DurationParser;
        let original = p
            .parse(&Value::Str("17w3d5h19m22s10ms42us".into()))
            .unwrap();
        let rendered = original.to_string();
        assert_eq!(p.parse(&Value::Str(rendered)).unwrap(), original);
    }

    #[test]
    fn duration_typed_passthrough_still_bounded() {
        let p = DurationParser;
        let ok = TimeDelta::hours(1);
        assert_eq!(p.parse(&Value::Duration(ok)).unwrap(), Value::Duration(ok));
        let too_big = TimeDelta::seconds(MAX_DURATION_SECONDS + 1);
        assert!(p.parse(&Value::Duration(too_big)).is_err());
    }
}
