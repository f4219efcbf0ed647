//! Run-start timestamp parsing.

use anyhow::Context;
use checksum_result_relay::RunWindow;
use chrono::{DateTime, NaiveDateTime};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a run-start timestamp.
/// Supports:
/// - MySQL datetime, taken as-is: "2024-05-01 10:00:00", "2024-05-01 10:00:00.123456"
/// - ISO 8601 without offset, taken as-is: "2024-05-01T10:00:00"
/// - RFC 3339 with offset, converted to UTC: "2024-05-01T12:00:00+02:00"
///
/// The result must fit a MySQL `DATETIME`: years 1000..=9999, no leap second.
pub fn parse_start_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    let ts = parse_timestamp(s)?;
    RunWindow::new(ts).check()?;
    Ok(ts)
}

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty start timestamp");
    }

    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ts);
        }
    }

    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.naive_utc())
        .with_context(|| format!("Invalid start timestamp: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_parse_mysql_datetime() {
        assert_eq!(parse_start_ts("2024-05-01 10:00:00").unwrap(), at(10, 0, 0));
        assert_eq!(
            parse_start_ts("2024-05-01 10:00:00.250000").unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_micro_opt(10, 0, 0, 250_000)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_iso_without_offset() {
        assert_eq!(parse_start_ts(" 2024-05-01T10:00:00 ").unwrap(), at(10, 0, 0));
    }

    #[test]
    fn test_parse_rfc3339_converts_to_utc() {
        assert_eq!(
            parse_start_ts("2024-05-01T12:00:00+02:00").unwrap(),
            at(10, 0, 0)
        );
        assert_eq!(parse_start_ts("2024-05-01T10:00:00Z").unwrap(), at(10, 0, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_start_ts("").is_err());
        assert!(parse_start_ts("yesterday").is_err());
        let err = parse_start_ts("2024-13-01 00:00:00").unwrap_err();
        assert!(err.to_string().contains("Invalid start timestamp"));
    }

    #[test]
    fn test_parse_rejects_years_outside_datetime_range() {
        for input in ["+70000-01-01 00:00:00", "0999-12-31 23:59:59"] {
            let err = parse_start_ts(input).unwrap_err();
            assert!(
                format!("{err:#}").contains("outside the DATETIME range"),
                "{input}: {err:#}"
            );
        }
        assert!(parse_start_ts("1000-01-01 00:00:00").is_ok());
        assert!(parse_start_ts("9999-12-31 23:59:59.999999").is_ok());
    }

    #[test]
    fn test_parse_rejects_leap_second() {
        let err = parse_start_ts("2024-06-30 23:59:60").unwrap_err();
        assert!(format!("{err:#}").contains("Leap second"), "{err:#}");
    }
}
