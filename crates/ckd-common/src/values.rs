//! Parsing helpers for raw warehouse cell values.

use chrono::{Datelike, NaiveDate};

/// Parses a string as `f64`, returning `None` for invalid or empty strings.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Parses a string as `i64`, returning `None` for invalid or empty strings.
pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok()
}

/// Parses an ISO date, ignoring any time component after the date.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ckd_common::parse_date;
///
/// let expected = NaiveDate::from_ymd_opt(2023, 6, 1);
/// assert_eq!(parse_date("2023-06-01"), expected);
/// assert_eq!(parse_date("2023-06-01 00:00:00.000"), expected);
/// assert_eq!(parse_date("2023-06-01T08:30:00"), expected);
/// assert_eq!(parse_date(""), None);
/// ```
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Parses a 0/1 style indicator. Anything unrecognised, including null, is false.
pub fn parse_flag(value: &str) -> bool {
    let trimmed = value.trim();
    if let Some(number) = parse_f64(trimmed) {
        return number == 1.0;
    }
    trimmed.eq_ignore_ascii_case("y")
        || trimmed.eq_ignore_ascii_case("yes")
        || trimmed.eq_ignore_ascii_case("true")
}

/// Formats a date as its `yyyyMM` month key.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_f64() {
        assert_eq!(parse_f64(""), None);
        assert_eq!(parse_f64("  "), None);
        assert_eq!(parse_f64("  58.5  "), Some(58.5));
        assert_eq!(parse_f64("NULL"), None);
    }

    #[test]
    fn test_parse_i64() {
        assert_eq!(parse_i64("42"), Some(42));
        assert_eq!(parse_i64("  -100  "), Some(-100));
        assert_eq!(parse_i64("4.2"), None);
    }

    #[test]
    fn test_parse_date_rejects_partial_dates() {
        assert_eq!(parse_date("2023-06"), None);
        assert_eq!(parse_date("06/01/2023"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("1.0"));
        assert!(parse_flag("Y"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("N"));
    }

    #[test]
    fn test_month_key() {
        let date = NaiveDate::from_ymd_opt(2023, 3, 9).unwrap();
        assert_eq!(month_key(date), "202303");
    }
}
