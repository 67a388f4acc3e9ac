//! Calendar-date parsing and relative day windows.

use std::sync::LazyLock;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;

use crate::error::{SecretaryError, SecretaryResult};
use crate::time::{parse_aware, parse_naive, today_in};

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

/// Parses an optional due date in strict `YYYY-MM-DD` form.
///
/// `None`, empty and whitespace-only input mean "no due date".
pub fn parse_due_date(value: Option<&str>) -> SecretaryResult<Option<NaiveDate>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    ISO_DATE
        .is_match(trimmed)
        .then(|| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok())
        .flatten()
        .map(Some)
        .ok_or_else(|| {
            SecretaryError::validation(format!(
                "Invalid due date format: {raw}. Expected YYYY-MM-DD"
            ))
        })
}

/// Parses the bounds of a range query.
///
/// Each bound is a date or ISO datetime; zone-less values are taken as UTC.
/// Equal bounds are allowed, an end before the start is not.
pub fn parse_date_range(start: &str, end: &str) -> SecretaryResult<(DateTime<Utc>, DateTime<Utc>)> {
    let invalid = || SecretaryError::validation("Invalid date format. Expected YYYY-MM-DD");
    let start_dt = parse_bound(start).ok_or_else(invalid)?;
    let end_dt = parse_bound(end).ok_or_else(invalid)?;

    if end_dt < start_dt {
        return Err(SecretaryError::validation(format!(
            "End date '{end}' cannot be before start date '{start}'"
        )));
    }

    Ok((start_dt, end_dt))
}

fn parse_bound(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    parse_aware(value).or_else(|| parse_naive(value).map(|naive| Utc.from_utc_datetime(&naive)))
}

/// Returns true if `value` is a bare `YYYY-MM-DD` date.
pub fn is_date_only(value: &str) -> bool {
    ISO_DATE.is_match(value.trim())
}

/// Parses the date identifying one instance of a recurring event.
pub fn parse_instance_date(value: &str) -> SecretaryResult<DateTime<Utc>> {
    parse_bound(value).ok_or_else(|| {
        SecretaryError::validation(format!("Invalid date format: {value}. Expected YYYY-MM-DD"))
    })
}

/// Returns true if `value` parses as a date or datetime.
pub fn validate_date_string(value: &str) -> bool {
    parse_instance_date(value).is_ok()
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// The `days` days ending with `today`, both inclusive.
    pub fn past_days(today: NaiveDate, days: i64) -> SecretaryResult<Self> {
        let span = span(days)?;
        Ok(Self {
            start: today.checked_sub_days(span).unwrap_or(NaiveDate::MIN),
            end: today,
        })
    }

    /// The `days` days starting with `today`, both inclusive.
    pub fn future_days(today: NaiveDate, days: i64) -> SecretaryResult<Self> {
        let span = span(days)?;
        Ok(Self {
            start: today,
            end: today.checked_add_days(span).unwrap_or(NaiveDate::MAX),
        })
    }

    /// Checks whether `date` lies within the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

fn span(days: i64) -> SecretaryResult<Days> {
    if days < 1 {
        return Err(SecretaryError::validation(format!(
            "Days must be a positive integer, got: {days}"
        )));
    }
    Ok(Days::new(days.unsigned_abs() - 1))
}

/// `(today - (days - 1), today)` in the user's timezone.
pub fn calculate_past_days_range(days: i64, tz: &Tz) -> SecretaryResult<(NaiveDate, NaiveDate)> {
    DateRange::past_days(today_in(tz), days).map(|r| (r.start, r.end))
}

/// `(today, today + (days - 1))` in the user's timezone.
pub fn calculate_future_days_range(
    days: i64,
    tz: &Tz,
) -> SecretaryResult<(NaiveDate, NaiveDate)> {
    DateRange::future_days(today_in(tz), days).map(|r| (r.start, r.end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    mod due_date {
        use super::*;

        #[test]
        fn accepts_iso_date() {
            assert_eq!(parse_due_date(Some("2025-07-12")).unwrap(), Some(date(2025, 7, 12)));
            assert_eq!(parse_due_date(Some(" 2024-02-29 ")).unwrap(), Some(date(2024, 2, 29)));
        }

        #[test]
        fn empty_means_none() {
            assert_eq!(parse_due_date(None).unwrap(), None);
            assert_eq!(parse_due_date(Some("")).unwrap(), None);
            assert_eq!(parse_due_date(Some("   ")).unwrap(), None);
        }

        #[test]
        fn rejects_other_shapes() {
            for bad in ["25-07-12", "2025/07/12", "12-07-2025", "2025-7-12", "2025-02-30", "tomorrow"] {
                let err = parse_due_date(Some(bad)).unwrap_err();
                assert_eq!(
                    err.to_string(),
                    format!("Invalid due date format: {bad}. Expected YYYY-MM-DD")
                );
            }
            assert!(parse_due_date(Some("2025-07-12T10:00:00")).is_err());
        }
    }

    mod date_range {
        use super::*;

        #[test]
        fn parses_dates_as_utc_midnight() {
            let (start, end) = parse_date_range("2025-07-01", "2025-07-31").unwrap();
            assert_eq!(start, utc(2025, 7, 1, 0));
            assert_eq!(end, utc(2025, 7, 31, 0));
        }

        #[test]
        fn equal_bounds_are_allowed() {
            let (start, end) = parse_date_range("2025-07-12", "2025-07-12").unwrap();
            assert_eq!(start, end);
        }

        #[test]
        fn accepts_datetimes() {
            let (start, end) =
                parse_date_range("2025-07-12T08:00:00", "2025-07-12T10:00:00+02:00").unwrap();
            assert_eq!(start, utc(2025, 7, 12, 8));
            assert_eq!(end, utc(2025, 7, 12, 8));
        }

        #[test]
        fn end_before_start_names_both_inputs() {
            let err = parse_date_range("2025-07-12", "2025-07-01").unwrap_err();
            let message = err.to_string();
            assert!(message.contains("cannot be before"));
            assert!(message.contains("'2025-07-12'"));
            assert!(message.contains("'2025-07-01'"));
        }

        #[test]
        fn invalid_input() {
            let err = parse_date_range("July 1st", "2025-07-12").unwrap_err();
            assert_eq!(err.to_string(), "Invalid date format. Expected YYYY-MM-DD");
            assert!(parse_date_range("2025-07-01", "").is_err());
        }

        #[test]
        fn date_only_detection() {
            assert!(is_date_only("2025-07-12"));
            assert!(!is_date_only("2025-07-12T00:00:00"));
        }
    }

    mod instance_date {
        use super::*;

        #[test]
        fn parses_date_and_datetime() {
            assert_eq!(parse_instance_date("2025-07-12").unwrap(), utc(2025, 7, 12, 0));
            assert_eq!(
                parse_instance_date("2025-07-12T14:00:00Z").unwrap(),
                utc(2025, 7, 12, 14)
            );
        }

        #[test]
        fn rejects_garbage() {
            let err = parse_instance_date("12/07/2025").unwrap_err();
            assert_eq!(err.to_string(), "Invalid date format: 12/07/2025. Expected YYYY-MM-DD");
        }

        #[test]
        fn validate_checks_calendar() {
            assert!(validate_date_string("2024-02-29"));
            assert!(!validate_date_string("2025-02-29"));
            assert!(!validate_date_string(""));
        }
    }

    mod windows {
        use super::*;

        #[test]
        fn one_day_is_today_in_both_directions() {
            let today = date(2025, 7, 12);
            let past = DateRange::past_days(today, 1).unwrap();
            let future = DateRange::future_days(today, 1).unwrap();
            assert_eq!(past, future);
            assert_eq!((past.start, past.end), (today, today));
        }

        #[test]
        fn spans_exactly_n_days() {
            let today = date(2025, 3, 1);
            for n in 1..=60 {
                let past = DateRange::past_days(today, n).unwrap();
                assert_eq!(past.end, today);
                assert_eq!(past.len_days(), n);

                let future = DateRange::future_days(today, n).unwrap();
                assert_eq!(future.start, today);
                assert_eq!(future.len_days(), n);
            }
        }

        #[test]
        fn week_spans_crossing_month_boundary() {
            let today = date(2025, 3, 1);
            let past = DateRange::past_days(today, 7).unwrap();
            assert_eq!(past.start, date(2025, 2, 23));
            assert!(past.contains(date(2025, 2, 28)));
            assert!(!past.contains(date(2025, 3, 2)));
        }

        #[test]
        fn rejects_non_positive_days() {
            for days in [0, -1, -30] {
                let err = DateRange::past_days(date(2025, 1, 1), days).unwrap_err();
                assert_eq!(
                    err.to_string(),
                    format!("Days must be a positive integer, got: {days}")
                );
                let err = DateRange::future_days(date(2025, 1, 1), days).unwrap_err();
                assert!(err.to_string().starts_with("Days must be a positive integer"));
            }
        }

        #[test]
        fn calculators_anchor_on_today() {
            let tz = Tz::UTC;
            let (start, end) = calculate_past_days_range(1, &tz).unwrap();
            assert_eq!(start, end);
            let (f_start, f_end) = calculate_future_days_range(1, &tz).unwrap();
            assert_eq!((f_start, f_end), (start, end));
        }
    }
}
