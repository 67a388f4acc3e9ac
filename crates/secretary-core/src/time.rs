//! Timezone resolution and instant parsing.
//!
//! Instants are stored as UTC and only converted to the user's timezone for
//! display. [`TimeWindow`] is the half-open UTC range used for event queries.

use chrono::{
    DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SecretaryError, SecretaryResult};

/// Resolves the user's timezone.
///
/// Tries the system-reported zone, then the `TZ` environment variable, then
/// falls back to UTC. A tier that fails to resolve falls through silently.
pub fn user_timezone() -> Tz {
    let system = iana_time_zone::get_timezone().ok();
    let env = std::env::var("TZ").ok();
    resolve_timezone(system.as_deref(), env.as_deref())
}

/// Picks the first of `system` and `tz_env` that names a known zone.
pub fn resolve_timezone(system: Option<&str>, tz_env: Option<&str>) -> Tz {
    if let Some(tz) = system.and_then(parse_timezone) {
        return tz;
    }
    if let Some(tz) = tz_env.and_then(parse_timezone) {
        return tz;
    }
    debug!(?system, ?tz_env, "No usable timezone found, falling back to UTC");
    Tz::UTC
}

/// Parses an IANA zone name. A leading `:` (POSIX `TZ` style) is accepted.
pub fn parse_timezone(name: &str) -> Option<Tz> {
    let name = name.trim().trim_start_matches(':');
    if name.is_empty() {
        return None;
    }
    name.parse::<Tz>().ok()
}

const AWARE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a timezone-aware datetime and converts it to UTC.
///
/// Accepts a `Z` suffix or an explicit numeric offset. Values without zone
/// information are rejected.
pub fn parse_datetime_to_utc(value: &str) -> SecretaryResult<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Some(dt) = parse_aware(trimmed) {
        return Ok(dt);
    }
    if parse_naive(trimmed).is_some() {
        return Err(SecretaryError::validation(
            "Datetime must include timezone information",
        ));
    }
    Err(SecretaryError::validation(format!(
        "Invalid datetime format: {value}. Expected format: YYYY-MM-DDTHH:MM:SS+TZ \
         (e.g., '2025-07-08T14:00:00+00:00' or '2025-07-08T14:00:00Z')"
    )))
}

/// Returns true if `value` is a timezone-aware datetime.
pub fn validate_datetime_string(value: &str) -> bool {
    parse_datetime_to_utc(value).is_ok()
}

/// Parses an ISO 8601 datetime carrying `Z` or an offset.
pub(crate) fn parse_aware(value: &str) -> Option<DateTime<Utc>> {
    let normalized = match value.strip_suffix(['Z', 'z']) {
        Some(body) => format!("{body}+00:00"),
        None => value.to_string(),
    };
    AWARE_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses an ISO 8601 datetime or date without zone information.
pub(crate) fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Converts a UTC instant to `tz`.
pub fn utc_to_user_timezone(instant: DateTime<Utc>, tz: &Tz) -> DateTime<Tz> {
    instant.with_timezone(tz)
}

/// Converts a zone-less value, assumed to already be UTC, to `tz`.
pub fn naive_utc_to_user_timezone(naive: NaiveDateTime, tz: &Tz) -> DateTime<Tz> {
    Utc.from_utc_datetime(&naive).with_timezone(tz)
}

/// Formats an instant for display in `tz`, e.g. `2025-07-12T16:00:00+02:00`.
pub fn format_datetime_for_user(instant: Option<DateTime<Utc>>, tz: &Tz) -> Option<String> {
    instant.map(|dt| {
        utc_to_user_timezone(dt, tz).to_rfc3339_opts(SecondsFormat::Secs, false)
    })
}

/// Interprets a wall-clock value in `tz`, resolving DST gaps and folds to
/// the earliest valid instant. Falls back to treating the value as UTC.
pub fn local_to_utc(naive: NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Returns today's date in `tz`.
pub fn today_in(tz: &Tz) -> NaiveDate {
    Utc::now().with_timezone(tz).date_naive()
}

/// Parses an iCalendar date or date-time value into UTC.
///
/// Supported shapes:
/// - `20250712T140000Z` (UTC)
/// - `20250712T140000` (floating, interpreted in `tzid` when it names a
///   known zone, otherwise UTC)
/// - `20250712` (midnight UTC)
/// - ISO 8601 with or without offset
///
/// Returns `None` for anything else.
pub fn parse_ical_datetime(value: &str, tzid: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Some(match tzid.and_then(parse_timezone) {
            Some(tz) => local_to_utc(naive, &tz),
            None => Utc.from_utc_datetime(&naive),
        });
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    parse_aware(value).or_else(|| parse_naive(value).map(|naive| Utc.from_utc_datetime(&naive)))
}

/// Parses the date part of an iCalendar `DATE` or `DATE-TIME` value.
pub fn parse_ical_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    value
        .get(..8)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y%m%d").ok())
        .or_else(|| {
            value
                .get(..10)
                .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        })
}

/// Formats an instant as an iCalendar UTC date-time.
pub fn format_ical_datetime(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Formats a date as an iCalendar `DATE` value.
pub fn format_ical_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// A half-open time window `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window, returning `None` if `end` precedes `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Covers the whole local days `first..=last` in `tz`.
    pub fn for_days(first: NaiveDate, last: NaiveDate, tz: &Tz) -> Self {
        let start = local_to_utc(first.and_time(NaiveTime::MIN), tz);
        let end = last
            .succ_opt()
            .map(|next| local_to_utc(next.and_time(NaiveTime::MIN), tz))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    /// Returns the duration of this window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if `instant` falls within `[start, end)`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Checks if an item spanning `start..end` overlaps this window.
    ///
    /// A zero-length item at the window start counts as overlapping.
    pub fn overlaps(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        let end = end.unwrap_or(start);
        start < self.end && (end > self.start || start == self.start)
    }
}
