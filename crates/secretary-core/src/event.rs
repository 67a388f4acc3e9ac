//! Events (`VEVENT`) and the request types that operate on them.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{SecretaryError, SecretaryResult};
use crate::ical::{self, Component, Properties};
use crate::time::{format_datetime_for_user, parse_datetime_to_utc, parse_ical_datetime};
use crate::validation::{validate_calendar_name, validate_event_summary};

/// Summary used when an event carries none.
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// An event read from a calendar.
///
/// Start and end are kept in UTC. The `*_local` strings are derived from
/// them at construction using the user's timezone and cannot be set
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    summary: String,
    description: Option<String>,
    calendar_name: String,
    start_utc: Option<DateTime<Utc>>,
    end_utc: Option<DateTime<Utc>>,
    start_local: Option<String>,
    end_local: Option<String>,
    location: Option<String>,
    status: Option<String>,
    rrule: Option<String>,
    is_recurring: bool,
}

impl Event {
    /// Builds an event from raw calendar-object text.
    pub fn from_ical(raw: &str, calendar_name: &str, tz: &Tz) -> Self {
        Self::from_properties(&ical::parse_component(raw, Component::Event), calendar_name, tz)
    }

    /// Builds an event from already parsed properties.
    pub fn from_properties(props: &Properties, calendar_name: &str, tz: &Tz) -> Self {
        let instant = |name: &str| {
            props
                .property(name)
                .and_then(|p| parse_ical_datetime(&p.value, p.param("TZID")))
        };
        let start_utc = instant("DTSTART");
        let end_utc = instant("DTEND");
        let rrule = props
            .get("RRULE")
            .map(str::to_string)
            .filter(|r| !r.trim().is_empty());

        Self {
            summary: props
                .get("SUMMARY")
                .map(ical::normalize_summary)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNTITLED_EVENT.to_string()),
            description: props.get("DESCRIPTION").map(ical::unescape_text),
            calendar_name: calendar_name.to_string(),
            start_local: format_datetime_for_user(start_utc, tz),
            end_local: format_datetime_for_user(end_utc, tz),
            start_utc,
            end_utc,
            location: props.get("LOCATION").map(ical::unescape_text),
            status: props.get("STATUS").map(str::to_string),
            is_recurring: rrule.is_some(),
            rrule,
        }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn calendar_name(&self) -> &str {
        &self.calendar_name
    }

    pub fn start_utc(&self) -> Option<DateTime<Utc>> {
        self.start_utc
    }

    pub fn end_utc(&self) -> Option<DateTime<Utc>> {
        self.end_utc
    }

    /// Start in the user's timezone, RFC 3339.
    pub fn start_local(&self) -> Option<&str> {
        self.start_local.as_deref()
    }

    /// End in the user's timezone, RFC 3339.
    pub fn end_local(&self) -> Option<&str> {
        self.end_local.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn rrule(&self) -> Option<&str> {
        self.rrule.as_deref()
    }

    pub fn is_recurring(&self) -> bool {
        self.is_recurring
    }
}

/// Parameters for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventCreate {
    pub summary: String,
    pub calendar_name: String,
    pub start_datetime: String,
    pub end_datetime: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub rrule: Option<String>,
}

impl EventCreate {
    pub fn new(
        summary: impl Into<String>,
        calendar_name: impl Into<String>,
        start_datetime: impl Into<String>,
        end_datetime: impl Into<String>,
    ) -> Self {
        Self {
            summary: summary.into(),
            calendar_name: calendar_name.into(),
            start_datetime: start_datetime.into(),
            end_datetime: end_datetime.into(),
            description: None,
            location: None,
            rrule: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_rrule(mut self, rrule: impl Into<String>) -> Self {
        self.rrule = Some(rrule.into());
        self
    }

    /// Validates the request and returns the UTC start and end.
    pub fn validate(&self) -> SecretaryResult<(DateTime<Utc>, DateTime<Utc>)> {
        validate_event_summary(&self.summary)?;
        validate_calendar_name(&self.calendar_name)?;
        let start = parse_datetime_to_utc(&self.start_datetime)?;
        let end = parse_datetime_to_utc(&self.end_datetime)?;
        ensure_ordered(start, end)?;
        Ok((start, end))
    }
}

/// Fails when `end` precedes `start`.
pub fn ensure_ordered(start: DateTime<Utc>, end: DateTime<Utc>) -> SecretaryResult<()> {
    if end < start {
        return Err(SecretaryError::validation(
            "End datetime cannot be before start datetime",
        ));
    }
    Ok(())
}

/// Changes to an existing event. `None` fields are left untouched; an empty
/// `new_rrule` removes the recurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventUpdate {
    pub summary: String,
    pub calendar_name: String,
    #[serde(default)]
    pub new_start_datetime: Option<String>,
    #[serde(default)]
    pub new_end_datetime: Option<String>,
    #[serde(default)]
    pub new_description: Option<String>,
    #[serde(default)]
    pub new_location: Option<String>,
    #[serde(default)]
    pub new_rrule: Option<String>,
}

impl EventUpdate {
    /// Human-readable list of the requested changes.
    pub fn describe_changes(&self) -> String {
        let mut changes = Vec::new();
        if let Some(start) = &self.new_start_datetime {
            changes.push(format!("start: {start}"));
        }
        if let Some(end) = &self.new_end_datetime {
            changes.push(format!("end: {end}"));
        }
        if self.new_description.is_some() {
            changes.push("description".to_string());
        }
        if let Some(location) = &self.new_location {
            changes.push(format!("location: {location}"));
        }
        match self.new_rrule.as_deref().map(str::trim) {
            Some("") => changes.push("recurrence removed".to_string()),
            Some(rule) => changes.push(format!("recurrence: {rule}")),
            None => {}
        }
        if changes.is_empty() {
            "no changes".to_string()
        } else {
            changes.join(", ")
        }
    }
}

/// Identifies one event, for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventDelete {
    pub summary: String,
    pub calendar_name: String,
}

/// Cancels one occurrence of a recurring event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventInstanceCancel {
    pub summary: String,
    pub calendar_name: String,
    pub instance_date: String,
}

/// Overrides one occurrence of a recurring event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventInstanceModify {
    pub summary: String,
    pub calendar_name: String,
    pub instance_date: String,
    #[serde(default)]
    pub new_start_datetime: Option<String>,
    #[serde(default)]
    pub new_end_datetime: Option<String>,
    #[serde(default)]
    pub new_description: Option<String>,
    #[serde(default)]
    pub new_location: Option<String>,
}

impl EventInstanceModify {
    pub fn describe_changes(&self) -> String {
        let mut changes = Vec::new();
        if let Some(start) = &self.new_start_datetime {
            changes.push(format!("start: {start}"));
        }
        if let Some(end) = &self.new_end_datetime {
            changes.push(format!("end: {end}"));
        }
        if self.new_description.is_some() {
            changes.push("description".to_string());
        }
        if let Some(location) = &self.new_location {
            changes.push(format!("location: {location}"));
        }
        if changes.is_empty() {
            "no changes".to_string()
        } else {
            changes.join(", ")
        }
    }
}

/// Lists events between two dates, optionally in one calendar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventQuery {
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub calendar_name: Option<String>,
}

impl EventQuery {
    pub fn new(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            calendar_name: None,
        }
    }

    #[must_use]
    pub fn in_calendar(mut self, name: impl Into<String>) -> Self {
        self.calendar_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    const STANDUP: &str = "BEGIN:VCALENDAR\n\
BEGIN:VEVENT\n\
UID:standup\n\
SUMMARY:Daily standup\n\
DTSTART:20250707T090000Z\n\
DTEND:20250707T091500Z\n\
LOCATION:Room 4\\, 2nd floor\n\
STATUS:CONFIRMED\n\
RRULE:FREQ=DAILY;BYDAY=MO,TU,WE,TH,FR\n\
END:VEVENT\n\
END:VCALENDAR";

    #[test]
    fn builds_recurring_event() {
        let event = Event::from_ical(STANDUP, "Work", &chrono_tz::Europe::Paris);
        assert_eq!(event.summary(), "Daily standup");
        assert_eq!(event.start_utc(), Some(utc(2025, 7, 7, 9, 0)));
        assert_eq!(event.end_utc(), Some(utc(2025, 7, 7, 9, 15)));
        assert_eq!(event.start_local(), Some("2025-07-07T11:00:00+02:00"));
        assert_eq!(event.end_local(), Some("2025-07-07T11:15:00+02:00"));
        assert_eq!(event.location(), Some("Room 4, 2nd floor"));
        assert_eq!(event.status(), Some("CONFIRMED"));
        assert_eq!(event.rrule(), Some("FREQ=DAILY;BYDAY=MO,TU,WE,TH,FR"));
        assert!(event.is_recurring());
    }

    #[test]
    fn local_strings_follow_timezone() {
        let event = Event::from_ical(STANDUP, "Work", &Tz::UTC);
        assert_eq!(event.start_local(), Some("2025-07-07T09:00:00+00:00"));
    }

    #[test]
    fn tzid_and_all_day_values() {
        let raw = "BEGIN:VEVENT\nSUMMARY:Offsite\nDTSTART;TZID=America/New_York:20250712T090000\n\
                   DTEND;VALUE=DATE:20250713\nEND:VEVENT";
        let event = Event::from_ical(raw, "Work", &Tz::UTC);
        assert_eq!(event.start_utc(), Some(utc(2025, 7, 12, 13, 0)));
        assert_eq!(event.end_utc(), Some(utc(2025, 7, 13, 0, 0)));
        assert!(!event.is_recurring());
    }

    #[test]
    fn defaults_and_unparseable_dates() {
        let event = Event::from_ical("BEGIN:VEVENT\nDTSTART:someday\nEND:VEVENT", "c", &Tz::UTC);
        assert_eq!(event.summary(), UNTITLED_EVENT);
        assert!(event.start_utc().is_none());
        assert!(event.start_local().is_none());
        assert!(event.rrule().is_none());
    }

    #[test]
    fn create_validation() {
        let ok = EventCreate::new("Lunch", "Work", "2025-07-12T12:00:00+02:00", "2025-07-12T13:00:00Z");
        assert_eq!(ok.validate().unwrap(), (utc(2025, 7, 12, 10, 0), utc(2025, 7, 12, 13, 0)));

        let naive = EventCreate::new("Lunch", "Work", "2025-07-12T12:00:00", "2025-07-12T13:00:00Z");
        assert_eq!(
            naive.validate().unwrap_err().to_string(),
            "Datetime must include timezone information"
        );

        let inverted =
            EventCreate::new("Lunch", "Work", "2025-07-12T13:00:00Z", "2025-07-12T12:00:00Z");
        assert!(inverted.validate().unwrap_err().to_string().contains("cannot be before"));

        let blank = EventCreate::new("", "Work", "2025-07-12T13:00:00Z", "2025-07-12T14:00:00Z");
        assert_eq!(blank.validate().unwrap_err().to_string(), "Event summary cannot be empty");
    }

    #[test]
    fn describes_changes() {
        let update = EventUpdate {
            summary: "x".into(),
            calendar_name: "c".into(),
            new_location: Some("Cafe".into()),
            new_rrule: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update.describe_changes(), "location: Cafe, recurrence removed");

        let modify = EventInstanceModify::default();
        assert_eq!(modify.describe_changes(), "no changes");
    }
}
