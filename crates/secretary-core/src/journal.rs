//! Journal entries (`VJOURNAL`) and the request types that operate on them.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{SecretaryError, SecretaryResult};
use crate::ical::{self, Component, Properties};
use crate::time::{format_datetime_for_user, parse_ical_datetime};
use crate::validation::{
    validate_calendar_name, validate_journal_description, validate_journal_summary,
    validate_new_description,
};

/// Summary used when a journal carries none.
pub const UNTITLED_JOURNAL: &str = "Untitled Journal";

/// A journal entry read from a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Journal {
    summary: String,
    description: Option<String>,
    calendar_name: String,
    date_utc: Option<DateTime<Utc>>,
    date_local: Option<String>,
    status: Option<String>,
    #[serde(skip)]
    local_date: Option<NaiveDate>,
}

impl Journal {
    /// Builds a journal from raw calendar-object text.
    pub fn from_ical(raw: &str, calendar_name: &str, tz: &Tz) -> Self {
        Self::from_properties(
            &ical::parse_component(raw, Component::Journal),
            calendar_name,
            tz,
        )
    }

    /// Builds a journal from already parsed properties.
    pub fn from_properties(props: &Properties, calendar_name: &str, tz: &Tz) -> Self {
        let date_utc = props
            .property("DTSTART")
            .and_then(|p| parse_ical_datetime(&p.value, p.param("TZID")));

        Self {
            summary: props
                .get("SUMMARY")
                .map(ical::normalize_summary)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNTITLED_JOURNAL.to_string()),
            description: props.get("DESCRIPTION").map(ical::unescape_text),
            calendar_name: calendar_name.to_string(),
            date_local: format_datetime_for_user(date_utc, tz),
            local_date: date_utc.map(|dt| dt.with_timezone(tz).date_naive()),
            date_utc,
            status: props.get("STATUS").map(str::to_string),
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

    pub fn date_utc(&self) -> Option<DateTime<Utc>> {
        self.date_utc
    }

    /// Entry date in the user's timezone, RFC 3339.
    pub fn date_local(&self) -> Option<&str> {
        self.date_local.as_deref()
    }

    /// Calendar date of the entry in the user's timezone.
    pub fn local_date(&self) -> Option<NaiveDate> {
        self.local_date
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Whether the entry's local date string starts with `date`.
    pub fn is_on(&self, date: &str) -> bool {
        self.date_local
            .as_deref()
            .is_some_and(|local| local.starts_with(date.trim()))
    }
}

/// Parameters for creating a journal entry. The date defaults to today.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JournalCreate {
    pub calendar_name: String,
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub date: Option<String>,
}

impl JournalCreate {
    pub fn new(
        calendar_name: impl Into<String>,
        summary: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            calendar_name: calendar_name.into(),
            summary: summary.into(),
            description: description.into(),
            date: None,
        }
    }

    #[must_use]
    pub fn on(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn validate(&self) -> SecretaryResult<()> {
        validate_calendar_name(&self.calendar_name)?;
        validate_journal_summary(&self.summary)?;
        validate_journal_description(&self.description)
    }
}

/// Rewrites or appends to a journal's description.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JournalEdit {
    pub summary: String,
    pub calendar_name: String,
    pub new_description: String,
    #[serde(default = "default_append")]
    pub append: bool,
    #[serde(default)]
    pub date: Option<String>,
}

fn default_append() -> bool {
    true
}

impl JournalEdit {
    pub fn validate(&self) -> SecretaryResult<()> {
        validate_journal_summary(&self.summary)?;
        validate_calendar_name(&self.calendar_name)?;
        validate_new_description(&self.new_description)
    }
}

/// Identifies one journal for deletion, optionally by date.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JournalDelete {
    pub summary: String,
    pub calendar_name: String,
    #[serde(default)]
    pub date: Option<String>,
}

/// Filters for listing journals. `date` and `past_days` are exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JournalQuery {
    pub calendar_name: Option<String>,
    pub date: Option<String>,
    pub past_days: Option<i64>,
}

impl JournalQuery {
    pub fn validate(&self) -> SecretaryResult<()> {
        if self.date.is_some() && self.past_days.is_some() {
            return Err(SecretaryError::validation(
                "Cannot specify both 'date' and 'past_days' parameters. They are mutually exclusive.",
            ));
        }
        Ok(())
    }
}

/// Combines an existing description with new text.
///
/// Appending to non-empty content inserts a timestamped separator;
/// otherwise the new text replaces the old.
pub fn build_updated_description(
    current: &str,
    new: &str,
    append: bool,
    now: DateTime<Tz>,
) -> String {
    if append && !current.trim().is_empty() {
        format!(
            "{current}\n\n--- [{}] ---\n{new}",
            now.format("%Y-%m-%d %H:%M")
        )
    } else {
        new.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builds_journal_with_local_date() {
        let raw = "BEGIN:VCALENDAR\nBEGIN:VJOURNAL\nSUMMARY:Weekly Review\n\
                   DESCRIPTION:Shipped v1\\, fixed bugs\nDTSTART:20250711T230000Z\n\
                   STATUS:FINAL\nEND:VJOURNAL\nEND:VCALENDAR";
        let journal = Journal::from_ical(raw, "Journal", &chrono_tz::Europe::Paris);
        assert_eq!(journal.summary(), "Weekly Review");
        assert_eq!(journal.description(), Some("Shipped v1, fixed bugs"));
        assert_eq!(journal.date_local(), Some("2025-07-12T01:00:00+02:00"));
        assert_eq!(journal.local_date(), NaiveDate::from_ymd_opt(2025, 7, 12));
        assert_eq!(journal.status(), Some("FINAL"));
        assert!(journal.is_on("2025-07-12"));
        assert!(!journal.is_on("2025-07-11"));
    }

    #[test]
    fn untitled_and_undated() {
        let journal = Journal::from_ical("BEGIN:VJOURNAL\nEND:VJOURNAL", "c", &Tz::UTC);
        assert_eq!(journal.summary(), UNTITLED_JOURNAL);
        assert!(journal.date_utc().is_none());
        assert!(!journal.is_on("2025-07-12"));
    }

    #[test]
    fn serialization_skips_local_date() {
        let journal = Journal::from_ical(
            "BEGIN:VJOURNAL\nSUMMARY:Notes\nDTSTART;VALUE=DATE:20250712\nEND:VJOURNAL",
            "Journal",
            &Tz::UTC,
        );
        insta::assert_json_snapshot!(journal, @r#"
        {
          "summary": "Notes",
          "description": null,
          "calendar_name": "Journal",
          "date_utc": "2025-07-12T00:00:00Z",
          "date_local": "2025-07-12T00:00:00+00:00",
          "status": null
        }
        "#);
    }

    #[test]
    fn requests_validate() {
        assert!(JournalCreate::new("Journal", "Notes", "text").validate().is_ok());
        assert_eq!(
            JournalCreate::new("Journal", "Notes", " ").validate().unwrap_err().to_string(),
            "Journal description cannot be empty"
        );

        let edit: JournalEdit = serde_json::from_value(serde_json::json!({
            "summary": "Notes",
            "calendar_name": "Journal",
            "new_description": ""
        }))
        .unwrap();
        assert!(edit.append);
        assert_eq!(edit.validate().unwrap_err().to_string(), "New description cannot be empty");
    }

    #[test]
    fn query_rejects_date_with_window() {
        let query = JournalQuery {
            date: Some("2025-07-12".into()),
            past_days: Some(3),
            ..Default::default()
        };
        assert!(query.validate().unwrap_err().to_string().contains("mutually exclusive"));
        assert!(JournalQuery::default().validate().is_ok());
    }

    mod description {
        use super::*;

        fn now() -> DateTime<Tz> {
            Tz::UTC.with_ymd_and_hms(2025, 7, 12, 9, 5, 0).unwrap()
        }

        #[test]
        fn appends_with_separator() {
            assert_eq!(
                build_updated_description("Morning notes", "Afternoon notes", true, now()),
                "Morning notes\n\n--- [2025-07-12 09:05] ---\nAfternoon notes"
            );
        }

        #[test]
        fn append_to_empty_replaces() {
            assert_eq!(build_updated_description("", "First", true, now()), "First");
            assert_eq!(build_updated_description("  ", "First", true, now()), "First");
        }

        #[test]
        fn replace_mode() {
            assert_eq!(build_updated_description("Old", "New", false, now()), "New");
        }
    }
}
