//! Tasks (`VTODO`) and the request types that operate on them.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{SecretaryError, SecretaryResult};
use crate::ical::{self, Component, Properties};
use crate::time::parse_ical_date;
use crate::validation::{validate_calendar_name, validate_task_summary};

/// Summary used when a todo carries none.
pub const UNTITLED_TASK: &str = "Untitled Task";

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "NEEDS-ACTION")]
    NeedsAction,
    #[serde(rename = "IN-PROCESS")]
    InProcess,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::NeedsAction, Self::InProcess, Self::Completed];

    /// Returns the value as written in a `STATUS` property.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsAction => "NEEDS-ACTION",
            Self::InProcess => "IN-PROCESS",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = SecretaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| {
                SecretaryError::validation(format!(
                    "Invalid status '{s}'. Must be one of: NEEDS-ACTION, IN-PROCESS, COMPLETED"
                ))
            })
    }
}

/// A task read from a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    summary: String,
    description: Option<String>,
    calendar_name: String,
    due_date: Option<NaiveDate>,
    completed: bool,
    status: Option<TaskStatus>,
}

impl Task {
    /// Builds a task from raw calendar-object text.
    pub fn from_ical(raw: &str, calendar_name: &str) -> Self {
        Self::from_properties(&ical::parse_component(raw, Component::Todo), calendar_name)
    }

    /// Builds a task from already parsed properties.
    pub fn from_properties(props: &Properties, calendar_name: &str) -> Self {
        let summary = props
            .get("SUMMARY")
            .map(ical::normalize_summary)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNTITLED_TASK.to_string());
        let status = props.get("STATUS").and_then(|s| s.parse().ok());

        Self {
            summary,
            description: props.get("DESCRIPTION").map(ical::unescape_text),
            calendar_name: calendar_name.to_string(),
            due_date: props.get("DUE").and_then(parse_ical_date),
            completed: status == Some(TaskStatus::Completed),
            status,
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

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    /// True iff the status is `COMPLETED`.
    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn status(&self) -> Option<TaskStatus> {
        self.status
    }
}

/// Parameters for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskCreate {
    pub summary: String,
    pub calendar_name: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TaskCreate {
    pub fn new(summary: impl Into<String>, calendar_name: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            calendar_name: calendar_name.into(),
            due_date: None,
            description: None,
        }
    }

    #[must_use]
    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validates the request and returns the parsed due date.
    pub fn validate(&self) -> SecretaryResult<Option<NaiveDate>> {
        validate_task_summary(&self.summary)?;
        validate_calendar_name(&self.calendar_name)?;
        crate::dates::parse_due_date(self.due_date.as_deref())
    }
}

/// Parameters for changing (or clearing) a task's due date.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskUpdate {
    pub summary: String,
    pub calendar_name: String,
    #[serde(default)]
    pub new_due_date: Option<String>,
}

/// Identifies one task, for completion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskComplete {
    pub summary: String,
    pub calendar_name: String,
}

/// Identifies one task, for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskDelete {
    pub summary: String,
    pub calendar_name: String,
}

/// Moves a task between calendars.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskMove {
    pub summary: String,
    pub source_calendar: String,
    pub destination_calendar: String,
}

impl TaskMove {
    pub fn validate(&self) -> SecretaryResult<()> {
        validate_task_summary(&self.summary)?;
        validate_calendar_name(&self.source_calendar)?;
        validate_calendar_name(&self.destination_calendar)
    }
}

/// Sets a task's status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskStatusChange {
    pub summary: String,
    pub calendar_name: String,
    pub new_status: TaskStatus,
}

/// Filters for listing tasks.
///
/// `past_days` and `future_days` select tasks due in that window; tasks
/// without a due date always pass. The two windows are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaskQuery {
    pub include_completed: bool,
    pub calendar_name: Option<String>,
    pub past_days: Option<i64>,
    pub future_days: Option<i64>,
}

impl TaskQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn include_completed(mut self, include: bool) -> Self {
        self.include_completed = include;
        self
    }

    #[must_use]
    pub fn in_calendar(mut self, name: impl Into<String>) -> Self {
        self.calendar_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn past_days(mut self, days: i64) -> Self {
        self.past_days = Some(days);
        self
    }

    #[must_use]
    pub fn future_days(mut self, days: i64) -> Self {
        self.future_days = Some(days);
        self
    }

    /// Checks the window combination and sizes.
    pub fn validate(&self) -> SecretaryResult<()> {
        if self.past_days.is_some() && self.future_days.is_some() {
            return Err(SecretaryError::validation(
                "Cannot specify both past_days and future_days filters",
            ));
        }
        for (name, days) in [("past_days", self.past_days), ("future_days", self.future_days)] {
            if let Some(days) = days.filter(|d| *d < 1) {
                return Err(SecretaryError::validation(format!(
                    "{name} must be a positive integer, got: {days}"
                )));
            }
        }
        Ok(())
    }
}
