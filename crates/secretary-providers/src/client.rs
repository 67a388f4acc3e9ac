//! The remote calendar client contract.
//!
//! Providers talk to the calendar server only through [`CalendarClient`]:
//! list and create calendars, list the objects of a calendar, save new
//! objects from typed fields, re-save mutated raw text and delete objects.
//! Everything is exchanged as raw iCalendar text.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, NaiveDate, Utc};
use secretary_core::{Component, TaskStatus, TimeWindow, ical};

use crate::error::ProviderResult;

/// A boxed future for async trait methods, keeping the traits object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A calendar collection on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarInfo {
    /// Server identifier (the collection URL for CalDAV).
    pub id: String,
    /// Display name, the key users refer to calendars by.
    pub name: String,
    pub description: Option<String>,
}

impl CalendarInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One stored calendar object and its raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarObject {
    /// Location of the object on the server.
    pub href: String,
    /// Entity tag of the stored revision, used for conditional writes.
    pub etag: Option<String>,
    /// Raw iCalendar text.
    pub data: String,
}

impl CalendarObject {
    pub fn new(href: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            etag: None,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Returns a copy carrying `data` in place of the current text.
    #[must_use]
    pub fn with_data(&self, data: impl Into<String>) -> Self {
        Self {
            href: self.href.clone(),
            etag: self.etag.clone(),
            data: data.into(),
        }
    }
}

/// Which objects of a calendar to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectQuery {
    pub component: Component,
    /// For todos: also return completed ones.
    pub include_completed: bool,
    /// Only objects overlapping this window.
    pub window: Option<TimeWindow>,
    /// Expand recurring objects into one object per occurrence in `window`.
    pub expand: bool,
}

impl ObjectQuery {
    pub fn todos(include_completed: bool) -> Self {
        Self {
            component: Component::Todo,
            include_completed,
            window: None,
            expand: false,
        }
    }

    pub fn events() -> Self {
        Self {
            component: Component::Event,
            include_completed: true,
            window: None,
            expand: false,
        }
    }

    pub fn journals() -> Self {
        Self {
            component: Component::Journal,
            include_completed: true,
            window: None,
            expand: false,
        }
    }

    /// Restricts to `window` and expands recurrences within it.
    #[must_use]
    pub fn expanded_over(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self.expand = true;
        self
    }
}

/// Fields of a new todo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTodo {
    pub summary: String,
    pub description: Option<String>,
    pub due: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
}

/// Fields of a new event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rrule: Option<String>,
}

/// Fields of a new journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJournal {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
}

/// A calendar object to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewObject {
    Todo(NewTodo),
    Event(NewEvent),
    Journal(NewJournal),
}

impl NewObject {
    pub fn component(&self) -> Component {
        match self {
            Self::Todo(_) => Component::Todo,
            Self::Event(_) => Component::Event,
            Self::Journal(_) => Component::Journal,
        }
    }
}

/// Returns true if raw todo text carries `STATUS:COMPLETED`.
pub fn is_completed_todo(data: &str) -> bool {
    ical::parse_component(data, Component::Todo).get("STATUS") == Some("COMPLETED")
}

/// Access to a remote calendar server.
///
/// Implementations must be `Send + Sync`; the providers share one client.
pub trait CalendarClient: Send + Sync {
    /// Short name used in logs and errors (e.g. "caldav").
    fn name(&self) -> &str;

    /// Lists the calendars visible to the configured account.
    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>>;

    /// Creates a calendar named `name`.
    fn create_calendar<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ProviderResult<CalendarInfo>>;

    /// Lists the objects of `calendar` selected by `query`.
    fn list_objects<'a>(
        &'a self,
        calendar: &'a CalendarInfo,
        query: ObjectQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarObject>>>;

    /// Stores a new object in `calendar`.
    fn save_new<'a>(
        &'a self,
        calendar: &'a CalendarInfo,
        object: NewObject,
    ) -> BoxFuture<'a, ProviderResult<CalendarObject>>;

    /// Writes the (mutated) raw text of an existing object back.
    fn save<'a>(&'a self, object: &'a CalendarObject) -> BoxFuture<'a, ProviderResult<()>>;

    /// Deletes an existing object.
    fn delete<'a>(&'a self, object: &'a CalendarObject) -> BoxFuture<'a, ProviderResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_info_builder() {
        let info = CalendarInfo::new("/cal/work/", "Work").with_description("Office");
        assert_eq!(info.id, "/cal/work/");
        assert_eq!(info.name, "Work");
        assert_eq!(info.description.as_deref(), Some("Office"));
    }

    #[test]
    fn object_with_data_keeps_identity() {
        let object = CalendarObject::new("/cal/work/1.ics", "old").with_etag("abc");
        let updated = object.with_data("new");
        assert_eq!(updated.href, object.href);
        assert_eq!(updated.etag.as_deref(), Some("abc"));
        assert_eq!(updated.data, "new");
    }

    #[test]
    fn query_builders() {
        let todos = ObjectQuery::todos(false);
        assert_eq!(todos.component, Component::Todo);
        assert!(!todos.include_completed);
        assert!(todos.window.is_none());

        let window = TimeWindow::new(Utc::now(), Utc::now()).unwrap();
        let events = ObjectQuery::events().expanded_over(window);
        assert!(events.expand);
        assert_eq!(events.window, Some(window));
    }

    #[test]
    fn completed_todo_detection() {
        assert!(is_completed_todo("BEGIN:VTODO\nSTATUS:COMPLETED\nEND:VTODO"));
        assert!(!is_completed_todo("BEGIN:VTODO\nSTATUS:NEEDS-ACTION\nEND:VTODO"));
        assert!(!is_completed_todo("BEGIN:VTODO\nSUMMARY:x\nEND:VTODO"));
    }
}
