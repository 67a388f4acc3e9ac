//! Capability traits of the providers.
//!
//! Each capability set (calendars, tasks, events, journals) is its own
//! trait so the server can enable tool groups independently. Every method
//! returns either records or a confirmation string; errors are
//! [`SecretaryError`](secretary_core::SecretaryError)s whose text is shown
//! to the caller as is.

use std::fmt;
use std::sync::Arc;

use secretary_core::{
    Event, EventCreate, EventDelete, EventInstanceCancel, EventInstanceModify, EventQuery,
    EventUpdate, Journal, JournalCreate, JournalDelete, JournalEdit, JournalQuery,
    SecretaryResult, Task, TaskComplete, TaskCreate, TaskDelete, TaskMove, TaskQuery,
    TaskStatusChange, TaskUpdate, Tz,
};

use crate::calendar::CalendarService;
use crate::client::{BoxFuture, CalendarClient};
use crate::event::EventService;
use crate::journal::JournalService;
use crate::store::CalendarStore;
use crate::task::TaskService;

/// Calendar listing and creation.
pub trait CalendarProvider: Send + Sync {
    /// Names of every calendar visible to the account.
    fn get_all_calendar_names(&self) -> BoxFuture<'_, SecretaryResult<Vec<String>>>;

    /// Creates a calendar called `name`.
    fn create_new_calendar<'a>(&'a self, name: &'a str) -> BoxFuture<'a, SecretaryResult<String>>;
}

/// Task (todo) management.
pub trait TaskProvider: Send + Sync {
    fn get_tasks(&self, query: TaskQuery) -> BoxFuture<'_, SecretaryResult<Vec<Task>>>;

    fn add_task(&self, request: TaskCreate) -> BoxFuture<'_, SecretaryResult<String>>;

    /// Sets the due date, or removes it when `new_due_date` is `None`.
    fn edit_due_date(&self, request: TaskUpdate) -> BoxFuture<'_, SecretaryResult<String>>;

    fn complete_task(&self, request: TaskComplete) -> BoxFuture<'_, SecretaryResult<String>>;

    fn delete_task(&self, request: TaskDelete) -> BoxFuture<'_, SecretaryResult<String>>;

    /// Recreates a task in another calendar and deletes the original.
    fn move_task(&self, request: TaskMove) -> BoxFuture<'_, SecretaryResult<String>>;

    fn change_task_status(
        &self,
        request: TaskStatusChange,
    ) -> BoxFuture<'_, SecretaryResult<String>>;
}

/// Event management, including single occurrences of recurring events.
pub trait EventProvider: Send + Sync {
    /// Events overlapping the query range, recurrences expanded.
    fn get_events(&self, query: EventQuery) -> BoxFuture<'_, SecretaryResult<Vec<Event>>>;

    fn add_event(&self, request: EventCreate) -> BoxFuture<'_, SecretaryResult<String>>;

    fn edit_event(&self, request: EventUpdate) -> BoxFuture<'_, SecretaryResult<String>>;

    fn delete_event(&self, request: EventDelete) -> BoxFuture<'_, SecretaryResult<String>>;

    /// Excludes one occurrence of a recurring event.
    fn cancel_event_instance(
        &self,
        request: EventInstanceCancel,
    ) -> BoxFuture<'_, SecretaryResult<String>>;

    /// Overrides one occurrence of a recurring event.
    fn modify_event_instance(
        &self,
        request: EventInstanceModify,
    ) -> BoxFuture<'_, SecretaryResult<String>>;
}

/// Journal management.
pub trait JournalProvider: Send + Sync {
    fn create_journal(&self, request: JournalCreate) -> BoxFuture<'_, SecretaryResult<String>>;

    fn get_journals(&self, query: JournalQuery) -> BoxFuture<'_, SecretaryResult<Vec<Journal>>>;

    /// Appends to or replaces a journal's description.
    fn edit_journal(&self, request: JournalEdit) -> BoxFuture<'_, SecretaryResult<String>>;

    fn delete_journal(&self, request: JournalDelete) -> BoxFuture<'_, SecretaryResult<String>>;
}

/// The providers available to the server, one optional slot per capability.
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub calendars: Option<Arc<dyn CalendarProvider>>,
    pub tasks: Option<Arc<dyn TaskProvider>>,
    pub events: Option<Arc<dyn EventProvider>>,
    pub journals: Option<Arc<dyn JournalProvider>>,
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSet")
            .field("calendars", &self.calendars.is_some())
            .field("tasks", &self.tasks.is_some())
            .field("events", &self.events.is_some())
            .field("journals", &self.journals.is_some())
            .finish()
    }
}

impl ProviderSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capability, backed by `client` in timezone `timezone`.
    pub fn from_client(client: Arc<dyn CalendarClient>, timezone: Tz) -> Self {
        Self::from_store(Arc::new(CalendarStore::new(client, timezone)))
    }

    /// Every capability, sharing `store` (and its calendar cache).
    pub fn from_store(store: Arc<CalendarStore>) -> Self {
        Self {
            calendars: Some(Arc::new(CalendarService::new(store.clone()))),
            tasks: Some(Arc::new(TaskService::new(store.clone()))),
            events: Some(Arc::new(EventService::new(store.clone()))),
            journals: Some(Arc::new(JournalService::new(store))),
        }
    }

    #[must_use]
    pub fn with_calendars(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.calendars = Some(provider);
        self
    }

    #[must_use]
    pub fn with_tasks(mut self, provider: Arc<dyn TaskProvider>) -> Self {
        self.tasks = Some(provider);
        self
    }

    #[must_use]
    pub fn with_events(mut self, provider: Arc<dyn EventProvider>) -> Self {
        self.events = Some(provider);
        self
    }

    #[must_use]
    pub fn with_journals(mut self, provider: Arc<dyn JournalProvider>) -> Self {
        self.journals = Some(provider);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;

    #[test]
    fn from_client_fills_every_slot() {
        let set = ProviderSet::from_client(Arc::new(MemoryClient::new()), Tz::UTC);
        assert!(set.calendars.is_some());
        assert!(set.tasks.is_some());
        assert!(set.events.is_some());
        assert!(set.journals.is_some());
    }

    #[test]
    fn builder_fills_single_slots() {
        let store = Arc::new(CalendarStore::new(Arc::new(MemoryClient::new()), Tz::UTC));
        let set = ProviderSet::new().with_tasks(Arc::new(TaskService::new(store)));
        assert!(set.tasks.is_some());
        assert!(set.events.is_none());
        assert_eq!(
            format!("{set:?}"),
            "ProviderSet { calendars: false, tasks: true, events: false, journals: false }"
        );
    }
}
