//! Calendar clients and the task/event/journal providers built on them.
//!
//! - [`CalendarClient`] - raw access to a calendar server (list, save, delete)
//! - [`caldav::CalDavClient`] and [`MemoryClient`] - its implementations
//! - [`CalendarStore`] - client, timezone, clock and calendar cache shared
//!   by the services
//! - [`CalendarProvider`], [`TaskProvider`], [`EventProvider`],
//!   [`JournalProvider`] - the operations exposed as tools
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐
//! │  CalDAV Server  │    │    in memory    │
//! └────────┬────────┘    └────────┬────────┘
//!          ▼                      ▼
//! ┌─────────────────┐    ┌─────────────────┐
//! │  CalDavClient   │    │  MemoryClient   │
//! └────────┬────────┘    └────────┬────────┘
//!          │    CalendarClient    │
//!          └──────────┬───────────┘
//!                     ▼
//!              ┌───────────────┐
//!              │ CalendarStore │
//!              └──────┬────────┘
//!                     ▼
//!   CalendarService  TaskService  EventService  JournalService
//! ```
//!
//! # Example
//!
//! ```ignore
//! use secretary_providers::{MemoryClient, ProviderSet};
//!
//! let client = MemoryClient::new().with_calendar("Work");
//! let providers = ProviderSet::from_client(Arc::new(client), chrono_tz::UTC);
//! let names = providers.calendars.unwrap().get_all_calendar_names().await?;
//! ```

#[cfg(feature = "caldav")]
pub mod caldav;
pub mod calendar;
pub mod client;
pub mod error;
pub mod event;
pub mod finder;
pub mod ics;
pub mod journal;
pub mod memory;
pub mod provider;
pub mod store;
pub mod task;

pub use calendar::CalendarService;
pub use client::{
    BoxFuture, CalendarClient, CalendarInfo, CalendarObject, NewEvent, NewJournal, NewObject,
    NewTodo, ObjectQuery,
};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use event::EventService;
pub use journal::JournalService;
// Test double, shared with the server's tests.
pub use memory::MemoryClient;
pub use provider::{CalendarProvider, EventProvider, JournalProvider, ProviderSet, TaskProvider};
pub use store::{CalendarStore, Clock};
pub use task::TaskService;
