//! Core types: calendar-object text, time, tasks, events, journals

pub mod dates;
pub mod error;
pub mod event;
pub mod ical;
pub mod journal;
pub mod task;
pub mod time;
pub mod tracing;
pub mod validation;

pub use chrono_tz::Tz;
pub use dates::{
    DateRange, calculate_future_days_range, calculate_past_days_range, parse_date_range,
    parse_due_date, parse_instance_date, validate_date_string,
};
pub use error::{SecretaryError, SecretaryResult};
pub use event::{
    Event, EventCreate, EventDelete, EventInstanceCancel, EventInstanceModify, EventQuery,
    EventUpdate,
};
pub use ical::Component;
pub use journal::{
    Journal, JournalCreate, JournalDelete, JournalEdit, JournalQuery, build_updated_description,
};
pub use task::{
    Task, TaskComplete, TaskCreate, TaskDelete, TaskMove, TaskQuery, TaskStatus,
    TaskStatusChange, TaskUpdate,
};
pub use time::{TimeWindow, parse_datetime_to_utc, user_timezone};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
