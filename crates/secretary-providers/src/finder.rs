//! Linear lookups of calendars and calendar objects.
//!
//! Matching is exact and case-sensitive on the record's identifying field,
//! after the record has been built from the raw text.

use secretary_core::{Event, Journal, SecretaryError, SecretaryResult, Task, Tz};

use crate::client::{CalendarInfo, CalendarObject};

/// Finds the calendar called `name`.
pub fn find_calendar_by_name<'a>(
    calendars: &'a [CalendarInfo],
    name: &str,
) -> SecretaryResult<&'a CalendarInfo> {
    calendars.iter().find(|c| c.name == name).ok_or_else(|| {
        let available: Vec<String> = calendars.iter().map(|c| format!("'{}'", c.name)).collect();
        SecretaryError::not_found(format!(
            "Calendar '{name}' not found. Available calendars: [{}]",
            available.join(", ")
        ))
    })
}

/// Finds the first todo of `calendar` whose summary is `summary`.
pub fn find_task_by_summary<'a>(
    objects: &'a [CalendarObject],
    calendar: &str,
    summary: &str,
) -> SecretaryResult<&'a CalendarObject> {
    objects
        .iter()
        .find(|o| Task::from_ical(&o.data, calendar).summary() == summary)
        .ok_or_else(|| {
            SecretaryError::not_found(format!(
                "Task '{summary}' not found in calendar '{calendar}'"
            ))
        })
}

/// Finds the first event of `calendar` whose summary is `summary`.
pub fn find_event_by_summary<'a>(
    objects: &'a [CalendarObject],
    calendar: &str,
    summary: &str,
    tz: &Tz,
) -> SecretaryResult<&'a CalendarObject> {
    objects
        .iter()
        .find(|o| Event::from_ical(&o.data, calendar, tz).summary() == summary)
        .ok_or_else(|| {
            SecretaryError::not_found(format!(
                "Event '{summary}' not found in calendar '{calendar}'"
            ))
        })
}

/// Like [`find_event_by_summary`], restricted to events with a recurrence rule.
pub fn find_recurring_event_by_summary<'a>(
    objects: &'a [CalendarObject],
    calendar: &str,
    summary: &str,
    tz: &Tz,
) -> SecretaryResult<&'a CalendarObject> {
    objects
        .iter()
        .find(|o| {
            let event = Event::from_ical(&o.data, calendar, tz);
            event.summary() == summary && event.is_recurring()
        })
        .ok_or_else(|| {
            SecretaryError::not_found(format!(
                "Recurring event '{summary}' not found in calendar '{calendar}'"
            ))
        })
}

/// Finds the journal called `summary`, optionally on a given local date.
///
/// Without a date, more than one journal with the same summary is an
/// [`Ambiguous`](SecretaryError::Ambiguous) error.
pub fn find_journal<'a>(
    objects: &'a [CalendarObject],
    calendar: &str,
    summary: &str,
    date: Option<&str>,
    tz: &Tz,
) -> SecretaryResult<&'a CalendarObject> {
    let mut matching = objects.iter().filter(|o| {
        let journal = Journal::from_ical(&o.data, calendar, tz);
        journal.summary() == summary && date.is_none_or(|d| journal.is_on(d))
    });

    let first = matching.next().ok_or_else(|| {
        let with_date = date.map(|d| format!(" with date '{d}'")).unwrap_or_default();
        SecretaryError::not_found(format!(
            "Journal '{summary}'{with_date} not found in calendar '{calendar}'"
        ))
    })?;

    if date.is_none() && matching.next().is_some() {
        return Err(SecretaryError::ambiguous(format!(
            "Multiple journals with summary '{summary}' found in calendar '{calendar}'. \
             Please specify a date to distinguish between them."
        )));
    }
    Ok(first)
}
