//! Renders new calendar objects as iCalendar text.

use chrono::{DateTime, Utc};
use secretary_core::TaskStatus;
use secretary_core::ical::escape_text;
use secretary_core::time::{format_ical_date, format_ical_datetime};

use crate::client::{NewEvent, NewJournal, NewObject, NewTodo};

/// `PRODID` written into every object we create.
pub const PRODID: &str = concat!("-//secretary//secretary ", env!("CARGO_PKG_VERSION"), "//EN");

/// Renders `object` as a complete `VCALENDAR` with CRLF line endings.
pub fn render(object: &NewObject, uid: &str, stamp: DateTime<Utc>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODID}"),
        format!("BEGIN:{}", object.component()),
        format!("UID:{uid}"),
        format!("DTSTAMP:{}", format_ical_datetime(stamp)),
    ];

    match object {
        NewObject::Todo(todo) => todo_lines(todo, stamp, &mut lines),
        NewObject::Event(event) => event_lines(event, &mut lines),
        NewObject::Journal(journal) => journal_lines(journal, &mut lines),
    }

    lines.push(format!("END:{}", object.component()));
    lines.push("END:VCALENDAR".to_string());

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

fn text(lines: &mut Vec<String>, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        lines.push(format!("{name}:{}", escape_text(value)));
    }
}

fn todo_lines(todo: &NewTodo, stamp: DateTime<Utc>, lines: &mut Vec<String>) {
    text(lines, "SUMMARY", Some(&todo.summary));
    text(lines, "DESCRIPTION", todo.description.as_deref());
    if let Some(due) = todo.due {
        lines.push(format!("DUE;VALUE=DATE:{}", format_ical_date(due)));
    }
    if let Some(status) = todo.status {
        lines.push(format!("STATUS:{status}"));
        if status == TaskStatus::Completed {
            lines.push(format!("COMPLETED:{}", format_ical_datetime(stamp)));
            lines.push("PERCENT-COMPLETE:100".to_string());
        }
    }
}

fn event_lines(event: &NewEvent, lines: &mut Vec<String>) {
    text(lines, "SUMMARY", Some(&event.summary));
    lines.push(format!("DTSTART:{}", format_ical_datetime(event.start)));
    lines.push(format!("DTEND:{}", format_ical_datetime(event.end)));
    text(lines, "DESCRIPTION", event.description.as_deref());
    text(lines, "LOCATION", event.location.as_deref());
    // RRULE is a structured value; its commas and semicolons stay as is.
    if let Some(rule) = event.rrule.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        lines.push(format!("RRULE:{rule}"));
    }
}

fn journal_lines(journal: &NewJournal, lines: &mut Vec<String>) {
    text(lines, "SUMMARY", Some(&journal.summary));
    text(lines, "DESCRIPTION", Some(&journal.description));
    lines.push(format!("DTSTART:{}", format_ical_datetime(journal.start)));
}
