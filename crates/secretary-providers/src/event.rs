//! Event (VEVENT) operations, including single occurrences of recurring
//! events.
//!
//! Occurrences are addressed the way CalDAV servers expect: a cancelled
//! occurrence is an `EXDATE` on the series, a modified one is an extra
//! `VEVENT` in the same object carrying a `RECURRENCE-ID`.

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use secretary_core::ical::{self, Component, Property};
use secretary_core::time::{
    format_ical_date, format_ical_datetime, local_to_utc, parse_ical_date, parse_ical_datetime,
};
use secretary_core::validation::{validate_calendar_name, validate_event_summary};
use secretary_core::{
    Event, EventCreate, EventDelete, EventInstanceCancel, EventInstanceModify, EventQuery,
    EventUpdate, SecretaryError, SecretaryResult, TimeWindow, Tz, dates, event::ensure_ordered,
    parse_date_range, parse_datetime_to_utc, parse_instance_date,
};
use tracing::{debug, info, warn};

use crate::client::{BoxFuture, CalendarInfo, CalendarObject, NewEvent, NewObject, ObjectQuery};
use crate::finder::{find_event_by_summary, find_recurring_event_by_summary};
use crate::provider::EventProvider;
use crate::store::CalendarStore;

#[derive(Debug, Clone)]
pub struct EventService {
    store: Arc<CalendarStore>,
}

/// How one occurrence is named inside its series, e.g. `;TZID=Europe/Paris`
/// and `20250714T090000`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InstanceId {
    params: String,
    value: String,
}

impl InstanceId {
    /// Names the occurrence on `instance_date` of a series starting at
    /// `dtstart`. A bare date keeps the series' time of day; for a UTC
    /// series that date is the user's local day in `tz`.
    fn new(
        dtstart: Option<&Property>,
        instance_date: &str,
        instant: DateTime<Utc>,
        tz: &Tz,
    ) -> Self {
        let utc = || Self {
            params: String::new(),
            value: format_ical_datetime(instant),
        };
        let Some(dtstart) = dtstart else {
            return utc();
        };

        if dtstart.param("VALUE") == Some("DATE") || dtstart.value.len() == 8 {
            return Self {
                params: ";VALUE=DATE".to_string(),
                value: instant.format("%Y%m%d").to_string(),
            };
        }
        if !dates::is_date_only(instance_date) {
            return utc();
        }

        if dtstart.value.ends_with('Z') {
            if let Some(series_start) = parse_ical_datetime(&dtstart.value, None) {
                let local_time = series_start.with_timezone(tz).time();
                let occurrence = local_to_utc(instant.date_naive().and_time(local_time), tz);
                return Self {
                    params: String::new(),
                    value: format_ical_datetime(occurrence),
                };
            }
        }

        let time_of_day = dtstart.value.get(8..).unwrap_or("T000000Z");
        Self {
            params: dtstart
                .param("TZID")
                .map(|tz| format!(";TZID={tz}"))
                .unwrap_or_default(),
            value: format!("{}{time_of_day}", instant.format("%Y%m%d")),
        }
    }

    fn tzid(&self) -> Option<&str> {
        self.params.strip_prefix(";TZID=")
    }

    fn line(&self, name: &str) -> String {
        format!("{name}{}:{}", self.params, self.value)
    }

    /// The occurrence's start as an instant.
    fn start(&self) -> Option<DateTime<Utc>> {
        parse_ical_datetime(&self.value, self.tzid())
    }
}

fn instant(props: &ical::Properties, name: &str) -> Option<DateTime<Utc>> {
    props
        .property(name)
        .and_then(|p| parse_ical_datetime(&p.value, p.param("TZID")))
}

fn parse_optional(value: Option<&str>) -> SecretaryResult<Option<DateTime<Utc>>> {
    value.map(parse_datetime_to_utc).transpose()
}

fn newline_of(raw: &str) -> &'static str {
    if raw.contains("\r\n") { "\r\n" } else { "\n" }
}

/// Sets a text property, or removes it when `value` is blank.
fn set_text(raw: &str, name: &str, value: &str) -> String {
    if value.trim().is_empty() {
        ical::remove_property(raw, name, Component::Event)
    } else {
        ical::update_property(raw, name, value, Component::Event)
    }
}

/// Drops any `VEVENT` override already carrying `RECURRENCE-ID` `value`.
fn without_override(raw: &str, value: &str) -> String {
    let newline = newline_of(raw);
    let mut kept: Vec<&str> = Vec::new();
    let mut block: Option<Vec<&str>> = None;

    for line in raw.lines() {
        match block.as_mut() {
            None if line == "BEGIN:VEVENT" => block = Some(vec![line]),
            None => kept.push(line),
            Some(lines) => {
                lines.push(line);
                if line == "END:VEVENT" {
                    let lines = block.take().unwrap_or_default();
                    let replaced = ical::find_property(&lines.join("\n"), "RECURRENCE-ID")
                        .is_some_and(|p| p.value == value);
                    if !replaced {
                        kept.extend(lines);
                    }
                }
            }
        }
    }
    if let Some(lines) = block {
        kept.extend(lines);
    }

    let mut out = kept.join(newline);
    if raw.ends_with('\n') {
        out.push_str(newline);
    }
    out
}

/// Dates an all-day override on its occurrence, keeping the series' length
/// in days. Without a series `DTEND` the override has none either.
fn all_day_times(block: &str, id: &InstanceId, days: Option<i64>) -> String {
    let Some(date) = parse_ical_date(&id.value) else {
        return block.to_string();
    };
    let mut block = ical::set_property_line(
        block,
        "DTSTART",
        &format!("DTSTART;VALUE=DATE:{}", format_ical_date(date)),
        Component::Event,
    );
    block = ical::remove_property(&block, "DURATION", Component::Event);
    let end = days.and_then(|days| date.checked_add_days(Days::new(days.max(1).unsigned_abs())));
    match end {
        Some(end) => ical::set_property_line(
            &block,
            "DTEND",
            &format!("DTEND;VALUE=DATE:{}", format_ical_date(end)),
            Component::Event,
        ),
        None => ical::remove_property(&block, "DTEND", Component::Event),
    }
}

/// Inserts `block` before the closing `END:VCALENDAR`.
fn append_component(raw: &str, block: &str) -> String {
    let newline = newline_of(raw);
    let block = block.lines().collect::<Vec<_>>().join(newline);
    match raw.rfind("END:VCALENDAR") {
        Some(index) => format!("{}{block}{newline}{}", &raw[..index], &raw[index..]),
        None => format!("{raw}{newline}{block}"),
    }
}

impl EventService {
    pub fn new(store: Arc<CalendarStore>) -> Self {
        Self { store }
    }

    async fn event_objects(
        &self,
        calendar_name: &str,
        action: &str,
    ) -> SecretaryResult<(CalendarInfo, Vec<CalendarObject>)> {
        let calendar = self.store.find(calendar_name, action).await?;
        let objects = self
            .store
            .objects(&calendar, ObjectQuery::events(), action)
            .await?;
        Ok((calendar, objects))
    }

    async fn save(&self, object: &CalendarObject, action: &str) -> SecretaryResult<()> {
        self.store
            .client()
            .save(object)
            .await
            .map_err(|e| SecretaryError::operation(action, e))
    }

    async fn list(&self, query: EventQuery) -> SecretaryResult<Vec<Event>> {
        const ACTION: &str = "get events";
        let (start, mut end) = parse_date_range(&query.start_date, &query.end_date)?;
        if dates::is_date_only(&query.end_date) {
            end = end.checked_add_days(Days::new(1)).unwrap_or(end);
        }
        let window = TimeWindow::new(start, end).ok_or_else(|| {
            SecretaryError::validation("End date cannot be before start date")
        })?;

        let tz = self.store.timezone();
        let calendars = self.store.select(query.calendar_name.as_deref(), ACTION).await?;
        let mut events = Vec::new();
        for calendar in &calendars {
            match self
                .store
                .client()
                .list_objects(calendar, ObjectQuery::events().expanded_over(window))
                .await
            {
                Ok(objects) => events.extend(
                    objects
                        .iter()
                        .map(|o| Event::from_ical(&o.data, &calendar.name, tz)),
                ),
                Err(e) => {
                    warn!(calendar = %calendar.name, error = %e, "failed to get events from calendar, skipping");
                }
            }
        }

        debug!(count = events.len(), start = %window.start, end = %window.end, "listed events");
        Ok(events)
    }

    async fn add(&self, request: EventCreate) -> SecretaryResult<String> {
        const ACTION: &str = "create event";
        let (start, end) = request.validate()?;
        let calendar = self.store.find(&request.calendar_name, ACTION).await?;
        let rrule = request.rrule.filter(|r| !r.trim().is_empty());

        self.store
            .client()
            .save_new(
                &calendar,
                NewObject::Event(NewEvent {
                    summary: request.summary.clone(),
                    description: request.description.filter(|d| !d.trim().is_empty()),
                    location: request.location.clone(),
                    start,
                    end,
                    rrule: rrule.clone(),
                }),
            )
            .await
            .map_err(|e| SecretaryError::operation(ACTION, e))?;
        info!(calendar = %calendar.name, summary = %request.summary, "event created");

        let location = request
            .location
            .filter(|l| !l.is_empty())
            .map(|l| format!(" at {l}"))
            .unwrap_or_default();
        let recurring = rrule.map(|r| format!(" (recurring: {r})")).unwrap_or_default();
        Ok(format!(
            "Event created in '{}': '{}' from {} to {}{location}{recurring}",
            request.calendar_name, request.summary, request.start_datetime, request.end_datetime
        ))
    }

    async fn edit(&self, request: EventUpdate) -> SecretaryResult<String> {
        const ACTION: &str = "update event";
        validate_event_summary(&request.summary)?;
        validate_calendar_name(&request.calendar_name)?;
        let new_start = parse_optional(request.new_start_datetime.as_deref())?;
        let new_end = parse_optional(request.new_end_datetime.as_deref())?;
        if let (Some(start), Some(end)) = (new_start, new_end) {
            ensure_ordered(start, end)?;
        }

        let (calendar, objects) = self.event_objects(&request.calendar_name, ACTION).await?;
        let object = find_event_by_summary(&objects, &calendar.name, &request.summary, self.store.timezone())?;
        let current = ical::parse_component(&object.data, Component::Event);
        if let (Some(start), Some(end)) = (
            new_start.or_else(|| instant(&current, "DTSTART")),
            new_end.or_else(|| instant(&current, "DTEND")),
        ) {
            ensure_ordered(start, end)?;
        }

        let mut data = object.data.clone();
        if let Some(start) = new_start {
            let line = format!("DTSTART:{}", format_ical_datetime(start));
            data = ical::set_property_line(&data, "DTSTART", &line, Component::Event);
        }
        if let Some(end) = new_end {
            let line = format!("DTEND:{}", format_ical_datetime(end));
            data = ical::set_property_line(&data, "DTEND", &line, Component::Event);
        }
        if let Some(description) = request.new_description.as_deref() {
            data = set_text(&data, "DESCRIPTION", description);
        }
        if let Some(location) = request.new_location.as_deref() {
            data = set_text(&data, "LOCATION", location);
        }
        match request.new_rrule.as_deref().map(str::trim) {
            Some("") => data = ical::remove_property(&data, "RRULE", Component::Event),
            Some(rule) => {
                data = ical::set_property_line(&data, "RRULE", &format!("RRULE:{rule}"), Component::Event);
            }
            None => {}
        }
        self.save(&object.with_data(data), ACTION).await?;

        Ok(format!(
            "Event '{}' in '{}' updated ({})",
            request.summary,
            request.calendar_name,
            request.describe_changes()
        ))
    }

    async fn delete(&self, request: EventDelete) -> SecretaryResult<String> {
        const ACTION: &str = "delete event";
        validate_event_summary(&request.summary)?;
        validate_calendar_name(&request.calendar_name)?;

        let (calendar, objects) = self.event_objects(&request.calendar_name, ACTION).await?;
        let object = find_event_by_summary(&objects, &calendar.name, &request.summary, self.store.timezone())?;
        self.store
            .client()
            .delete(object)
            .await
            .map_err(|e| SecretaryError::operation(ACTION, e))?;

        Ok(format!(
            "Event '{}' deleted from '{}'",
            request.summary, request.calendar_name
        ))
    }

    async fn cancel_instance(&self, request: EventInstanceCancel) -> SecretaryResult<String> {
        const ACTION: &str = "cancel event instance";
        validate_event_summary(&request.summary)?;
        validate_calendar_name(&request.calendar_name)?;
        let instance = parse_instance_date(&request.instance_date)?;

        let (calendar, objects) = self.event_objects(&request.calendar_name, ACTION).await?;
        let object = find_recurring_event_by_summary(
            &objects,
            &calendar.name,
            &request.summary,
            self.store.timezone(),
        )?;
        let series = ical::parse_component(&object.data, Component::Event);
        let id = InstanceId::new(
            series.property("DTSTART"),
            &request.instance_date,
            instance,
            self.store.timezone(),
        );

        let data = ical::insert_property(&object.data, &id.line("EXDATE"), Component::Event);
        self.save(&object.with_data(data), ACTION).await?;
        info!(summary = %request.summary, instance = %id.value, "event instance cancelled");

        Ok(format!(
            "Instance of '{}' on {} canceled (EXDATE added)",
            request.summary, request.instance_date
        ))
    }

    async fn modify_instance(&self, request: EventInstanceModify) -> SecretaryResult<String> {
        const ACTION: &str = "modify event instance";
        validate_event_summary(&request.summary)?;
        validate_calendar_name(&request.calendar_name)?;
        let instance = parse_instance_date(&request.instance_date)?;
        let new_start = parse_optional(request.new_start_datetime.as_deref())?;
        let new_end = parse_optional(request.new_end_datetime.as_deref())?;
        if let (Some(start), Some(end)) = (new_start, new_end) {
            ensure_ordered(start, end)?;
        }

        let (calendar, objects) = self.event_objects(&request.calendar_name, ACTION).await?;
        let object = find_recurring_event_by_summary(
            &objects,
            &calendar.name,
            &request.summary,
            self.store.timezone(),
        )?;
        let series = ical::parse_component(&object.data, Component::Event);
        let id = InstanceId::new(
            series.property("DTSTART"),
            &request.instance_date,
            instance,
            self.store.timezone(),
        );
        let length = instant(&series, "DTSTART")
            .zip(instant(&series, "DTEND"))
            .map(|(start, end)| end - start);

        let start = new_start.or_else(|| id.start()).unwrap_or(instance);
        let end = new_end.or_else(|| length.map(|length| start + length));
        if let Some(end) = end {
            ensure_ordered(start, end)?;
        }

        let master = ical::component_block(&object.data, Component::Event).ok_or_else(|| {
            SecretaryError::operation(ACTION, "stored event has no VEVENT component")
        })?;
        let mut block = master;
        for name in ["RRULE", "RDATE", "EXDATE", "RECURRENCE-ID"] {
            block = ical::remove_property(&block, name, Component::Event);
        }
        block = ical::insert_property(&block, &id.line("RECURRENCE-ID"), Component::Event);
        let all_day = id.params == ";VALUE=DATE" && new_start.is_none() && new_end.is_none();
        if all_day {
            block = all_day_times(&block, &id, length.map(|l| l.num_days()));
        } else {
            block = ical::set_property_line(
                &block,
                "DTSTART",
                &format!("DTSTART:{}", format_ical_datetime(start)),
                Component::Event,
            );
        }
        match end {
            _ if all_day => {}
            Some(end) => {
                block = ical::remove_property(&block, "DURATION", Component::Event);
                block = ical::set_property_line(
                    &block,
                    "DTEND",
                    &format!("DTEND:{}", format_ical_datetime(end)),
                    Component::Event,
                );
            }
            None => block = ical::remove_property(&block, "DTEND", Component::Event),
        }
        if let Some(description) = request.new_description.as_deref() {
            block = set_text(&block, "DESCRIPTION", description);
        }
        if let Some(location) = request.new_location.as_deref() {
            block = set_text(&block, "LOCATION", location);
        }

        let data = append_component(&without_override(&object.data, &id.value), &block);
        self.save(&object.with_data(data), ACTION).await?;
        info!(summary = %request.summary, instance = %id.value, "event instance modified");

        Ok(format!(
            "Instance of '{}' on {} modified ({})",
            request.summary,
            request.instance_date,
            request.describe_changes()
        ))
    }
}

impl EventProvider for EventService {
    fn get_events(&self, query: EventQuery) -> BoxFuture<'_, SecretaryResult<Vec<Event>>> {
        Box::pin(self.list(query))
    }

    fn add_event(&self, request: EventCreate) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.add(request))
    }

    fn edit_event(&self, request: EventUpdate) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.edit(request))
    }

    fn delete_event(&self, request: EventDelete) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.delete(request))
    }

    fn cancel_event_instance(
        &self,
        request: EventInstanceCancel,
    ) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.cancel_instance(request))
    }

    fn modify_event_instance(
        &self,
        request: EventInstanceModify,
    ) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.modify_instance(request))
    }
}
