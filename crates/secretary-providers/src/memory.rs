//! In-memory [`CalendarClient`] used as a test double by this crate and
//! the server's tests. Nothing in the server binary constructs one.
//!
//! Objects are stored as rendered text, so everything the providers do to
//! raw text against a real server works the same way here. Recurrences are
//! not expanded: a recurring event is returned once if its series starts
//! before the end of the requested window.

use std::collections::HashSet;

use chrono::Utc;
use secretary_core::ical::{self, Component};
use secretary_core::time::parse_ical_datetime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::client::{
    BoxFuture, CalendarClient, CalendarInfo, CalendarObject, NewObject, ObjectQuery,
    is_completed_todo,
};
use crate::error::{ProviderError, ProviderResult};
use crate::ics;

const NAME: &str = "memory";

#[derive(Debug, Default)]
struct State {
    calendars: Vec<StoredCalendar>,
    failing_calendars: HashSet<String>,
    failing_writes: bool,
    revision: u64,
}

#[derive(Debug)]
struct StoredCalendar {
    info: CalendarInfo,
    objects: Vec<CalendarObject>,
}

impl State {
    fn next_etag(&mut self) -> String {
        self.revision += 1;
        format!("rev-{}", self.revision)
    }

    fn add_calendar(&mut self, name: &str) -> CalendarInfo {
        let info = CalendarInfo::new(format!("memory://{}/", Uuid::new_v4().simple()), name);
        self.calendars.push(StoredCalendar {
            info: info.clone(),
            objects: Vec::new(),
        });
        info
    }

    fn add_object(&mut self, calendar_id: &str, data: String) -> ProviderResult<CalendarObject> {
        let etag = self.next_etag();
        let calendar = self
            .calendars
            .iter_mut()
            .find(|c| c.info.id == calendar_id)
            .ok_or_else(|| error(ProviderError::not_found(format!("No calendar at {calendar_id}"))))?;
        let object =
            CalendarObject::new(format!("{}{}.ics", calendar.info.id, Uuid::new_v4()), data)
                .with_etag(etag);
        calendar.objects.push(object.clone());
        Ok(object)
    }

    fn find_object(&mut self, href: &str) -> Option<(usize, usize)> {
        self.calendars.iter().enumerate().find_map(|(ci, calendar)| {
            calendar
                .objects
                .iter()
                .position(|o| o.href == href)
                .map(|oi| (ci, oi))
        })
    }

    fn check_writable(&self) -> ProviderResult<()> {
        if self.failing_writes {
            return Err(error(ProviderError::server("write rejected")));
        }
        Ok(())
    }
}

fn error(err: ProviderError) -> ProviderError {
    err.with_provider(NAME)
}

/// A calendar server held entirely in memory. Test double only; use
/// [`crate::caldav::CalDavClient`] against a real server.
#[derive(Debug, Default)]
pub struct MemoryClient {
    state: Mutex<State>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty calendar called `name`.
    #[must_use]
    pub fn with_calendar(mut self, name: &str) -> Self {
        self.state.get_mut().add_calendar(name);
        self
    }

    /// Stores raw text in the calendar called `name`, creating it if needed.
    #[must_use]
    pub fn with_object(mut self, name: &str, data: &str) -> Self {
        let state = self.state.get_mut();
        let id = match state.calendars.iter().find(|c| c.info.name == name) {
            Some(calendar) => calendar.info.id.clone(),
            None => state.add_calendar(name).id,
        };
        // The calendar was found or created just above.
        let _ = state.add_object(&id, data.to_string());
        self
    }

    /// Makes object listings of calendar `name` fail with a network error.
    #[must_use]
    pub fn with_failing_calendar(mut self, name: &str) -> Self {
        self.state.get_mut().failing_calendars.insert(name.to_string());
        self
    }

    /// Makes every save and delete fail with a server error.
    #[must_use]
    pub fn with_failing_writes(mut self) -> Self {
        self.state.get_mut().failing_writes = true;
        self
    }

    /// Returns a snapshot of the objects stored in calendar `name`.
    pub async fn objects(&self, name: &str) -> Vec<CalendarObject> {
        let state = self.state.lock().await;
        state
            .calendars
            .iter()
            .find(|c| c.info.name == name)
            .map(|c| c.objects.clone())
            .unwrap_or_default()
    }
}

fn matches(object: &CalendarObject, query: &ObjectQuery) -> bool {
    if !object.data.contains(&format!("BEGIN:{}", query.component)) {
        return false;
    }
    if query.component == Component::Todo && !query.include_completed && is_completed_todo(&object.data) {
        return false;
    }
    let Some(window) = query.window else {
        return true;
    };

    let props = ical::parse_component(&object.data, query.component);
    let instant = |name: &str| {
        props
            .property(name)
            .and_then(|p| parse_ical_datetime(&p.value, p.param("TZID")))
    };
    match instant("DTSTART") {
        Some(start) if props.get("RRULE").is_some() => start < window.end,
        Some(start) => window.overlaps(start, instant("DTEND")),
        None => false,
    }
}

impl CalendarClient for MemoryClient {
    fn name(&self) -> &str {
        NAME
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.calendars.iter().map(|c| c.info.clone()).collect())
        })
    }

    fn create_calendar<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.check_writable()?;
            Ok(state.add_calendar(name))
        })
    }

    fn list_objects<'a>(
        &'a self,
        calendar: &'a CalendarInfo,
        query: ObjectQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarObject>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            if state.failing_calendars.contains(&calendar.name) {
                return Err(error(ProviderError::network(format!(
                    "calendar '{}' is unreachable",
                    calendar.name
                ))));
            }
            let stored = state
                .calendars
                .iter()
                .find(|c| c.info.id == calendar.id)
                .ok_or_else(|| error(ProviderError::not_found(format!("No calendar at {}", calendar.id))))?;
            Ok(stored
                .objects
                .iter()
                .filter(|o| matches(o, &query))
                .cloned()
                .collect())
        })
    }

    fn save_new<'a>(
        &'a self,
        calendar: &'a CalendarInfo,
        object: NewObject,
    ) -> BoxFuture<'a, ProviderResult<CalendarObject>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.check_writable()?;
            let data = ics::render(&object, &Uuid::new_v4().to_string(), Utc::now());
            state.add_object(&calendar.id, data)
        })
    }

    fn save<'a>(&'a self, object: &'a CalendarObject) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.check_writable()?;
            let (ci, oi) = state
                .find_object(&object.href)
                .ok_or_else(|| error(ProviderError::not_found(format!("No object at {}", object.href))))?;
            let etag = state.next_etag();
            let stored = &mut state.calendars[ci].objects[oi];
            if object.etag.is_some() && stored.etag != object.etag {
                return Err(error(ProviderError::conflict(format!(
                    "{} changed since it was read",
                    object.href
                ))));
            }
            stored.data = object.data.clone();
            stored.etag = Some(etag);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, object: &'a CalendarObject) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.check_writable()?;
            let (ci, oi) = state
                .find_object(&object.href)
                .ok_or_else(|| error(ProviderError::not_found(format!("No object at {}", object.href))))?;
            state.calendars[ci].objects.remove(oi);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NewTodo;
    use crate::error::ProviderErrorCode;
    use chrono::TimeZone;
    use secretary_core::TimeWindow;

    #[tokio::test]
    async fn lists_seeded_calendars_and_objects() {
        let client = MemoryClient::new()
            .with_calendar("Work")
            .with_object("Personal", "BEGIN:VTODO\nSUMMARY:Buy milk\nEND:VTODO");

        let calendars = client.list_calendars().await.unwrap();
        let names: Vec<_> = calendars.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Work", "Personal"]);

        let todos = client
            .list_objects(&calendars[1], ObjectQuery::todos(false))
            .await
            .unwrap();
        assert_eq!(todos.len(), 1);
        assert!(todos[0].href.starts_with(&calendars[1].id));
    }

    #[tokio::test]
    async fn filters_by_component_and_completion() {
        let client = MemoryClient::new()
            .with_object("Work", "BEGIN:VTODO\nSUMMARY:open\nEND:VTODO")
            .with_object("Work", "BEGIN:VTODO\nSUMMARY:done\nSTATUS:COMPLETED\nEND:VTODO")
            .with_object("Work", "BEGIN:VEVENT\nSUMMARY:meeting\nEND:VEVENT");
        let work = client.list_calendars().await.unwrap().remove(0);

        let open = client.list_objects(&work, ObjectQuery::todos(false)).await.unwrap();
        assert_eq!(open.len(), 1);
        let all = client.list_objects(&work, ObjectQuery::todos(true)).await.unwrap();
        assert_eq!(all.len(), 2);
        let events = client.list_objects(&work, ObjectQuery::events()).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn window_filters_events() {
        let client = MemoryClient::new()
            .with_object(
                "Work",
                "BEGIN:VEVENT\nSUMMARY:in\nDTSTART:20250712T100000Z\nDTEND:20250712T110000Z\nEND:VEVENT",
            )
            .with_object(
                "Work",
                "BEGIN:VEVENT\nSUMMARY:out\nDTSTART:20250720T100000Z\nEND:VEVENT",
            )
            .with_object(
                "Work",
                "BEGIN:VEVENT\nSUMMARY:series\nDTSTART:20250101T100000Z\nRRULE:FREQ=WEEKLY\nEND:VEVENT",
            );
        let work = client.list_calendars().await.unwrap().remove(0);
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 7, 12, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 7, 13, 0, 0, 0).unwrap(),
        )
        .unwrap();

        let events = client
            .list_objects(&work, ObjectQuery::events().expanded_over(window))
            .await
            .unwrap();
        let summaries: Vec<_> = events
            .iter()
            .filter_map(|o| ical::get_property(&o.data, "SUMMARY"))
            .collect();
        assert_eq!(summaries, ["in", "series"]);
    }

    #[tokio::test]
    async fn save_new_save_and_delete() {
        let client = MemoryClient::new().with_calendar("Work");
        let work = client.list_calendars().await.unwrap().remove(0);

        let created = client
            .save_new(
                &work,
                NewObject::Todo(NewTodo {
                    summary: "Write report".into(),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        assert!(created.data.contains("SUMMARY:Write report"));

        let edited = created.with_data(created.data.replace("Write report", "Send report"));
        client.save(&edited).await.unwrap();
        let stored = client.objects("Work").await;
        assert!(stored[0].data.contains("Send report"));
        assert_ne!(stored[0].etag, created.etag);

        let err = client.save(&edited).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Conflict);

        client.delete(&stored[0]).await.unwrap();
        assert!(client.objects("Work").await.is_empty());
        let err = client.delete(&stored[0]).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotFound);
    }

    #[tokio::test]
    async fn injected_failures() {
        let client = MemoryClient::new()
            .with_calendar("Broken")
            .with_failing_calendar("Broken")
            .with_failing_writes();
        let broken = client.list_calendars().await.unwrap().remove(0);

        let err = client.list_objects(&broken, ObjectQuery::events()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NetworkError);
        assert_eq!(err.provider(), Some("memory"));

        let err = client.create_calendar("New").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
    }
}
