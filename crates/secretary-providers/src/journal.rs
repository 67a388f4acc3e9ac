//! Journal (VJOURNAL) operations.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use secretary_core::ical::{self, Component};
use secretary_core::time::local_to_utc;
use secretary_core::validation::{validate_calendar_name, validate_journal_summary};
use secretary_core::{
    DateRange, Journal, JournalCreate, JournalDelete, JournalEdit, JournalQuery, SecretaryError,
    SecretaryResult, build_updated_description, dates, parse_datetime_to_utc, parse_instance_date,
};
use tracing::{debug, info, warn};

use crate::client::{BoxFuture, CalendarInfo, CalendarObject, NewJournal, NewObject, ObjectQuery};
use crate::finder::find_journal;
use crate::provider::JournalProvider;
use crate::store::CalendarStore;

/// Longest excerpt of new text echoed back by an edit.
const EXCERPT_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct JournalService {
    store: Arc<CalendarStore>,
}

impl JournalService {
    pub fn new(store: Arc<CalendarStore>) -> Self {
        Self { store }
    }

    /// Start of a new entry: local midnight of a bare date, an explicit
    /// datetime as given, or today.
    fn entry_start(&self, date: Option<&str>) -> SecretaryResult<DateTime<Utc>> {
        let tz = self.store.timezone();
        let midnight = |day: NaiveDate| local_to_utc(day.and_time(NaiveTime::MIN), tz);
        let Some(date) = date.map(str::trim).filter(|d| !d.is_empty()) else {
            return Ok(midnight(self.store.today()));
        };

        if dates::is_date_only(date) {
            return NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(midnight)
                .map_err(|_| invalid_date(date));
        }
        parse_datetime_to_utc(date).map_err(|_| invalid_date(date))
    }

    async fn journal_objects(
        &self,
        calendar_name: &str,
        action: &str,
    ) -> SecretaryResult<(CalendarInfo, Vec<CalendarObject>)> {
        let calendar = self.store.find(calendar_name, action).await?;
        let objects = self
            .store
            .objects(&calendar, ObjectQuery::journals(), action)
            .await?;
        Ok((calendar, objects))
    }

    async fn create(&self, request: JournalCreate) -> SecretaryResult<String> {
        const ACTION: &str = "create journal";
        request.validate()?;
        let start = self.entry_start(request.date.as_deref())?;
        let calendar = self.store.find(&request.calendar_name, ACTION).await?;

        self.store
            .client()
            .save_new(
                &calendar,
                NewObject::Journal(NewJournal {
                    summary: request.summary.clone(),
                    description: request.description.clone(),
                    start,
                }),
            )
            .await
            .map_err(|e| SecretaryError::operation(ACTION, e))?;
        info!(calendar = %calendar.name, summary = %request.summary, "journal created");

        let on = match request.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(date) => format!(" on {date}"),
            None => " (today)".to_string(),
        };
        Ok(format!(
            "Journal entry created in '{}': '{}'{on} - {}",
            request.calendar_name, request.summary, request.description
        ))
    }

    async fn list(&self, query: JournalQuery) -> SecretaryResult<Vec<Journal>> {
        const ACTION: &str = "get journals";
        query.validate()?;
        let on = query
            .date
            .as_deref()
            .map(|d| parse_instance_date(d).map(|dt| dt.date_naive()))
            .transpose()?;
        let range = query
            .past_days
            .map(|days| DateRange::past_days(self.store.today(), days))
            .transpose()?;

        let tz = self.store.timezone();
        let calendars = self.store.select(query.calendar_name.as_deref(), ACTION).await?;
        let mut journals = Vec::new();
        for calendar in &calendars {
            let objects = match self
                .store
                .client()
                .list_objects(calendar, ObjectQuery::journals())
                .await
            {
                Ok(objects) => objects,
                Err(e) => {
                    warn!(calendar = %calendar.name, error = %e, "failed to get journals from calendar, skipping");
                    continue;
                }
            };
            journals.extend(
                objects
                    .iter()
                    .map(|o| Journal::from_ical(&o.data, &calendar.name, tz))
                    .filter(|j| match j.local_date() {
                        Some(day) => {
                            on.is_none_or(|on| on == day) && range.is_none_or(|r| r.contains(day))
                        }
                        None => true,
                    }),
            );
        }

        debug!(count = journals.len(), "listed journals");
        Ok(journals)
    }

    async fn edit(&self, request: JournalEdit) -> SecretaryResult<String> {
        const ACTION: &str = "edit journal";
        request.validate()?;

        let (calendar, objects) = self.journal_objects(&request.calendar_name, ACTION).await?;
        let object = find_journal(
            &objects,
            &calendar.name,
            &request.summary,
            request.date.as_deref(),
            self.store.timezone(),
        )?;

        let current = ical::parse_component(&object.data, Component::Journal)
            .get("DESCRIPTION")
            .map(ical::unescape_text)
            .unwrap_or_default();
        let now = self.store.now().with_timezone(self.store.timezone());
        let updated = build_updated_description(&current, &request.new_description, request.append, now);
        let data = ical::update_property(&object.data, "DESCRIPTION", &updated, Component::Journal);
        self.store
            .client()
            .save(&object.with_data(data))
            .await
            .map_err(|e| SecretaryError::operation(ACTION, e))?;

        let mode = if request.append && !current.trim().is_empty() {
            "appended to"
        } else {
            "updated in"
        };
        Ok(format!(
            "Journal '{}' in '{}' {mode}: {}",
            request.summary,
            request.calendar_name,
            excerpt(&request.new_description)
        ))
    }

    async fn delete(&self, request: JournalDelete) -> SecretaryResult<String> {
        const ACTION: &str = "delete journal";
        validate_journal_summary(&request.summary)?;
        validate_calendar_name(&request.calendar_name)?;

        let (calendar, objects) = self.journal_objects(&request.calendar_name, ACTION).await?;
        let object = find_journal(
            &objects,
            &calendar.name,
            &request.summary,
            request.date.as_deref(),
            self.store.timezone(),
        )?;
        self.store
            .client()
            .delete(object)
            .await
            .map_err(|e| SecretaryError::operation(ACTION, e))?;

        let from = request
            .date
            .as_deref()
            .map(|d| format!(" from {d}"))
            .unwrap_or_default();
        Ok(format!(
            "Journal '{}'{from} deleted from '{}'",
            request.summary, request.calendar_name
        ))
    }
}

fn invalid_date(date: &str) -> SecretaryError {
    SecretaryError::validation(format!("Invalid date format: {date}. Expected YYYY-MM-DD"))
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl JournalProvider for JournalService {
    fn create_journal(&self, request: JournalCreate) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.create(request))
    }

    fn get_journals(&self, query: JournalQuery) -> BoxFuture<'_, SecretaryResult<Vec<Journal>>> {
        Box::pin(self.list(query))
    }

    fn edit_journal(&self, request: JournalEdit) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.edit(request))
    }

    fn delete_journal(&self, request: JournalDelete) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.delete(request))
    }
}
