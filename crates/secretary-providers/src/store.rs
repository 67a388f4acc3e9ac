//! Shared state of the providers: the client, the user timezone, a clock
//! and the memoized calendar list.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use secretary_core::{SecretaryError, SecretaryResult, Tz};
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::{CalendarClient, CalendarInfo, CalendarObject, ObjectQuery};
use crate::finder::find_calendar_by_name;

/// Source of the current instant.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Client access shared by every provider.
pub struct CalendarStore {
    client: Arc<dyn CalendarClient>,
    timezone: Tz,
    clock: Clock,
    calendars: Mutex<Option<Vec<CalendarInfo>>>,
}

impl fmt::Debug for CalendarStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarStore")
            .field("client", &self.client.name())
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

impl CalendarStore {
    pub fn new(client: Arc<dyn CalendarClient>, timezone: Tz) -> Self {
        Self {
            client,
            timezone,
            clock: Arc::new(Utc::now),
            calendars: Mutex::new(None),
        }
    }

    /// Replaces the wall clock, mostly for tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn client(&self) -> &dyn CalendarClient {
        self.client.as_ref()
    }

    pub fn timezone(&self) -> &Tz {
        &self.timezone
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Today's date in the user timezone.
    pub fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.timezone).date_naive()
    }

    /// Returns the calendar list, fetching it on first use.
    pub async fn calendars(&self, action: &str) -> SecretaryResult<Vec<CalendarInfo>> {
        let mut cached = self.calendars.lock().await;
        if let Some(calendars) = cached.as_ref() {
            return Ok(calendars.clone());
        }
        let calendars = self
            .client
            .list_calendars()
            .await
            .map_err(|e| SecretaryError::operation(action, e))?;
        debug!(count = calendars.len(), "fetched calendar list");
        *cached = Some(calendars.clone());
        Ok(calendars)
    }

    /// Forgets the memoized calendar list.
    pub async fn invalidate(&self) {
        *self.calendars.lock().await = None;
    }

    /// Looks up one calendar by name.
    pub async fn find(&self, name: &str, action: &str) -> SecretaryResult<CalendarInfo> {
        let calendars = self.calendars(action).await?;
        find_calendar_by_name(&calendars, name).cloned()
    }

    /// The named calendar, or every calendar when `name` is `None`.
    pub async fn select(&self, name: Option<&str>, action: &str) -> SecretaryResult<Vec<CalendarInfo>> {
        match name {
            Some(name) => Ok(vec![self.find(name, action).await?]),
            None => self.calendars(action).await,
        }
    }

    /// Lists objects of `calendar`, wrapping failures as `action`.
    pub async fn objects(
        &self,
        calendar: &CalendarInfo,
        query: ObjectQuery,
        action: &str,
    ) -> SecretaryResult<Vec<CalendarObject>> {
        self.client
            .list_objects(calendar, query)
            .await
            .map_err(|e| SecretaryError::operation(action, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;
    use chrono::TimeZone;

    fn store(client: MemoryClient) -> CalendarStore {
        CalendarStore::new(Arc::new(client), Tz::UTC)
    }

    #[tokio::test]
    async fn memoizes_until_invalidated() {
        let client = Arc::new(MemoryClient::new().with_calendar("Work"));
        let store = CalendarStore::new(client.clone(), Tz::UTC);
        assert_eq!(store.calendars("list calendars").await.unwrap().len(), 1);

        client.create_calendar("Home").await.unwrap();
        assert_eq!(store.calendars("list calendars").await.unwrap().len(), 1);

        store.invalidate().await;
        assert_eq!(store.calendars("list calendars").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn select_by_name_or_all() {
        let store = store(MemoryClient::new().with_calendar("Work").with_calendar("Home"));
        let all = store.select(None, "get tasks").await.unwrap();
        assert_eq!(all.len(), 2);
        let one = store.select(Some("Home"), "get tasks").await.unwrap();
        assert_eq!(one[0].name, "Home");

        let err = store.select(Some("Gym"), "get tasks").await.unwrap_err();
        assert!(err.to_string().contains("Available calendars: ['Work', 'Home']"));
    }

    #[test]
    fn today_follows_timezone() {
        let instant = Utc.with_ymd_and_hms(2025, 7, 11, 23, 30, 0).unwrap();
        let paris: Tz = "Europe/Paris".parse().unwrap();
        let store = CalendarStore::new(Arc::new(MemoryClient::new()), paris)
            .with_clock(Arc::new(move || instant));
        assert_eq!(store.today(), NaiveDate::from_ymd_opt(2025, 7, 12).unwrap());
    }
}
