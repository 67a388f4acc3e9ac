//! Calendar listing and creation.

use std::sync::Arc;

use secretary_core::validation::validate_calendar_name;
use secretary_core::{SecretaryError, SecretaryResult};
use tracing::info;

use crate::client::BoxFuture;
use crate::provider::CalendarProvider;
use crate::store::CalendarStore;

#[derive(Debug, Clone)]
pub struct CalendarService {
    store: Arc<CalendarStore>,
}

impl CalendarService {
    pub fn new(store: Arc<CalendarStore>) -> Self {
        Self { store }
    }

    async fn names(&self) -> SecretaryResult<Vec<String>> {
        let calendars = self.store.calendars("get calendar names").await?;
        Ok(calendars.into_iter().map(|c| c.name).collect())
    }

    async fn create(&self, name: &str) -> SecretaryResult<String> {
        validate_calendar_name(name)?;
        let action = format!("create calendar '{name}'");
        let created = self
            .store
            .client()
            .create_calendar(name)
            .await
            .map_err(|e| SecretaryError::operation(action, e))?;
        self.store.invalidate().await;
        info!(calendar = %created.name, id = %created.id, "calendar created");
        Ok(format!("Calendar '{name}' created successfully"))
    }
}

impl CalendarProvider for CalendarService {
    fn get_all_calendar_names(&self) -> BoxFuture<'_, SecretaryResult<Vec<String>>> {
        Box::pin(self.names())
    }

    fn create_new_calendar<'a>(&'a self, name: &'a str) -> BoxFuture<'a, SecretaryResult<String>> {
        Box::pin(self.create(name))
    }
}
