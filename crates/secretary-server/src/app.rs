//! Wiring: configuration to providers to request handler.

use std::sync::Arc;

use tracing::info;

use secretary_protocol::ToolDescriptor;
use secretary_providers::caldav::CalDavClient;
use secretary_providers::{CalendarClient, ProviderSet};

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{RequestHandler, Toolbox};
use crate::tools::{Tool, ToolGroup, tools_for};

/// Builds the CalDAV client described by `config`.
pub fn caldav_client(config: &ServerConfig) -> ServerResult<CalDavClient> {
    Ok(CalDavClient::new(config.caldav()?)?)
}

/// Every provider, backed by the configured CalDAV server.
pub fn providers(config: &ServerConfig) -> ServerResult<ProviderSet> {
    let client = caldav_client(config)?;
    info!(
        url = %client.base_url(),
        timezone = %config.timezone,
        "Using CalDAV server"
    );
    Ok(ProviderSet::from_client(Arc::new(client), config.timezone))
}

/// A handler serving `groups` (all when empty) from `providers`.
pub fn handler(
    config: &ServerConfig,
    providers: ProviderSet,
    groups: &[ToolGroup],
) -> ServerResult<RequestHandler> {
    let toolbox = Toolbox::new(providers, config.timezone).with_groups(groups)?;
    info!(groups = ?toolbox.groups(), "Tool groups enabled");
    Ok(RequestHandler::new(toolbox, config.display_name.clone()))
}

/// The tool catalogue for `groups` (all when empty), without a server.
pub fn catalogue(groups: &[ToolGroup]) -> Vec<ToolDescriptor> {
    let groups = if groups.is_empty() {
        ToolGroup::ALL.as_slice()
    } else {
        groups
    };
    tools_for(groups).iter().map(Tool::descriptor).collect()
}

/// Lists the calendar names on the configured server.
pub async fn check_connection(config: &ServerConfig) -> ServerResult<Vec<String>> {
    let client = caldav_client(config)?;
    let calendars = client.list_calendars().await?;
    Ok(calendars.into_iter().map(|c| c.name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use secretary_providers::MemoryClient;

    fn config() -> ServerConfig {
        Settings {
            calendar_url: Some("https://dav.example.com/alice/".into()),
            calendar_username: Some("alice".into()),
            calendar_password: Some("pw".into()),
            display_name: Some("Alice".into()),
            timezone: Some("UTC".into()),
            ..Settings::default()
        }
        .resolve()
        .unwrap()
    }

    #[test]
    fn catalogue_defaults_to_everything() {
        assert_eq!(catalogue(&[]).len(), Tool::ALL.len());
        let names: Vec<_> = catalogue(&[ToolGroup::Events])
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names.len(), 7);
        assert!(names.contains(&"cancel_event_instance".to_string()));
    }

    #[test]
    fn caldav_providers_fill_every_group() {
        let providers = providers(&config()).unwrap();
        let toolbox = Toolbox::new(providers, config().timezone);
        assert_eq!(toolbox.groups(), &ToolGroup::ALL);
    }

    #[test]
    fn handler_rejects_groups_without_provider() {
        let err = handler(&config(), ProviderSet::new(), &[ToolGroup::Tasks]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tool group 'tasks' requested but no tasks provider is configured"
        );
    }

    #[test]
    fn handler_with_memory_providers() {
        let providers =
            ProviderSet::from_client(Arc::new(MemoryClient::new()), config().timezone);
        let handler = handler(&config(), providers, &[ToolGroup::Journals]).unwrap();
        assert_eq!(handler.toolbox().groups(), &[ToolGroup::Journals]);
    }
}
