//! Server configuration.
//!
//! Settings are layered, later sources winning:
//!
//! 1. `settings.toml`
//! 2. `.secrets.toml` (same directory)
//! 3. environment: `CALENDAR_URL`, `CALENDAR_USERNAME`, `CALENDAR_PASSWORD`,
//!    `SECRETARY_DISPLAY_NAME`
//!
//! Without an explicit path the files are looked up in the current
//! directory, then in `<config dir>/secretary/`. The first directory holding
//! either file is used.
//!
//! ```toml
//! calendar_url = "https://dav.example.com/calendars/alice/"
//! calendar_username = "alice"
//! display_name = "Alice's secretary"
//! timezone = "Europe/Paris"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use secretary_core::{Tz, time::parse_timezone, user_timezone};
use secretary_providers::caldav::CalDavConfig;

use crate::error::{ServerError, ServerResult};

pub const SETTINGS_FILE: &str = "settings.toml";
pub const SECRETS_FILE: &str = ".secrets.toml";

/// Name reported to clients when `display_name` is unset.
pub const DEFAULT_DISPLAY_NAME: &str = "secretary";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One layer of settings, as read from a file or the environment.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub calendar_url: Option<String>,
    pub calendar_username: Option<String>,
    pub calendar_password: Option<String>,
    pub display_name: Option<String>,
    /// IANA zone name; the system zone is used when unset.
    pub timezone: Option<String>,
    pub verify_tls: Option<bool>,
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("calendar_url", &self.calendar_url)
            .field("calendar_username", &self.calendar_username)
            .field("calendar_password", &self.calendar_password.as_ref().map(|_| "***"))
            .field("display_name", &self.display_name)
            .field("timezone", &self.timezone)
            .field("verify_tls", &self.verify_tls)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Settings {
    /// Parses one TOML layer.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Reads one TOML layer from `path`.
    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ServerError::config_file(path, e))?;
        Self::from_toml(&content).map_err(|e| ServerError::config_file(path, e.message()))
    }

    /// Settings found in the environment. Empty variables are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            calendar_url: var("CALENDAR_URL"),
            calendar_username: var("CALENDAR_USERNAME"),
            calendar_password: var("CALENDAR_PASSWORD"),
            display_name: var("SECRETARY_DISPLAY_NAME"),
            ..Self::default()
        }
    }

    /// Overlays `other` on `self`: every key set in `other` wins.
    #[must_use]
    pub fn merge(self, other: Settings) -> Self {
        Self {
            calendar_url: other.calendar_url.or(self.calendar_url),
            calendar_username: other.calendar_username.or(self.calendar_username),
            calendar_password: other.calendar_password.or(self.calendar_password),
            display_name: other.display_name.or(self.display_name),
            timezone: other.timezone.or(self.timezone),
            verify_tls: other.verify_tls.or(self.verify_tls),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
        }
    }

    /// Reads `settings.toml` then `.secrets.toml` from `dir`. Missing files
    /// are skipped.
    pub fn from_dir(dir: &Path) -> ServerResult<Self> {
        let mut settings = Self::default();
        for name in [SETTINGS_FILE, SECRETS_FILE] {
            let path = dir.join(name);
            if path.is_file() {
                debug!(path = %path.display(), "Loading settings");
                settings = settings.merge(Self::from_file(&path)?);
            }
        }
        Ok(settings)
    }

    /// Checks the connection fields and resolves defaults.
    pub fn resolve(self) -> ServerResult<ServerConfig> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (Some(url), Some(username), Some(password)) = (
            non_empty(self.calendar_url),
            non_empty(self.calendar_username),
            non_empty(self.calendar_password),
        ) else {
            return Err(ServerError::config(
                "config missing calendar_url, calendar_username or calendar_password",
            ));
        };

        let timezone = match self.timezone.as_deref() {
            Some(name) => parse_timezone(name)
                .ok_or_else(|| ServerError::config(format!("unknown timezone '{name}'")))?,
            None => user_timezone(),
        };

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ServerError::config("timeout_secs must be at least 1"));
        }

        Ok(ServerConfig {
            calendar_url: url,
            calendar_username: username,
            calendar_password: password,
            display_name: non_empty(self.display_name)
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            timezone,
            verify_tls: self.verify_tls.unwrap_or(true),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Directories searched for settings files, in order.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(config) = dirs::config_dir() {
        dirs.push(config.join("secretary"));
    }
    dirs
}

/// Loads the file layers.
///
/// With `explicit`, that file is the settings layer and a `.secrets.toml`
/// next to it is the secrets layer. Otherwise the first of `dirs` holding
/// either file is used; finding none is not an error, since the
/// environment may carry everything.
pub fn load_files(explicit: Option<&Path>, dirs: &[PathBuf]) -> ServerResult<Settings> {
    if let Some(path) = explicit {
        let mut settings = Settings::from_file(path)?;
        if let Some(secrets) = path.parent().map(|dir| dir.join(SECRETS_FILE))
            && secrets.is_file()
        {
            settings = settings.merge(Settings::from_file(&secrets)?);
        }
        return Ok(settings);
    }

    for dir in dirs {
        if dir.join(SETTINGS_FILE).is_file() || dir.join(SECRETS_FILE).is_file() {
            return Settings::from_dir(dir);
        }
    }
    debug!("No settings files found");
    Ok(Settings::default())
}

/// Validated configuration.
#[derive(Clone)]
pub struct ServerConfig {
    pub calendar_url: String,
    pub calendar_username: String,
    pub calendar_password: String,
    /// Reported as the server name on `initialize`.
    pub display_name: String,
    pub timezone: Tz,
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("calendar_url", &self.calendar_url)
            .field("calendar_username", &self.calendar_username)
            .field("calendar_password", &"***")
            .field("display_name", &self.display_name)
            .field("timezone", &self.timezone)
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ServerConfig {
    /// Loads files, overlays the environment and validates.
    pub fn load(explicit: Option<&Path>) -> ServerResult<Self> {
        load_files(explicit, &search_dirs())?
            .merge(Settings::from_env())
            .resolve()
    }

    /// Connection settings for the CalDAV client.
    pub fn caldav(&self) -> ServerResult<CalDavConfig> {
        let config = CalDavConfig::new(&self.calendar_url).map_err(|e| {
            ServerError::config(format!("invalid calendar_url '{}': {e}", self.calendar_url))
        })?;
        let config = config
            .with_credentials(&self.calendar_username, &self.calendar_password)
            .with_timeout(self.timeout);
        Ok(if self.verify_tls {
            config
        } else {
            config.with_insecure_tls()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn complete() -> Settings {
        Settings {
            calendar_url: Some("https://dav.example.com/".into()),
            calendar_username: Some("alice".into()),
            calendar_password: Some("pw".into()),
            timezone: Some("Europe/Paris".into()),
            ..Settings::default()
        }
    }

    mod layering {
        use super::*;

        #[test]
        fn secrets_overlay_settings() {
            let dir = tempfile::tempdir().unwrap();
            fs::write(
                dir.path().join(SETTINGS_FILE),
                "calendar_url = \"https://dav.example.com/\"\ncalendar_password = \"placeholder\"\n",
            )
            .unwrap();
            fs::write(
                dir.path().join(SECRETS_FILE),
                "calendar_username = \"alice\"\ncalendar_password = \"s3cret\"\n",
            )
            .unwrap();

            let settings = load_files(None, &[dir.path().to_path_buf()]).unwrap();
            assert_eq!(settings.calendar_url.as_deref(), Some("https://dav.example.com/"));
            assert_eq!(settings.calendar_username.as_deref(), Some("alice"));
            assert_eq!(settings.calendar_password.as_deref(), Some("s3cret"));
        }

        #[test]
        fn first_directory_with_files_wins() {
            let empty = tempfile::tempdir().unwrap();
            let first = tempfile::tempdir().unwrap();
            let second = tempfile::tempdir().unwrap();
            fs::write(first.path().join(SECRETS_FILE), "display_name = \"first\"\n").unwrap();
            fs::write(second.path().join(SETTINGS_FILE), "display_name = \"second\"\n").unwrap();

            let dirs = [
                empty.path().to_path_buf(),
                first.path().to_path_buf(),
                second.path().to_path_buf(),
            ];
            let settings = load_files(None, &dirs).unwrap();
            assert_eq!(settings.display_name.as_deref(), Some("first"));
        }

        #[test]
        fn explicit_path_picks_up_sibling_secrets() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("custom.toml");
            fs::write(&path, "calendar_username = \"bob\"\ntimeout_secs = 5\n").unwrap();
            fs::write(dir.path().join(SECRETS_FILE), "calendar_password = \"pw\"\n").unwrap();

            let settings = load_files(Some(&path), &[]).unwrap();
            assert_eq!(settings.calendar_username.as_deref(), Some("bob"));
            assert_eq!(settings.calendar_password.as_deref(), Some("pw"));
            assert_eq!(settings.timeout_secs, Some(5));
        }

        #[test]
        fn explicit_path_must_exist() {
            let dir = tempfile::tempdir().unwrap();
            let err = load_files(Some(&dir.path().join("nope.toml")), &[]).unwrap_err();
            assert!(matches!(err, ServerError::ConfigFile { .. }));
        }

        #[test]
        fn no_files_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            let settings = load_files(None, &[dir.path().to_path_buf()]).unwrap();
            assert_eq!(settings, Settings::default());
        }

        #[test]
        fn malformed_file_names_path() {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join(SETTINGS_FILE), "calendar_url = ").unwrap();
            let err = load_files(None, &[dir.path().to_path_buf()]).unwrap_err();
            assert!(err.to_string().contains(SETTINGS_FILE));
        }

        #[test]
        fn environment_wins_over_files() {
            let vars: HashMap<&str, &str> = [
                ("CALENDAR_URL", "https://env.example.com/"),
                ("CALENDAR_USERNAME", ""),
                ("SECRETARY_DISPLAY_NAME", "Env Secretary"),
            ]
            .into_iter()
            .collect();
            let env = Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

            let settings = complete().merge(env);
            assert_eq!(settings.calendar_url.as_deref(), Some("https://env.example.com/"));
            // empty variables do not clear file values
            assert_eq!(settings.calendar_username.as_deref(), Some("alice"));
            assert_eq!(settings.display_name.as_deref(), Some("Env Secretary"));
        }
    }

    mod resolve {
        use super::*;

        #[test]
        fn defaults() {
            let config = complete().resolve().unwrap();
            assert_eq!(config.display_name, DEFAULT_DISPLAY_NAME);
            assert_eq!(config.timezone, Tz::Europe__Paris);
            assert!(config.verify_tls);
            assert_eq!(config.timeout, Duration::from_secs(30));
        }

        #[test]
        fn missing_connection_field() {
            for settings in [
                Settings {
                    calendar_url: None,
                    ..complete()
                },
                Settings {
                    calendar_password: Some("  ".into()),
                    ..complete()
                },
            ] {
                let err = settings.resolve().unwrap_err();
                assert_eq!(
                    err.to_string(),
                    "Configuration error: config missing calendar_url, calendar_username or calendar_password"
                );
            }
        }

        #[test]
        fn unknown_timezone() {
            let err = Settings {
                timezone: Some("Mars/Olympus".into()),
                ..complete()
            }
            .resolve()
            .unwrap_err();
            assert!(err.to_string().contains("unknown timezone 'Mars/Olympus'"));
        }

        #[test]
        fn caldav_settings() {
            let config = Settings {
                verify_tls: Some(false),
                timeout_secs: Some(10),
                ..complete()
            }
            .resolve()
            .unwrap();
            let caldav = config.caldav().unwrap();
            assert_eq!(caldav.credentials(), Some(("alice", "pw")));
            assert!(!caldav.verify_tls);
            assert_eq!(caldav.timeout, Duration::from_secs(10));
        }

        #[test]
        fn invalid_url() {
            let config = Settings {
                calendar_url: Some("not a url".into()),
                ..complete()
            }
            .resolve()
            .unwrap();
            assert!(config.caldav().unwrap_err().to_string().contains("invalid calendar_url"));
        }

        #[test]
        fn debug_masks_password() {
            let config = complete().resolve().unwrap();
            let debug = format!("{config:?}");
            assert!(!debug.contains("\"pw\""));
            assert!(debug.contains("***"));
            assert!(!format!("{:?}", complete()).contains("\"pw\""));
        }
    }
}
