//! CalDAV connection settings.

use std::time::Duration;
use url::Url;

/// Connection settings for a [`CalDavClient`](super::CalDavClient).
#[derive(Clone)]
pub struct CalDavConfig {
    /// Server URL: a principal, a calendar home or the server root.
    pub url: Url,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Timeout applied to every request.
    pub timeout: Duration,

    pub user_agent: String,
}

impl CalDavConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a configuration for `url`, without credentials.
    ///
    /// A missing trailing slash is added so relative hrefs resolve under
    /// the given path rather than next to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        let mut parsed = Url::parse(url.as_ref())?;
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        Ok(Self {
            url: parsed,
            username: None,
            password: None,
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("secretary/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Disables TLS verification (self-signed test servers).
    #[must_use]
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the username and password when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for CalDavConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalDavConfig")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = CalDavConfig::new("https://dav.example.com/calendars/user/").unwrap();
        assert_eq!(config.url.as_str(), "https://dav.example.com/calendars/user/");
        assert!(config.credentials().is_none());
        assert!(config.verify_tls);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("secretary/"));
    }

    #[test]
    fn trailing_slash_is_added() {
        let config = CalDavConfig::new("https://dav.example.com/remote.php/dav").unwrap();
        assert_eq!(config.url.as_str(), "https://dav.example.com/remote.php/dav/");
    }

    #[test]
    fn builder_methods() {
        let config = CalDavConfig::new("https://dav.example.com/")
            .unwrap()
            .with_credentials("alice", "s3cret")
            .with_insecure_tls()
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.credentials(), Some(("alice", "s3cret")));
        assert!(!config.verify_tls);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn debug_hides_password() {
        let config = CalDavConfig::new("https://dav.example.com/")
            .unwrap()
            .with_credentials("alice", "s3cret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn invalid_url_returns_error() {
        assert!(CalDavConfig::new("not a url").is_err());
    }
}
