//! Session configuration and credentials.

use std::fmt;
use std::time::Duration;

use icloud_calendar_core::ParseMode;
use url::Url;

/// Configuration for a [`CalDavSession`](crate::CalDavSession).
#[derive(Debug, Clone)]
pub struct ICloudConfig {
    /// CalDAV service root; relative hrefs are resolved against it.
    pub url: Url,

    /// Domain appended to generated UIDs (`<id>@<uid_domain>`).
    pub uid_domain: String,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Per-request timeout.
    pub timeout: Duration,

    pub user_agent: String,

    /// How calendar data returned by REPORT is parsed.
    pub parse_mode: ParseMode,
}

impl ICloudConfig {
    /// The iCloud CalDAV endpoint.
    pub const DEFAULT_URL: &'static str = "https://caldav.icloud.com/";

    pub const DEFAULT_UID_DOMAIN: &'static str = "zaptime.app";

    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a configuration for a non-default endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url.as_ref())?;
        Ok(Self {
            url: parsed,
            uid_domain: Self::DEFAULT_UID_DOMAIN.to_string(),
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("icloud-calendar/{}", env!("CARGO_PKG_VERSION")),
            parse_mode: ParseMode::default(),
        })
    }

    /// Sets the UID domain.
    pub fn with_uid_domain(mut self, domain: impl Into<String>) -> Self {
        self.uid_domain = domain.into();
        self
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    /// Returns the base URL as a string.
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// Resolves a server-relative href against the base URL.
    ///
    /// Absolute URLs are returned unchanged, as is the input when it cannot
    /// be joined.
    pub fn resolve(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            self.url
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string())
        }
    }
}

impl Default for ICloudConfig {
    fn default() -> Self {
        // The constant is a valid URL.
        Self::new(Self::DEFAULT_URL).expect("default CalDAV URL should parse")
    }
}

/// Apple ID and app-specific password.
///
/// The password is never printed; `Debug` shows a placeholder.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    app_password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            app_password: app_password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn app_password(&self) -> &str {
        &self.app_password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .finish()
    }
}
