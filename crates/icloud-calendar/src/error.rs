//! Error types for CalDAV session operations.

use std::fmt;

use icloud_calendar_core::ParseError;
use thiserror::Error;

/// The category of a [`CalendarError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The server did not accept the PUT of a new event.
    EventCreationFailed,
    /// The server answered a DELETE with anything but `204 No Content`.
    EventDeletionFailed,
    /// The calendar-query REPORT was not successful.
    EventFetchFailed,
    /// Principal, calendar home or calendar list could not be resolved.
    CalendarDiscoveryFailed,
    /// Connection, TLS or timeout failure below HTTP.
    Network,
    /// The server answered with a body we could not interpret.
    InvalidResponse,
    /// The caller passed arguments that cannot form a valid request.
    InvalidRequest,
    /// Invalid configuration, e.g. an unparseable base URL.
    Configuration,
    /// Calendar data failed to parse in strict mode.
    Parse,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventCreationFailed => "event_creation_failed",
            Self::EventDeletionFailed => "event_deletion_failed",
            Self::EventFetchFailed => "event_fetch_failed",
            Self::CalendarDiscoveryFailed => "calendar_discovery_failed",
            Self::Network => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::InvalidRequest => "invalid_request",
            Self::Configuration => "configuration_error",
            Self::Parse => "parse_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised by a [`CalDavSession`](crate::CalDavSession) operation.
#[derive(Debug, Error)]
pub struct CalendarError {
    code: ErrorCode,
    message: String,
    /// HTTP status that triggered the error, when there was one.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CalendarError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    pub fn event_creation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EventCreationFailed, message)
    }

    pub fn event_deletion(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EventDeletionFailed, message)
    }

    pub fn event_fetch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EventFetchFailed, message)
    }

    pub fn discovery(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CalendarDiscoveryFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidResponse, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Configuration, message)
    }

    /// Attaches the HTTP status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

impl From<ParseError> for CalendarError {
    fn from(err: ParseError) -> Self {
        Self::new(ErrorCode::Parse, err.to_string()).with_source(err)
    }
}

impl From<url::ParseError> for CalendarError {
    fn from(err: url::ParseError) -> Self {
        Self::configuration(format!("Invalid CalDAV URL: {}", err)).with_source(err)
    }
}

/// A specialized Result type for session operations.
pub type Result<T> = std::result::Result<T, CalendarError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn code_names() {
        assert_eq!(
            ErrorCode::EventCreationFailed.as_str(),
            "event_creation_failed"
        );
        assert_eq!(
            ErrorCode::CalendarDiscoveryFailed.to_string(),
            "calendar_discovery_failed"
        );
    }

    #[test]
    fn display_includes_status() {
        let err = CalendarError::event_deletion("event was not deleted").with_status(400);
        assert_eq!(
            err.to_string(),
            "event_deletion_failed: event was not deleted (HTTP 400)"
        );
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn display_without_status() {
        let err = CalendarError::discovery("no principal");
        assert_eq!(err.to_string(), "calendar_discovery_failed: no principal");
        assert!(err.status().is_none());
    }

    #[test]
    fn url_error_is_configuration() {
        let err: CalendarError = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(err.code(), ErrorCode::Configuration);
        assert!(err.message().starts_with("Invalid CalDAV URL"));
    }

    #[test]
    fn parse_error_converts_with_source() {
        let err: CalendarError = ParseError::UnterminatedEvent.into();
        assert_eq!(err.code(), ErrorCode::Parse);
        assert!(err.source().is_some());
    }
}
