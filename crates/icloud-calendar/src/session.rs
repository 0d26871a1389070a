//! The public CalDAV session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use icloud_calendar_core::{
    Calendar, Event, EventDraft, IdGenerator, TimestampIdGenerator, encode_event,
    parse_calendar_text_with,
};
use reqwest::Method;
use tracing::{debug, info, warn};

use crate::client::HttpTransportFactory;
use crate::config::{Credentials, ICloudConfig};
use crate::error::{CalendarError, ErrorCode, Result};
use crate::transport::{
    CALENDAR_RESOURCE_TYPE, DavRequest, DavTransport, Depth, PropName, PropValue,
    PropfindResponse, TransportFactory,
};
use crate::xml::{calendar_query_body, parse_multistatus};

const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";
const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// An authenticated handle on one iCloud account.
///
/// Operations are independent: each one connects a fresh transport and runs
/// its round trips one after the other. Cloning is cheap.
#[derive(Clone)]
pub struct CalDavSession {
    config: ICloudConfig,
    credentials: Credentials,
    factory: Arc<dyn TransportFactory>,
    ids: Arc<dyn IdGenerator>,
}

impl CalDavSession {
    /// Creates a session against the iCloud endpoint.
    pub fn new(username: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self::with_config(ICloudConfig::default(), Credentials::new(username, app_password))
    }

    pub fn with_config(config: ICloudConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            factory: Arc::new(HttpTransportFactory),
            ids: Arc::new(TimestampIdGenerator),
        }
    }

    /// Replaces the transport factory (used by tests and proxies).
    pub fn with_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Replaces the identifier generator.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &ICloudConfig {
        &self.config
    }

    fn connect(&self) -> Result<Box<dyn DavTransport>> {
        self.factory.connect(&self.config, &self.credentials)
    }

    /// Stores a new event in `calendar_url` and returns the event URL.
    ///
    /// The URL is `calendar_url` followed by a generated id and `.ics`, so
    /// `calendar_url` is expected to end with a slash.
    pub async fn create_event(&self, calendar_url: &str, draft: &EventDraft) -> Result<String> {
        let uid = format!("{}@{}", self.ids.generate(), self.config.uid_domain);
        let url = format!("{}{}.ics", calendar_url, self.ids.generate());
        let body = encode_event(&uid, draft);

        debug!(url = %url, uid = %uid, "Creating event");

        let transport = self.connect()?;
        let response = transport
            .request(
                DavRequest::new(Method::PUT, &url)
                    .with_header("Content-Type", ICS_CONTENT_TYPE)
                    .with_body(body),
            )
            .await?;

        if !response.is_success() {
            return Err(CalendarError::event_creation(format!(
                "Server rejected event at {}",
                url
            ))
            .with_status(response.status));
        }

        info!(url = %url, "Created event");
        Ok(url)
    }

    /// Deletes the event stored at `event_url`.
    ///
    /// Only `204 No Content` counts as success.
    pub async fn delete_event(&self, event_url: &str) -> Result<()> {
        debug!(url = %event_url, "Deleting event");

        let transport = self.connect()?;
        let response = transport
            .request(DavRequest::new(Method::DELETE, event_url))
            .await?;

        if response.status != 204 {
            return Err(CalendarError::event_deletion(format!(
                "Event at {} was not deleted",
                event_url
            ))
            .with_status(response.status));
        }

        info!(url = %event_url, "Deleted event");
        Ok(())
    }

    /// Lists the calendars of the account in server order.
    pub async fn list_calendars(&self) -> Result<Vec<Calendar>> {
        let transport = self.connect()?;

        let principal = discover_href(
            transport.as_ref(),
            "",
            PropName::CURRENT_USER_PRINCIPAL,
            "current user principal",
        )
        .await?;
        debug!(principal = %principal, "Resolved principal");

        let home = discover_href(
            transport.as_ref(),
            &principal,
            PropName::CALENDAR_HOME_SET,
            "calendar home set",
        )
        .await?;
        debug!(home = %home, "Resolved calendar home");

        let listing = transport
            .propfind(
                &home,
                &[PropName::RESOURCE_TYPE, PropName::DISPLAY_NAME],
                Depth::One,
            )
            .await
            .map_err(discovery_error(&home))?;
        ensure_discovered(&listing, &home)?;

        let calendars: Vec<Calendar> = listing
            .resources
            .into_iter()
            .filter(|resource| {
                resource
                    .prop(PropName::RESOURCE_TYPE)
                    .is_some_and(|t| t.has_resource_type(CALENDAR_RESOURCE_TYPE))
            })
            .map(|resource| {
                let name = resource
                    .prop(PropName::DISPLAY_NAME)
                    .and_then(PropValue::as_text)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| last_segment(&resource.href).to_string());
                Calendar::new(resource.href, name)
            })
            .collect();

        info!(count = calendars.len(), "Discovered calendars");
        Ok(calendars)
    }

    /// Lists the events of `calendar_url` overlapping `[start, end)`.
    pub async fn list_events(
        &self,
        calendar_url: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        if start >= end {
            return Err(CalendarError::invalid_request(format!(
                "Start {} is not before end {}",
                start, end
            )));
        }

        let method = Method::from_bytes(b"REPORT")
            .map_err(|e| CalendarError::invalid_request("Invalid HTTP method").with_source(e))?;
        let body = calendar_query_body(start, end)?;

        debug!(url = %calendar_url, start = %start, end = %end, "Querying events");

        let transport = self.connect()?;
        let response = transport
            .request(
                DavRequest::new(method, calendar_url)
                    .with_header("Depth", Depth::One.as_str())
                    .with_header("Content-Type", XML_CONTENT_TYPE)
                    .with_body(body),
            )
            .await?;

        if !response.is_success() {
            return Err(CalendarError::event_fetch(format!(
                "Calendar query on {} failed",
                calendar_url
            ))
            .with_status(response.status));
        }

        let resources =
            parse_multistatus(&response.body, &[PropName::GET_ETAG, PropName::CALENDAR_DATA])?;
        debug!(count = resources.len(), "Received event responses");

        let mut events = Vec::new();
        for resource in &resources {
            let Some(data) = resource
                .prop(PropName::CALENDAR_DATA)
                .and_then(PropValue::as_text)
            else {
                continue;
            };
            events.extend(parse_calendar_text_with(data, self.config.parse_mode)?);
        }

        info!(url = %calendar_url, count = events.len(), "Fetched events");
        Ok(events)
    }
}

impl fmt::Debug for CalDavSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalDavSession")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Runs a depth-0 PROPFIND and returns the href value of `prop`.
async fn discover_href(
    transport: &dyn DavTransport,
    url: &str,
    prop: PropName,
    what: &str,
) -> Result<String> {
    let response = transport
        .propfind(url, &[prop], Depth::Zero)
        .await
        .map_err(discovery_error(url))?;
    ensure_discovered(&response, url)?;

    response
        .first_prop(prop)
        .and_then(PropValue::as_text)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CalendarError::discovery(format!("No {} found at '{}'", what, url)))
}

/// Reports an unreadable multistatus body as a discovery failure.
fn discovery_error(url: &str) -> impl FnOnce(CalendarError) -> CalendarError + '_ {
    move |err| {
        if err.code() != ErrorCode::InvalidResponse {
            return err;
        }
        CalendarError::discovery(format!("Unreadable PROPFIND response from '{}'", url))
            .with_source(err)
    }
}

fn ensure_discovered(response: &PropfindResponse, url: &str) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    warn!(url = %url, status = response.status, "Discovery request failed");
    Err(
        CalendarError::discovery(format!("PROPFIND on '{}' was not successful", url))
            .with_status(response.status),
    )
}

fn last_segment(href: &str) -> &str {
    href.trim_end_matches('/').rsplit('/').next().unwrap_or(href)
}
