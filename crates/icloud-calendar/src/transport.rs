//! The WebDAV transport seam.
//!
//! [`CalDavSession`](crate::CalDavSession) talks to the server only through
//! [`DavTransport`]. A [`TransportFactory`] builds a fresh transport for every
//! session operation, so nothing is shared between calls.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use reqwest::Method;

use crate::config::{Credentials, ICloudConfig};
use crate::error::Result;

/// A boxed future for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";

/// A namespaced WebDAV property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropName {
    pub namespace: &'static str,
    pub name: &'static str,
}

impl PropName {
    pub const CURRENT_USER_PRINCIPAL: Self = Self::dav("current-user-principal");
    pub const DISPLAY_NAME: Self = Self::dav("displayname");
    pub const RESOURCE_TYPE: Self = Self::dav("resourcetype");
    pub const GET_ETAG: Self = Self::dav("getetag");
    pub const CALENDAR_HOME_SET: Self = Self::caldav("calendar-home-set");
    pub const CALENDAR_DATA: Self = Self::caldav("calendar-data");

    pub const fn dav(name: &'static str) -> Self {
        Self {
            namespace: DAV_NS,
            name,
        }
    }

    pub const fn caldav(name: &'static str) -> Self {
        Self {
            namespace: CALDAV_NS,
            name,
        }
    }

    /// Whether a resolved element name refers to this property.
    pub fn matches(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

impl fmt::Display for PropName {
    /// Clark notation: `{DAV:}displayname`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.name)
    }
}

/// Clark-notation name of the CalDAV calendar resource type.
pub const CALENDAR_RESOURCE_TYPE: &str = "{urn:ietf:params:xml:ns:caldav}calendar";

/// The value of a property in a multistatus response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// Plain text content.
    Text(String),
    /// Content of a nested `<href>` element.
    Href(String),
    /// Child element names in Clark notation (used by `resourcetype`).
    ResourceTypes(Vec<String>),
    /// Present but empty.
    Empty,
}

impl PropValue {
    /// The href or text content, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Href(s) => Some(s),
            Self::ResourceTypes(_) | Self::Empty => None,
        }
    }

    /// Whether this is a resource type list containing `type_name`.
    pub fn has_resource_type(&self, type_name: &str) -> bool {
        match self {
            Self::ResourceTypes(types) => types.iter().any(|t| t == type_name),
            _ => false,
        }
    }
}

/// One `<response>` of a PROPFIND multistatus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResource {
    pub href: String,
    /// Properties reported with a `200` propstat, in document order.
    pub props: Vec<(PropName, PropValue)>,
}

impl DavResource {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            props: Vec::new(),
        }
    }

    /// Builder method to add a property.
    pub fn with_prop(mut self, name: PropName, value: PropValue) -> Self {
        self.props.push((name, value));
        self
    }

    pub fn prop(&self, name: PropName) -> Option<&PropValue> {
        self.props
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

/// PROPFIND `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// The target resource only.
    Zero,
    /// The target and its immediate children.
    One,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
        }
    }
}

/// A PROPFIND result: HTTP status plus the parsed resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropfindResponse {
    pub status: u16,
    pub resources: Vec<DavResource>,
}

impl PropfindResponse {
    pub fn new(status: u16, resources: Vec<DavResource>) -> Self {
        Self { status, resources }
    }

    /// 2xx, including `207 Multi-Status`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of `name` across all resources.
    pub fn first_prop(&self, name: PropName) -> Option<&PropValue> {
        self.resources.iter().find_map(|r| r.prop(name))
    }
}

/// A generic WebDAV request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavRequest {
    pub method: Method,
    /// Absolute or server-relative URL.
    pub url: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl DavRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResponse {
    pub status: u16,
    pub body: String,
}

impl DavResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An authenticated WebDAV client.
///
/// Non-2xx statuses are not errors at this level: they are returned to the
/// caller, which decides what they mean. Errors are reserved for failures to
/// complete the exchange at all.
pub trait DavTransport: Send + Sync {
    /// Sends an arbitrary request.
    fn request(&self, request: DavRequest) -> BoxFuture<'_, Result<DavResponse>>;

    /// Runs a PROPFIND for `props` on `url`.
    fn propfind<'a>(
        &'a self,
        url: &'a str,
        props: &'a [PropName],
        depth: Depth,
    ) -> BoxFuture<'a, Result<PropfindResponse>>;
}

/// Builds a transport bound to one set of credentials.
pub trait TransportFactory: Send + Sync {
    fn connect(
        &self,
        config: &ICloudConfig,
        credentials: &Credentials,
    ) -> Result<Box<dyn DavTransport>>;
}
