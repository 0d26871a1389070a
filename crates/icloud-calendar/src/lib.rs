//! iCloud calendar access over CalDAV.
//!
//! [`CalDavSession`] authenticates with an Apple ID and an app-specific
//! password and offers four operations: discovering calendars, listing events
//! in a time range, creating an event and deleting one.
//!
//! ```no_run
//! # async fn run() -> icloud_calendar::Result<()> {
//! use chrono::{Duration, Utc};
//! use icloud_calendar::{CalDavSession, EventDraft};
//!
//! let session = CalDavSession::new("john@icloud.com", "abcd-efgh-ijkl-mnop");
//! let calendars = session.list_calendars().await?;
//!
//! if let Some(calendar) = calendars.first() {
//!     let start = Utc::now();
//!     let draft = EventDraft::new("Sync", start, start + Duration::hours(1));
//!     let url = session.create_event(&calendar.url, &draft).await?;
//!     let events = session
//!         .list_events(&calendar.url, start, start + Duration::days(1))
//!         .await?;
//!     println!("{} events", events.len());
//!     session.delete_event(&url).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod transport;
pub mod xml;

pub use client::{HttpTransport, HttpTransportFactory};
pub use config::{Credentials, ICloudConfig};
pub use error::{CalendarError, ErrorCode, Result};
pub use session::CalDavSession;
pub use transport::{
    BoxFuture, CALENDAR_RESOURCE_TYPE, DavRequest, DavResource, DavResponse, DavTransport, Depth,
    PropName, PropValue, PropfindResponse, TransportFactory,
};

pub use icloud_calendar_core::{
    Attendee, Calendar, Event, EventDraft, IdGenerator, ParseError, ParseMode,
    TimestampIdGenerator, UuidIdGenerator,
};
