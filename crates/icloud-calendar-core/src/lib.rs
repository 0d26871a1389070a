//! Core types: attendees, calendars, events, iCalendar encoding and parsing

pub mod calendar;
pub mod event;
pub mod ics;
pub mod ident;
pub mod tracing;

pub use calendar::{Attendee, Calendar};
pub use event::{Event, EventDraft};
pub use ics::{
    ParseError, ParseMode, encode_event, format_utc_basic, parse_calendar_text,
    parse_calendar_text_with,
};
pub use ident::{IdGenerator, TimestampIdGenerator, UuidIdGenerator};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
