//! iCalendar (RFC 5545) text handling.
//!
//! Only the subset needed for single `VEVENT` resources is covered: the
//! encoder writes one fixed-layout event, the parser reads `VEVENT` blocks
//! line by line into [`Event`](crate::Event) records.

mod encode;
mod parse;

pub use encode::{encode_event, format_utc_basic};
pub use parse::{ParseError, ParseMode, parse_calendar_text, parse_calendar_text_with};
