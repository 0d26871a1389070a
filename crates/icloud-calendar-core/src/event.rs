//! Event types.
//!
//! [`EventDraft`] is what callers hand to the encoder when creating an event,
//! [`Event`] is what the parser produces when reading events back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::calendar::Attendee;

/// An event decoded from a `VEVENT` block.
///
/// The well-known properties get typed fields. Every other property is kept
/// verbatim in [`Event::properties`] under its lowercased key (parameters
/// included, e.g. `attendee;cn=john doe`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// `SUMMARY` value.
    pub summary: Option<String>,
    /// `DESCRIPTION` value.
    pub description: Option<String>,
    /// `DTSTART`, in the event timezone or UTC.
    pub dtstart: Option<DateTime<Tz>>,
    /// `DTEND`, in the event timezone or UTC.
    pub dtend: Option<DateTime<Tz>>,
    /// Last `TZID` parameter seen on any property of the event.
    pub timezone: Option<String>,
    /// Attendees with a `CN` parameter and a `mailto:` address.
    pub attendees: Vec<Attendee>,
    /// Remaining properties, lowercased key to raw value.
    pub properties: BTreeMap<String, String>,
}

impl Event {
    /// Looks up a passthrough property, ignoring case.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `UID` of the event, if present.
    pub fn uid(&self) -> Option<&str> {
        self.property("uid")
    }

    /// Start converted to UTC.
    pub fn start_utc(&self) -> Option<DateTime<Utc>> {
        self.dtstart.map(|dt| dt.with_timezone(&Utc))
    }

    /// End converted to UTC.
    pub fn end_utc(&self) -> Option<DateTime<Utc>> {
        self.dtend.map(|dt| dt.with_timezone(&Utc))
    }
}

/// Input for creating a new event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: Vec<Attendee>,
}

impl EventDraft {
    /// Creates a draft with an empty description and no attendees.
    pub fn new(summary: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            summary: summary.into(),
            description: String::new(),
            start,
            end,
            attendees: Vec::new(),
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method to add one attendee.
    pub fn with_attendee(mut self, attendee: Attendee) -> Self {
        self.attendees.push(attendee);
        self
    }

    /// Builder method to replace the attendee list.
    pub fn with_attendees(mut self, attendees: impl IntoIterator<Item = Attendee>) -> Self {
        self.attendees = attendees.into_iter().collect();
        self
    }
}
