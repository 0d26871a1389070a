//! Plain value types exchanged with the CalDAV server.

use serde::{Deserialize, Serialize};

/// An event participant, rendered as an `ATTENDEE` line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attendee {
    /// Common name (`CN=` parameter).
    pub name: String,
    /// Email address, without the `mailto:` scheme.
    pub email: String,
}

impl Attendee {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A calendar collection found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Calendar {
    /// Collection URL as returned by the server (absolute or server-relative).
    pub url: String,
    /// Display name.
    pub name: String,
}

impl Calendar {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}
