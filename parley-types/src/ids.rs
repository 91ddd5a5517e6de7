//! Identity and ordering types for parley.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WireError;

/// Message timestamp in milliseconds since the Unix epoch.
///
/// The relay uses the send timestamp as the message identifier, so within one
/// conversation a timestamp is the unique key of a message.
pub type Timestamp = i64;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Parse the timestamp the relay prints after a successful send.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, WireError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<Timestamp>()
        .map_err(|_| WireError::InvalidTimestamp(trimmed.to_string()))
}

/// Identifier of a contact or group.
///
/// A phone number (`+15551234567`) for peers, the relay's base64 group id for
/// groups. Globally unique across both kinds.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    /// Create a ContactId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty (the relay omits it on some echoes).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ContactId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContactId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ContactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContactId({})", self.0)
    }
}
