//! Error types for the parley wire format.

use thiserror::Error;

/// Errors that can occur while decoding relay output.
#[derive(Debug, Error)]
pub enum WireError {
    /// A line was not a valid JSON envelope
    #[error("malformed wire line: {0}")]
    Decode(#[source] serde_json::Error),

    /// Encoding an envelope back to JSON failed
    #[error("encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The relay user-data listing could not be parsed
    #[error("invalid user data: {0}")]
    Listing(#[source] serde_json::Error),

    /// Relay returned something other than a message timestamp
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WireError::InvalidTimestamp("abc".into());
        assert_eq!(err.to_string(), "invalid timestamp: \"abc\"");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
