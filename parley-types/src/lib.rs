//! # parley-types
//!
//! Wire format types for the parley synchronization engine.
//!
//! The relay process (signal-cli) emits newline-delimited JSON, one envelope
//! per line. This crate provides the typed view of that stream plus the
//! relay's on-disk contact/group listing:
//! - [`ContactId`], [`Timestamp`] - Identity and ordering types
//! - [`WireMessage`], [`Envelope`] - One decoded relay line
//! - [`DataMessage`], [`SentMessage`], [`ReceiptMessage`] - Envelope payloads
//! - [`UserData`] - Directory bootstrap listing
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod ids;
mod listing;
mod messages;

pub use envelope::{Envelope, WireMessage};
pub use error::WireError;
pub use ids::{now_millis, parse_timestamp, ContactId, Timestamp};
pub use listing::{ContactListing, ContactStore, GroupListing, GroupStore, UserData};
pub use messages::{
    DataMessage, GroupInfo, ReceiptMessage, SentMessage, SyncMessage, WireAttachment,
};
