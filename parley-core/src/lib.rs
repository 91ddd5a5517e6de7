//! # parley-core
//!
//! Pure logic for parley (no I/O, instant tests).
//!
//! This crate holds the conversation model and the rules that reconcile the
//! relay's three event streams (sent echoes, inbound messages, receipts) into
//! one ordered log per contact.
//!
//! ## Design Philosophy
//!
//! Nothing here touches the network, the disk, or a clock. Every mutation
//! returns an outcome describing what changed, and `parley-client` decides
//! what to log, persist, or notify. This keeps:
//! - Unit tests instant (no mocks, no async)
//! - Reconciliation deterministic (same events → same log)
//!
//! - [`Directory`] / [`Contact`]: who is who
//! - [`Conversation`] / [`ConversationBook`]: per-contact message logs
//! - [`Model`]: the reconciliation rules over both
//! - [`Dispatcher`]: classifies decoded relay lines and runs observers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod book;
pub mod contact;
pub mod conversation;
pub mod dispatch;
pub mod model;

pub use book::ConversationBook;
pub use contact::{Contact, Directory, DirectoryOptions};
pub use conversation::{Attachment, Conversation, Message, Upsert, FAILURE_MARKER};
pub use dispatch::{DispatchError, Dispatcher, EventKind, ObserverError};
pub use model::{Arrival, Model, ReceiptOutcome};
