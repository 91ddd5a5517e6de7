//! Conversation store: one ordered message log per contact.
//!
//! Messages are keyed by timestamp, which the relay uses as the message
//! identifier. A conversation keeps two views of the same data:
//! - `messages`: timestamp → message, for receipts and echoes to find their target
//! - `order`: timestamps in arrival order, append-only
//!
//! Arrival order is not timestamp order. A message sent from a slow phone can
//! arrive after one sent later from a fast one, and the log shows what the
//! user saw, in the order they saw it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use parley_types::{ContactId, Timestamp, WireAttachment};
use serde::{Deserialize, Serialize};

use crate::Contact;

/// Prefix written into the content of messages the relay refused to send.
pub const FAILURE_MARKER: &str = "FAILED TO SEND";

/// A single message in a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Message body.
    pub content: String,
    /// Conversation-unique identifier.
    pub timestamp: Timestamp,
    /// Delivered to the peer's device.
    pub is_delivered: bool,
    /// Read (by the peer for our messages, by us for theirs).
    pub is_read: bool,
    /// Sent by this account.
    pub from_self: bool,
    /// Sender label at the time the message arrived.
    pub from: String,
    /// Attached files, in the order they were attached.
    pub attachments: Vec<Attachment>,
    /// Sender of an inbound message; `None` iff `from_self`.
    pub from_contact: Option<ContactId>,
}

impl Message {
    /// A message this account sent (or is about to send).
    pub fn outgoing(timestamp: Timestamp, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp,
            is_delivered: false,
            is_read: false,
            from_self: true,
            from: " ~ ".to_string(),
            attachments: Vec::new(),
            from_contact: None,
        }
    }

    /// A message received from `sender`.
    pub fn incoming(timestamp: Timestamp, content: impl Into<String>, sender: &Contact) -> Self {
        Self {
            content: content.into(),
            timestamp,
            is_delivered: true,
            is_read: false,
            from_self: false,
            from: sender.label().to_string(),
            attachments: Vec::new(),
            from_contact: Some(sender.id.clone()),
        }
    }

    /// Attach files (builder).
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Record a send failure in the visible content.
    pub fn mark_failed(&mut self, error: &dyn fmt::Display) {
        self.content = format!("{}: {} ERROR: {}", FAILURE_MARKER, self.content, error);
    }

    /// Whether this message is a failed-send artifact.
    pub fn is_failed(&self) -> bool {
        self.from_self && self.content.starts_with(FAILURE_MARKER)
    }

    /// Track locally staged files on a message we sent.
    pub fn add_staged_attachments(&mut self, staged: &[(PathBuf, u64)]) {
        for (path, size) in staged {
            self.attachments
                .push(Attachment::staged(path, *size, self.timestamp));
        }
    }
}

/// Any file sent or received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    /// MIME type.
    #[serde(rename = "contentType")]
    pub content_type: String,
    /// File name (a full local path for files we attached).
    pub filename: String,
    /// Relay-side attachment id, absent until the relay stores the file.
    pub id: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Timestamp of the owning message.
    pub timestamp: Timestamp,
    /// Attached by this account.
    pub from_self: bool,
}

impl Attachment {
    /// Convert a wire attachment belonging to the message at `timestamp`.
    pub fn from_wire(wire: &WireAttachment, timestamp: Timestamp, from_self: bool) -> Self {
        Self {
            content_type: wire.content_type.clone(),
            filename: wire.filename.clone().unwrap_or_default(),
            id: wire.id.clone().filter(|id| !id.is_empty()),
            size: wire.size,
            timestamp,
            from_self,
        }
    }

    /// Convert every wire attachment of one message.
    pub fn convert_all(wire: &[WireAttachment], timestamp: Timestamp, from_self: bool) -> Vec<Self> {
        wire.iter()
            .map(|a| Self::from_wire(a, timestamp, from_self))
            .collect()
    }

    /// A local file attached to an outgoing message.
    pub fn staged(path: &Path, size: u64, timestamp: Timestamp) -> Self {
        Self {
            content_type: String::new(),
            filename: path.to_string_lossy().into_owned(),
            id: None,
            size,
            timestamp,
            from_self: true,
        }
    }

    /// Where the file lives on disk.
    ///
    /// Relay-stored files sit in `<relay_dir>/attachments/<id>`; files we
    /// staged ourselves are referenced by their original path.
    pub fn path(&self, relay_dir: &Path) -> PathBuf {
        match &self.id {
            Some(id) => relay_dir.join("attachments").join(id),
            None => PathBuf::from(&self.filename),
        }
    }
}

/// Outcome of [`Conversation::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First time this timestamp was seen.
    Inserted,
    /// An existing message was overwritten in place.
    Replaced,
}

/// Ordered message history for one contact or group.
#[derive(Debug, Clone)]
pub struct Conversation {
    contact: ContactId,
    messages: HashMap<Timestamp, Message>,
    order: Vec<Timestamp>,
    has_unread: bool,
    dirty: bool,
    draft: String,
    staged_attachments: Vec<PathBuf>,
}

impl Conversation {
    /// Create an empty conversation owned by `contact`.
    pub fn new(contact: ContactId) -> Self {
        Self {
            contact,
            messages: HashMap::new(),
            order: Vec::new(),
            has_unread: false,
            dirty: false,
            draft: String::new(),
            staged_attachments: Vec::new(),
        }
    }

    /// The contact (or group) this conversation belongs to.
    pub fn contact(&self) -> &ContactId {
        &self.contact
    }

    /// Insert a message, or overwrite the one with the same timestamp.
    ///
    /// Overwrites keep the original arrival position and never raise the
    /// unread flag. Neither do our own messages.
    pub fn upsert(&mut self, mut message: Message) -> Upsert {
        self.dirty = true;
        let ts = message.timestamp;
        if let Some(existing) = self.messages.get_mut(&ts) {
            *existing = message;
            return Upsert::Replaced;
        }

        // Logs written before senders were recorded
        if !message.from_self && message.from_contact.is_none() {
            message.from_contact = Some(self.contact.clone());
        }
        if !message.from_self {
            self.has_unread = true;
        }
        self.messages.insert(ts, message);
        self.order.push(ts);
        Upsert::Inserted
    }

    /// Look up a message by timestamp.
    pub fn get(&self, timestamp: Timestamp) -> Option<&Message> {
        self.messages.get(&timestamp)
    }

    /// Look up a message by timestamp for modification.
    pub fn get_mut(&mut self, timestamp: Timestamp) -> Option<&mut Message> {
        self.messages.get_mut(&timestamp)
    }

    /// Messages in arrival order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.order.iter().filter_map(|ts| self.messages.get(ts))
    }

    /// Timestamps in arrival order.
    pub fn order(&self) -> &[Timestamp] {
        &self.order
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the conversation has no messages.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The most recently arrived message.
    pub fn last_message(&self) -> Option<&Message> {
        self.order.last().and_then(|ts| self.messages.get(ts))
    }

    /// A message arrived since the user last caught up.
    pub fn has_unread(&self) -> bool {
        self.has_unread
    }

    /// Changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the conversation as needing a save.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Flag the conversation as saved.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Mark the trailing unread run as read.
    ///
    /// Walks backwards from the newest message and stops at the first
    /// message that is already read and not our own. Our own messages never
    /// stop the walk.
    pub fn caught_up(&mut self) {
        for ts in self.order.iter().rev() {
            let Some(message) = self.messages.get_mut(ts) else {
                continue;
            };
            if message.is_read && !message.from_self {
                break;
            }
            message.is_read = true;
        }
        self.has_unread = false;
    }

    /// Text typed but not yet sent.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the staged draft.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Drop the staged draft.
    pub fn clear_draft(&mut self) {
        self.draft.clear();
    }

    /// Queue a file for the next outgoing message.
    pub fn stage_attachment(&mut self, path: impl Into<PathBuf>) {
        self.staged_attachments.push(path.into());
    }

    /// Files queued for the next outgoing message.
    pub fn staged_attachments(&self) -> &[PathBuf] {
        &self.staged_attachments
    }

    /// Number of queued files.
    pub fn staged_attachment_count(&self) -> usize {
        self.staged_attachments.len()
    }

    /// Remove the queued files and hand them to an outgoing message.
    pub fn take_staged_attachments(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.staged_attachments)
    }

    /// Put files taken for a message that was not sent back at the front of
    /// the queue, ahead of anything staged since.
    pub fn restage_attachments(&mut self, paths: Vec<PathBuf>) {
        self.staged_attachments.splice(0..0, paths);
    }

    /// Drop queued files.
    pub fn clear_attachments(&mut self) {
        self.staged_attachments.clear();
    }

    /// Drop the draft and the queued files.
    pub fn clear_staged(&mut self) {
        self.clear_draft();
        self.clear_attachments();
    }

    /// Whether there is a draft or any queued file.
    pub fn has_staged_data(&self) -> bool {
        !self.draft.is_empty() || !self.staged_attachments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv() -> Conversation {
        Conversation::new(ContactId::new("+15550001111"))
    }

    fn bob() -> Contact {
        Contact::new("+15550001111").with_name("Bob")
    }

    // ===========================================
    // Upsert
    // ===========================================

    #[test]
    fn upsert_same_timestamp_is_idempotent() {
        let mut c = conv();
        assert_eq!(c.upsert(Message::outgoing(100, "first")), Upsert::Inserted);
        assert_eq!(c.upsert(Message::outgoing(100, "second")), Upsert::Replaced);

        assert_eq!(c.len(), 1);
        assert_eq!(c.get(100).unwrap().content, "second");
    }

    #[test]
    fn overwrite_does_not_signal_new_message() {
        let mut c = conv();
        c.upsert(Message::incoming(100, "hi", &bob()));
        c.caught_up();
        assert!(!c.has_unread());

        c.upsert(Message::incoming(100, "hi (edited)", &bob()));
        assert!(!c.has_unread());
    }

    #[test]
    fn order_is_arrival_not_timestamp() {
        let mut c = conv();
        for ts in [300, 100, 200, 50] {
            c.upsert(Message::outgoing(ts, format!("m{ts}")));
        }
        assert_eq!(c.len(), 4);
        assert_eq!(c.order(), &[300, 100, 200, 50]);

        let contents: Vec<&str> = c.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m300", "m100", "m200", "m50"]);
        assert_eq!(c.last_message().unwrap().timestamp, 50);
    }

    #[test]
    fn upsert_marks_dirty_and_unread() {
        let mut c = conv();
        assert!(!c.is_dirty());
        c.upsert(Message::incoming(1, "x", &bob()));
        assert!(c.is_dirty());
        assert!(c.has_unread());

        c.mark_clean();
        assert!(!c.is_dirty());
    }

    #[test]
    fn own_messages_are_never_unread() {
        let mut c = conv();
        c.upsert(Message::outgoing(1, "mine"));
        assert!(c.is_dirty());
        assert!(!c.has_unread());
    }

    #[test]
    fn legacy_message_without_sender_gets_owner() {
        let mut c = conv();
        let mut legacy = Message::incoming(1, "old", &bob());
        legacy.from_contact = None;
        c.upsert(legacy);
        assert_eq!(
            c.get(1).unwrap().from_contact,
            Some(ContactId::new("+15550001111"))
        );
    }

    // ===========================================
    // CaughtUp
    // ===========================================

    #[test]
    fn caught_up_marks_trailing_unread_run() {
        let mut c = conv();
        let mut old = Message::incoming(1, "old", &bob());
        old.is_read = false;
        c.upsert(old);
        let mut read = Message::incoming(2, "read", &bob());
        read.is_read = true;
        c.upsert(read);
        c.upsert(Message::incoming(3, "new1", &bob()));
        c.upsert(Message::incoming(4, "new2", &bob()));

        c.caught_up();

        assert!(c.get(3).unwrap().is_read);
        assert!(c.get(4).unwrap().is_read);
        assert!(c.get(2).unwrap().is_read);
        // Before the already-read message: untouched
        assert!(!c.get(1).unwrap().is_read);
        assert!(!c.has_unread());
    }

    #[test]
    fn caught_up_walks_past_own_messages() {
        let mut c = conv();
        c.upsert(Message::incoming(1, "theirs", &bob()));
        let mut mine = Message::outgoing(2, "mine");
        mine.is_read = true;
        c.upsert(mine);
        c.upsert(Message::incoming(3, "theirs again", &bob()));

        c.caught_up();

        assert!(c.messages().all(|m| m.is_read));
    }

    #[test]
    fn caught_up_on_empty_is_noop() {
        let mut c = conv();
        c.caught_up();
        assert!(c.is_empty());
    }

    // ===========================================
    // Staging
    // ===========================================

    #[test]
    fn staging_and_clearing() {
        let mut c = conv();
        assert!(!c.has_staged_data());

        c.set_draft("half a thought");
        assert!(c.has_staged_data());
        c.stage_attachment("/tmp/cat.png");
        c.stage_attachment("/tmp/dog.png");
        assert_eq!(c.staged_attachment_count(), 2);

        c.clear_attachments();
        assert_eq!(c.staged_attachment_count(), 0);
        assert_eq!(c.draft(), "half a thought");

        c.stage_attachment("/tmp/cat.png");
        c.clear_staged();
        assert!(!c.has_staged_data());
    }

    #[test]
    fn taken_attachments_leave_later_ones_queued() {
        let mut c = conv();
        c.stage_attachment("/tmp/cat.png");
        let taken = c.take_staged_attachments();
        assert_eq!(taken, vec![PathBuf::from("/tmp/cat.png")]);
        assert_eq!(c.staged_attachment_count(), 0);

        c.stage_attachment("/tmp/dog.png");
        c.restage_attachments(taken);
        assert_eq!(
            c.staged_attachments(),
            &[PathBuf::from("/tmp/cat.png"), PathBuf::from("/tmp/dog.png")]
        );
    }

    // ===========================================
    // Messages and attachments
    // ===========================================

    #[test]
    fn failed_message_carries_marker() {
        let mut m = Message::outgoing(1, "hello");
        m.mark_failed(&"relay exited with status 1");
        assert!(m.is_failed());
        assert!(m.content.contains(FAILURE_MARKER));
        assert!(m.content.contains("hello"));
        assert!(m.content.contains("relay exited"));
    }

    #[test]
    fn incoming_records_sender() {
        let m = Message::incoming(9, "yo", &bob());
        assert!(!m.from_self);
        assert!(m.is_delivered);
        assert_eq!(m.from, "Bob");
        assert_eq!(m.from_contact, Some(ContactId::new("+15550001111")));
    }

    #[test]
    fn attachment_path_resolution() {
        let relay_dir = Path::new("/home/u/.local/share/signal-cli");

        let stored = Attachment::from_wire(
            &WireAttachment {
                content_type: "image/png".into(),
                filename: Some("cat.png".into()),
                id: Some("123456".into()),
                size: 10,
            },
            5,
            false,
        );
        assert_eq!(
            stored.path(relay_dir),
            PathBuf::from("/home/u/.local/share/signal-cli/attachments/123456")
        );

        let local = Attachment::staged(Path::new("/tmp/dog.png"), 20, 5);
        assert_eq!(local.path(relay_dir), PathBuf::from("/tmp/dog.png"));
        assert!(local.from_self);
    }

    #[test]
    fn staged_attachments_take_message_timestamp() {
        let mut m = Message::outgoing(42, "look");
        m.add_staged_attachments(&[(PathBuf::from("/tmp/a.txt"), 3)]);
        assert_eq!(m.attachments.len(), 1);
        assert_eq!(m.attachments[0].timestamp, 42);
        assert_eq!(m.attachments[0].size, 3);
    }

    #[test]
    fn message_json_line_has_persisted_field_names() {
        let m = Message::incoming(7, "hi", &bob());
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"is_delivered\":true"));
        assert!(json.contains("\"from_contact\":\"+15550001111\""));

        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
