//! Reconciliation rules over the directory and the conversation book.
//!
//! Each `apply_*` method folds one decoded envelope into the model and
//! returns what changed. Envelopes that do not carry the expected payload
//! return `None` and leave the model untouched.

use parley_types::{ContactId, Envelope, Timestamp};

use crate::{Attachment, Contact, ConversationBook, Directory, Message, Upsert};

/// Where an inbound or echoed message landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrival {
    /// Conversation the message was stored in (peer or group).
    pub conversation: ContactId,
    /// Sender of an inbound message; `None` for our own echoes.
    pub sender: Option<ContactId>,
    /// Message timestamp.
    pub timestamp: Timestamp,
    /// First time this timestamp was seen.
    pub inserted: bool,
    /// Whether the conversation is a group.
    pub is_group: bool,
}

/// What a receipt matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptOutcome {
    /// Conversation the receipt applied to.
    pub conversation: ContactId,
    /// Timestamps that were updated.
    pub matched: Vec<Timestamp>,
    /// Timestamps with no message in the conversation.
    pub missing: Vec<Timestamp>,
}

/// Directory plus conversations: the whole shared state of an engine.
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Known contacts and groups.
    pub directory: Directory,
    /// One conversation per contact.
    pub book: ConversationBook,
}

impl Model {
    /// Create a model over an existing directory.
    pub fn new(directory: Directory) -> Self {
        Self {
            directory,
            book: ConversationBook::new(),
        }
    }

    /// Fold in the echo of a message this account sent.
    pub fn apply_sent(&mut self, envelope: &Envelope) -> Option<Arrival> {
        let sent = envelope.sent_message()?;
        let target = sent.target()?;
        let is_group = match &sent.group_info {
            Some(group) => {
                let name = group.name.as_deref().unwrap_or_default();
                self.directory.resolve_group(&target, name);
                true
            }
            None => {
                self.directory.resolve(&target);
                false
            }
        };

        let message = Message::outgoing(sent.timestamp, sent.text()).with_attachments(
            Attachment::convert_all(sent.attachments(), sent.timestamp, true),
        );
        let upsert = self.book.entry(&target).upsert(message);

        Some(Arrival {
            conversation: target,
            sender: None,
            timestamp: sent.timestamp,
            inserted: upsert == Upsert::Inserted,
            is_group,
        })
    }

    /// Fold in a message from a peer, directly or inside a group.
    ///
    /// Group messages are stored in the group's conversation; the sender is
    /// recorded on the message only.
    pub fn apply_received(&mut self, envelope: &Envelope) -> Option<Arrival> {
        let data = envelope.data_message.as_ref()?;
        let source = envelope.source_id();
        if source.is_empty() {
            return None;
        }
        let sender: Contact = self.directory.resolve(&source).0.clone();

        let (conversation, is_group) = match &data.group_info {
            Some(group) => {
                let id = ContactId::new(group.group_id.as_str());
                let name = group.name.as_deref().unwrap_or_default();
                self.directory.resolve_group(&id, name);
                (id, true)
            }
            None => (source.clone(), false),
        };

        let message = Message::incoming(data.timestamp, data.text(), &sender).with_attachments(
            Attachment::convert_all(data.attachments(), data.timestamp, false),
        );
        let upsert = self.book.entry(&conversation).upsert(message);

        Some(Arrival {
            conversation,
            sender: Some(source),
            timestamp: data.timestamp,
            inserted: upsert == Upsert::Inserted,
            is_group,
        })
    }

    /// Fold in a delivery or read receipt.
    ///
    /// A read receipt implies delivery. Otherwise both flags are copied
    /// verbatim. The conversation is marked dirty even when nothing matched.
    pub fn apply_receipt(&mut self, envelope: &Envelope) -> Option<ReceiptOutcome> {
        let receipt = envelope.receipt_message.as_ref()?;
        let source = envelope.source_id();
        if source.is_empty() {
            return None;
        }
        self.directory.resolve(&source);
        let conversation = self.book.entry(&source);

        let mut outcome = ReceiptOutcome {
            conversation: source.clone(),
            matched: Vec::new(),
            missing: Vec::new(),
        };
        for &ts in &receipt.timestamps {
            match conversation.get_mut(ts) {
                Some(message) => {
                    if receipt.is_read {
                        message.is_delivered = true;
                        message.is_read = true;
                    } else {
                        message.is_delivered = receipt.is_delivery;
                        message.is_read = receipt.is_read;
                    }
                    outcome.matched.push(ts);
                }
                None => outcome.missing.push(ts),
            }
        }
        conversation.mark_dirty();
        Some(outcome)
    }

    /// Put a conversation loaded from storage in place.
    ///
    /// The restored conversation is caught up and clean.
    pub fn restore(&mut self, contact: &ContactId, messages: Vec<Message>) {
        let conversation = self.book.entry(contact);
        for message in messages {
            conversation.upsert(message);
        }
        conversation.caught_up();
        conversation.mark_clean();
    }

    /// Display label for a contact, falling back to the identifier.
    pub fn display_name(&self, id: &ContactId) -> String {
        self.directory
            .get(id)
            .map_or_else(|| id.to_string(), |c| c.to_string())
    }
}
