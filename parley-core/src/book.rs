//! ConversationBook - one conversation per contact, created on first use.

use std::collections::HashMap;

use parley_types::ContactId;

use crate::Conversation;

/// Map from contact identifier to its conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationBook {
    conversations: HashMap<ContactId, Conversation>,
}

impl ConversationBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// The conversation for `contact`, created empty if missing.
    pub fn entry(&mut self, contact: &ContactId) -> &mut Conversation {
        self.conversations
            .entry(contact.clone())
            .or_insert_with(|| Conversation::new(contact.clone()))
    }

    /// Look up a conversation without creating it.
    pub fn get(&self, contact: &ContactId) -> Option<&Conversation> {
        self.conversations.get(contact)
    }

    /// Look up a conversation for modification without creating it.
    pub fn get_mut(&mut self, contact: &ContactId) -> Option<&mut Conversation> {
        self.conversations.get_mut(contact)
    }

    /// Number of conversations.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// All conversations, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    /// Conversations changed since they were last saved.
    pub fn dirty(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values().filter(|c| c.is_dirty())
    }

    /// Copy out every dirty conversation and mark it clean. Later changes
    /// mark it dirty again.
    pub fn take_dirty(&mut self) -> Vec<Conversation> {
        self.conversations
            .values_mut()
            .filter(|c| c.is_dirty())
            .map(|c| {
                c.mark_clean();
                c.clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn entry_creates_lazily() {
        let mut book = ConversationBook::new();
        let id = ContactId::new("+15550001111");
        assert!(book.get(&id).is_none());

        book.entry(&id).upsert(Message::outgoing(1, "hi"));
        book.entry(&id).upsert(Message::outgoing(2, "again"));

        assert_eq!(book.len(), 1);
        assert_eq!(book.get(&id).unwrap().len(), 2);
    }

    #[test]
    fn dirty_tracks_unsaved_conversations() {
        let mut book = ConversationBook::new();
        let a = ContactId::new("a");
        let b = ContactId::new("b");
        book.entry(&a).upsert(Message::outgoing(1, "x"));
        book.entry(&b).upsert(Message::outgoing(1, "y"));
        book.get_mut(&b).unwrap().mark_clean();

        let dirty: Vec<&ContactId> = book.dirty().map(|c| c.contact()).collect();
        assert_eq!(dirty, vec![&a]);
    }

    #[test]
    fn take_dirty_snapshots_and_cleans() {
        let mut book = ConversationBook::new();
        let id = ContactId::new("a");
        book.entry(&id).upsert(Message::outgoing(1, "x"));

        let taken = book.take_dirty();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].len(), 1);
        assert!(book.dirty().next().is_none());
        assert!(book.take_dirty().is_empty());

        // A change after the snapshot is dirty again and not in the copy
        book.entry(&id).upsert(Message::outgoing(2, "y"));
        assert_eq!(taken[0].len(), 1);
        assert_eq!(book.take_dirty()[0].len(), 2);
    }
}
