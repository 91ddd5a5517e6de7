//! Contacts and the contact directory.
//!
//! The [`Directory`] owns every [`Contact`] for the lifetime of the engine.
//! Everything else refers to contacts by [`ContactId`] and resolves through
//! the directory, so a message never holds a contact by value.
//!
//! Peers and groups share one namespace: a phone number and a base64 group id
//! never collide.

use std::collections::HashMap;
use std::fmt;

use parley_types::{ContactId, UserData};

/// A peer or a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Phone number or group id.
    pub id: ContactId,
    /// Name from the relay's listing (may be empty).
    pub name: String,
    /// User-configured alias, shown instead of the name.
    pub alias: Option<String>,
    /// User-configured highlight color.
    pub color: Option<String>,
    /// Inbox position used for ordering.
    pub index: i64,
    /// Whether this contact is a group.
    pub is_group: bool,
}

impl Contact {
    /// A peer known only by its identifier.
    pub fn new(id: impl Into<ContactId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            alias: None,
            color: None,
            index: 0,
            is_group: false,
        }
    }

    /// A group with the given display name.
    pub fn group(id: impl Into<ContactId>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_group: true,
            ..Self::new(id)
        }
    }

    /// Set the name (builder).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the inbox index (builder).
    pub fn with_index(mut self, index: i64) -> Self {
        self.index = index;
        self
    }

    /// Short label for message senders: the name, or the identifier when
    /// there is no name.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    /// Apply alias and color from user configuration, keyed by contact name.
    pub fn configure(&mut self, options: &DirectoryOptions) {
        self.alias = options.aliases.get(&self.name).cloned();
        self.color = options.colors.get(&self.name).cloned();
    }
}

/// Display precedence is alias, then name, then identifier. Groups shown by
/// name get a `#` marker.
impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(alias) = self.alias.as_deref().filter(|a| !a.is_empty()) {
            return f.write_str(alias);
        }
        if !self.name.is_empty() {
            if self.is_group {
                return write!(f, "#{}", self.name);
            }
            return f.write_str(&self.name);
        }
        write!(f, "{}", self.id)
    }
}

/// User preferences applied while building the directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryOptions {
    /// Phone number of the account the relay runs as.
    pub self_number: Option<ContactId>,
    /// Name to show for the account's own contact.
    pub self_name: Option<String>,
    /// Aliases keyed by contact name.
    pub aliases: HashMap<String, String>,
    /// Colors keyed by contact name.
    pub colors: HashMap<String, String>,
}

/// Map from identifier to contact, with sorted views.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    contacts: HashMap<ContactId, Contact>,
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the directory from the relay's account listing.
    ///
    /// Peers without an inbox position are skipped. Groups that are blocked
    /// or archived are skipped; the rest are indexed after the highest peer
    /// index, in listing order.
    pub fn from_listing(data: &UserData, options: &DirectoryOptions) -> Self {
        let mut directory = Self::new();
        let mut highest: i64 = 0;

        for listed in data.contacts() {
            let Some(position) = listed.inbox_position else {
                continue;
            };
            let mut contact = Contact::new(listed.number.as_str())
                .with_name(listed.name.clone().unwrap_or_default())
                .with_index(position);
            contact.configure(options);
            directory.insert(contact);
            highest = highest.max(position);
        }

        for listed in data.groups() {
            if listed.blocked || listed.archived {
                continue;
            }
            highest += 1;
            let mut group = Contact::group(
                listed.group_id.as_str(),
                listed.name.clone().unwrap_or_default(),
            )
            .with_index(highest);
            group.alias = options.aliases.get(&group.name).cloned();
            directory.insert(group);
        }

        if let (Some(number), Some(name)) = (&options.self_number, &options.self_name) {
            if let Some(me) = directory.contacts.get_mut(number) {
                me.name = name.clone();
            }
        }

        directory
    }

    /// Insert or replace a contact.
    pub fn insert(&mut self, contact: Contact) {
        self.contacts.insert(contact.id.clone(), contact);
    }

    /// Look up a contact.
    pub fn get(&self, id: &ContactId) -> Option<&Contact> {
        self.contacts.get(id)
    }

    /// Look up a contact for modification.
    pub fn get_mut(&mut self, id: &ContactId) -> Option<&mut Contact> {
        self.contacts.get_mut(id)
    }

    /// Resolve a peer, creating a bare contact if it is unknown.
    ///
    /// Returns the contact and whether it was created.
    pub fn resolve(&mut self, id: &ContactId) -> (&Contact, bool) {
        let created = !self.contacts.contains_key(id);
        let contact: &Contact = self
            .contacts
            .entry(id.clone())
            .or_insert_with(|| Contact::new(id.clone()));
        (contact, created)
    }

    /// Resolve a group, creating it with `name` if it is unknown.
    pub fn resolve_group(&mut self, id: &ContactId, name: &str) -> (&Contact, bool) {
        let created = !self.contacts.contains_key(id);
        let contact: &Contact = self
            .contacts
            .entry(id.clone())
            .or_insert_with(|| Contact::group(id.clone(), name));
        (contact, created)
    }

    /// Find the first contact whose name matches exactly.
    pub fn find_by_name(&self, name: &str) -> Option<&Contact> {
        self.contacts.values().find(|c| c.name == name)
    }

    /// Number of contacts (peers and groups).
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// All contacts, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    /// Contacts sorted by name.
    pub fn sorted_by_name(&self) -> Vec<&Contact> {
        let mut list: Vec<&Contact> = self.iter().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// Contacts sorted by identifier.
    pub fn sorted_by_number(&self) -> Vec<&Contact> {
        let mut list: Vec<&Contact> = self.iter().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Contacts sorted by inbox index.
    pub fn sorted_by_index(&self) -> Vec<&Contact> {
        let mut list: Vec<&Contact> = self.iter().collect();
        list.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::{ContactListing, ContactStore, GroupListing, GroupStore};

    fn listing() -> UserData {
        UserData {
            contact_store: ContactStore {
                contacts: vec![
                    ContactListing {
                        number: "+15550001111".into(),
                        name: Some("Bob".into()),
                        inbox_position: Some(2),
                        ..Default::default()
                    },
                    ContactListing {
                        number: "+15550002222".into(),
                        name: Some("Alice".into()),
                        inbox_position: Some(7),
                        ..Default::default()
                    },
                    ContactListing {
                        number: "+15550003333".into(),
                        name: Some("Never Talked".into()),
                        inbox_position: None,
                        ..Default::default()
                    },
                    ContactListing {
                        number: "+15550000000".into(),
                        name: Some("".into()),
                        inbox_position: Some(0),
                        ..Default::default()
                    },
                ],
            },
            group_store: GroupStore {
                groups: vec![
                    GroupListing {
                        group_id: "R1JQ".into(),
                        name: Some("Climbing".into()),
                        ..Default::default()
                    },
                    GroupListing {
                        group_id: "T0xE".into(),
                        name: Some("Old".into()),
                        archived: true,
                        ..Default::default()
                    },
                    GroupListing {
                        group_id: "QkxL".into(),
                        name: Some("Spam".into()),
                        blocked: true,
                        ..Default::default()
                    },
                ],
            },
        }
    }

    #[test]
    fn display_prefers_alias_then_name_then_id() {
        let mut c = Contact::new("+15550001111");
        assert_eq!(c.to_string(), "+15550001111");

        c.name = "Bob".into();
        assert_eq!(c.to_string(), "Bob");

        c.alias = Some("Bobby".into());
        assert_eq!(c.to_string(), "Bobby");
    }

    #[test]
    fn group_display_has_marker() {
        let g = Contact::group("R1JQ", "Climbing");
        assert_eq!(g.to_string(), "#Climbing");
    }

    #[test]
    fn label_falls_back_to_id() {
        assert_eq!(Contact::new("+1555").label(), "+1555");
        assert_eq!(Contact::new("+1555").with_name("Eve").label(), "Eve");
    }

    #[test]
    fn from_listing_applies_bootstrap_rules() {
        let dir = Directory::from_listing(&listing(), &DirectoryOptions::default());

        // Two peers with positions, the self contact, and one live group
        assert_eq!(dir.len(), 4);
        assert!(dir.get(&ContactId::new("+15550003333")).is_none());
        assert!(dir.get(&ContactId::new("T0xE")).is_none());
        assert!(dir.get(&ContactId::new("QkxL")).is_none());

        let group = dir.get(&ContactId::new("R1JQ")).unwrap();
        assert!(group.is_group);
        assert_eq!(group.index, 8);
    }

    #[test]
    fn from_listing_applies_aliases_colors_and_self_name() {
        let mut options = DirectoryOptions {
            self_number: Some(ContactId::new("+15550000000")),
            self_name: Some("me".into()),
            ..Default::default()
        };
        options.aliases.insert("Bob".into(), "Bobby".into());
        options.colors.insert("Bob".into(), "red".into());
        options.aliases.insert("Climbing".into(), "Rocks".into());

        let dir = Directory::from_listing(&listing(), &options);

        let bob = dir.get(&ContactId::new("+15550001111")).unwrap();
        assert_eq!(bob.to_string(), "Bobby");
        assert_eq!(bob.color.as_deref(), Some("red"));
        assert_eq!(dir.get(&ContactId::new("R1JQ")).unwrap().to_string(), "Rocks");
        assert_eq!(dir.get(&ContactId::new("+15550000000")).unwrap().name, "me");
    }

    #[test]
    fn resolve_creates_once() {
        let mut dir = Directory::new();
        let id = ContactId::new("+15559999999");

        let (_, created) = dir.resolve(&id);
        assert!(created);
        let (contact, created) = dir.resolve(&id);
        assert!(!created);
        assert!(!contact.is_group);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn resolve_group_keeps_existing_name() {
        let mut dir = Directory::new();
        let id = ContactId::new("R1JQ");
        dir.resolve_group(&id, "Climbing");
        let (group, created) = dir.resolve_group(&id, "Renamed");
        assert!(!created);
        assert_eq!(group.name, "Climbing");
    }

    #[test]
    fn sorted_views() {
        let dir = Directory::from_listing(&listing(), &DirectoryOptions::default());

        let by_name: Vec<&str> = dir.sorted_by_name().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(by_name, vec!["", "Alice", "Bob", "Climbing"]);

        let by_index: Vec<i64> = dir.sorted_by_index().iter().map(|c| c.index).collect();
        assert_eq!(by_index, vec![0, 2, 7, 8]);

        let by_number: Vec<&str> = dir
            .sorted_by_number()
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(by_number[0], "+15550000000");
    }

    #[test]
    fn find_by_name() {
        let dir = Directory::from_listing(&listing(), &DirectoryOptions::default());
        assert_eq!(
            dir.find_by_name("Alice").map(|c| c.id.as_str()),
            Some("+15550002222")
        );
        assert!(dir.find_by_name("Nobody").is_none());
    }
}
