//! The relay's per-account data file, used to bootstrap the contact directory.
//!
//! signal-cli keeps one JSON document per registered account under
//! `<relay data dir>/data/<number>`. Only the contact and group stores are
//! read; everything else in that file is ignored.

use serde::de::{self, Unexpected};
use serde::{Deserialize, Serialize};

use crate::WireError;

/// Account data as written by the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    /// Known peers
    #[serde(default)]
    pub contact_store: ContactStore,
    /// Known groups
    #[serde(default)]
    pub group_store: GroupStore,
}

/// Wrapper around the contact list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactStore {
    /// All contacts
    #[serde(default)]
    pub contacts: Vec<ContactListing>,
}

/// Wrapper around the group list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStore {
    /// All groups
    #[serde(default)]
    pub groups: Vec<GroupListing>,
}

/// One peer in the relay's contact store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactListing {
    /// Phone number
    pub number: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Relay-side color name
    #[serde(default)]
    pub color: Option<String>,
    /// Blocked by this account
    #[serde(default)]
    pub blocked: bool,
    /// Archived by this account
    #[serde(default)]
    pub archived: bool,
    /// Position in the inbox; contacts without one never had a conversation
    #[serde(default)]
    pub inbox_position: Option<i64>,
}

/// One group in the relay's group store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupListing {
    /// Base64 group identifier
    pub group_id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Relay-side color name
    #[serde(default)]
    pub color: Option<String>,
    /// Blocked by this account
    #[serde(default)]
    pub blocked: bool,
    /// Archived by this account
    #[serde(default)]
    pub archived: bool,
    /// Position in the inbox
    #[serde(default)]
    pub inbox_position: Option<i64>,
}

fn unexpected(value: &serde_json::Value) -> Unexpected<'_> {
    match value {
        serde_json::Value::Null => Unexpected::Unit,
        serde_json::Value::Bool(b) => Unexpected::Bool(*b),
        serde_json::Value::Number(_) => Unexpected::Other("number"),
        serde_json::Value::String(s) => Unexpected::Str(s),
        serde_json::Value::Array(_) => Unexpected::Seq,
        serde_json::Value::Object(_) => Unexpected::Map,
    }
}

impl UserData {
    /// Parse the relay's account data file.
    ///
    /// The document must be a JSON object; every store in it is optional.
    pub fn from_json(bytes: &[u8]) -> Result<Self, WireError> {
        let value: serde_json::Value = serde_json::from_slice(bytes).map_err(WireError::Listing)?;
        if !value.is_object() {
            return Err(WireError::Listing(de::Error::invalid_type(
                unexpected(&value),
                &"an account data object",
            )));
        }
        serde_json::from_value(value).map_err(WireError::Listing)
    }

    /// Peers in the listing.
    pub fn contacts(&self) -> &[ContactListing] {
        &self.contact_store.contacts
    }

    /// Groups in the listing.
    pub fn groups(&self) -> &[GroupListing] {
        &self.group_store.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relay_user_data() {
        let json = r#"{
            "username": "+15550000000",
            "contactStore": {"contacts": [
                {"name": "Alice", "number": "+15550001111", "color": "blue",
                 "messageExpirationTime": 0, "blocked": false, "inboxPosition": 3, "archived": false},
                {"name": "", "number": "+15550002222", "blocked": false, "inboxPosition": null}
            ]},
            "groupStore": {"groups": [
                {"groupId": "R1JQ", "name": "Climbing", "members": [], "blocked": false,
                 "inboxPosition": 0, "archived": true}
            ]}
        }"#;
        let data = UserData::from_json(json.as_bytes()).unwrap();
        assert_eq!(data.contacts().len(), 2);
        assert_eq!(data.contacts()[0].inbox_position, Some(3));
        assert_eq!(data.contacts()[1].inbox_position, None);
        assert!(data.groups()[0].archived);
    }

    #[test]
    fn empty_document_is_empty_listing() {
        let data = UserData::from_json(b"{}").unwrap();
        assert!(data.contacts().is_empty());
        assert!(data.groups().is_empty());
    }

    #[test]
    fn invalid_document_is_listing_error() {
        assert!(matches!(
            UserData::from_json(b"[]"),
            Err(WireError::Listing(_))
        ));
        assert!(matches!(
            UserData::from_json(b"null"),
            Err(WireError::Listing(_))
        ));
        assert!(matches!(
            UserData::from_json(b"{\"contactStore\""),
            Err(WireError::Listing(_))
        ));
    }

    #[test]
    fn non_object_error_names_what_was_found() {
        let err = UserData::from_json(b"[]").unwrap_err();
        assert!(err.to_string().contains("sequence"), "{err}");
    }
}
