//! Envelope payloads emitted by the relay.
//!
//! Each optional payload is modeled as its own struct; which ones are present
//! on an [`Envelope`](crate::Envelope) decides how the line is classified.

use serde::{Deserialize, Serialize};

use crate::{ContactId, Timestamp};

/// An inbound message from a peer or a group member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    /// Sender-assigned timestamp, the message identifier
    #[serde(default)]
    pub timestamp: Timestamp,
    /// Message body (absent for attachment-only messages)
    #[serde(default)]
    pub message: Option<String>,
    /// Disappearing-message timer
    #[serde(default)]
    pub expires_in_seconds: i64,
    /// Attached files
    #[serde(default)]
    pub attachments: Option<Vec<WireAttachment>>,
    /// Present when the message was sent to a group
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
}

impl DataMessage {
    /// Message body, empty when absent.
    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// Attachments, empty when absent.
    pub fn attachments(&self) -> &[WireAttachment] {
        self.attachments.as_deref().unwrap_or_default()
    }
}

/// Messages synchronized from another linked device of the same account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    /// A message this account sent, echoed back by the relay
    #[serde(default)]
    pub sent_message: Option<SentMessage>,
}

/// A message sent by this account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    /// Timestamp assigned at send time, the message identifier
    #[serde(default)]
    pub timestamp: Timestamp,
    /// Message body
    #[serde(default)]
    pub message: Option<String>,
    /// Disappearing-message timer
    #[serde(default)]
    pub expires_in_seconds: i64,
    /// Attached files
    #[serde(default)]
    pub attachments: Option<Vec<WireAttachment>>,
    /// Present when the message was sent to a group
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
    /// Peer phone number (absent for group sends)
    #[serde(default)]
    pub destination: Option<String>,
}

impl SentMessage {
    /// Message body, empty when absent.
    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// Attachments, empty when absent.
    pub fn attachments(&self) -> &[WireAttachment] {
        self.attachments.as_deref().unwrap_or_default()
    }

    /// Conversation this message belongs to: the group if there is one,
    /// otherwise the destination peer.
    pub fn target(&self) -> Option<ContactId> {
        if let Some(group) = &self.group_info {
            return Some(ContactId::new(group.group_id.clone()));
        }
        self.destination
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(ContactId::from)
    }
}

/// Delivery or read receipt for messages this account sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptMessage {
    /// When the receipt was generated
    #[serde(default)]
    pub when: Timestamp,
    /// The messages were delivered
    #[serde(default)]
    pub is_delivery: bool,
    /// The messages were read
    #[serde(default)]
    pub is_read: bool,
    /// Timestamps of the messages this receipt covers
    #[serde(default)]
    pub timestamps: Vec<Timestamp>,
}

/// Group metadata attached to group messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    /// Base64 group identifier
    pub group_id: String,
    /// Member phone numbers, when the relay includes them
    #[serde(default)]
    pub members: Option<Vec<String>>,
    /// Group display name, when the relay includes it
    #[serde(default)]
    pub name: Option<String>,
    /// Group message type (`DELIVER`, `UPDATE`, ...)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// An attachment as described on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAttachment {
    /// MIME type
    #[serde(default)]
    pub content_type: String,
    /// Original file name, if the sender supplied one
    #[serde(default)]
    pub filename: Option<String>,
    /// Relay-side attachment id (file name in the relay's attachment store)
    #[serde(default)]
    pub id: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_message_targets_group_over_destination() {
        let sent = SentMessage {
            destination: Some("+15550001111".into()),
            group_info: Some(GroupInfo {
                group_id: "Z3JvdXA=".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(sent.target(), Some(ContactId::new("Z3JvdXA=")));
    }

    #[test]
    fn sent_message_without_destination_has_no_target() {
        let sent = SentMessage {
            destination: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(sent.target(), None);
    }

    #[test]
    fn data_message_null_fields_decode() {
        let json = r#"{"timestamp":5,"message":null,"attachments":null,"groupInfo":null}"#;
        let data: DataMessage = serde_json::from_str(json).unwrap();
        assert_eq!(data.text(), "");
        assert!(data.attachments().is_empty());
        assert!(data.group_info.is_none());
    }

    #[test]
    fn attachment_decodes_camel_case() {
        let json = r#"{"contentType":"image/png","filename":"cat.png","id":"abc123","size":42}"#;
        let att: WireAttachment = serde_json::from_str(json).unwrap();
        assert_eq!(att.content_type, "image/png");
        assert_eq!(att.id.as_deref(), Some("abc123"));
        assert_eq!(att.size, 42);
    }
}
