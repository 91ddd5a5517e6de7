//! Envelope - one decoded line of relay output.

use serde::{Deserialize, Serialize};

use crate::{
    ContactId, DataMessage, GroupInfo, ReceiptMessage, SentMessage, SyncMessage, Timestamp,
    WireError,
};

/// Top-level record on each relay output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// The event itself
    pub envelope: Envelope,
}

impl WireMessage {
    /// Decode one line of relay output.
    pub fn from_line(line: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(line).map_err(WireError::Decode)
    }

    /// Encode as a single JSON line (no trailing newline).
    pub fn to_line(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Encode)
    }
}

impl From<Envelope> for WireMessage {
    fn from(envelope: Envelope) -> Self {
        Self { envelope }
    }
}

/// An inbound or outbound event reported by the relay.
///
/// Payloads are discriminated by presence: a line may carry a data message,
/// a sync message, a receipt, or (rarely) more than one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Phone number of the originating account
    #[serde(default)]
    pub source: Option<String>,
    /// Server receive timestamp
    #[serde(default)]
    pub timestamp: Timestamp,
    /// Whether the relay flagged this as a receipt envelope
    #[serde(default)]
    pub is_receipt: bool,
    /// Device id of the originating account
    #[serde(default)]
    pub source_device: i64,
    /// Inbound message
    #[serde(default)]
    pub data_message: Option<DataMessage>,
    /// Linked-device synchronization
    #[serde(default)]
    pub sync_message: Option<SyncMessage>,
    /// Delivery/read receipt
    #[serde(default)]
    pub receipt_message: Option<ReceiptMessage>,
}

impl Envelope {
    /// Identifier of the originating account, empty when the relay omits it.
    pub fn source_id(&self) -> ContactId {
        ContactId::new(self.source.clone().unwrap_or_default())
    }

    /// The echoed sent message, if this envelope carries one.
    pub fn sent_message(&self) -> Option<&SentMessage> {
        self.sync_message.as_ref()?.sent_message.as_ref()
    }

    /// Group metadata of the inbound message, if it was a group message.
    pub fn group_info(&self) -> Option<&GroupInfo> {
        self.data_message.as_ref()?.group_info.as_ref()
    }

    /// Build the echo the relay emits after this account sends a message.
    pub fn sent(destination: &str, timestamp: Timestamp, text: &str) -> Self {
        Self {
            source: Some(String::new()),
            timestamp,
            source_device: 1,
            sync_message: Some(SyncMessage {
                sent_message: Some(SentMessage {
                    timestamp,
                    message: Some(text.to_string()),
                    destination: Some(destination.to_string()),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        }
    }

    /// Build an inbound peer message.
    pub fn received(source: &str, timestamp: Timestamp, text: &str) -> Self {
        Self {
            source: Some(source.to_string()),
            timestamp,
            source_device: 1,
            data_message: Some(DataMessage {
                timestamp,
                message: Some(text.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build a receipt covering `timestamps`.
    pub fn receipt(
        source: &str,
        when: Timestamp,
        is_delivery: bool,
        is_read: bool,
        timestamps: Vec<Timestamp>,
    ) -> Self {
        Self {
            source: Some(source.to_string()),
            timestamp: when,
            is_receipt: true,
            source_device: 1,
            receipt_message: Some(ReceiptMessage {
                when,
                is_delivery,
                is_read,
                timestamps,
            }),
            ..Default::default()
        }
    }

    /// Attach group metadata to the data message (builder for group traffic).
    pub fn in_group(mut self, group_id: &str, name: &str) -> Self {
        let info = GroupInfo {
            group_id: group_id.to_string(),
            name: Some(name.to_string()),
            kind: Some("DELIVER".to_string()),
            members: None,
        };
        if let Some(data) = self.data_message.as_mut() {
            data.group_info = Some(info.clone());
        }
        if let Some(sent) = self
            .sync_message
            .as_mut()
            .and_then(|s| s.sent_message.as_mut())
        {
            sent.group_info = Some(info);
            sent.destination = None;
        }
        self
    }
}
