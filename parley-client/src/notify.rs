//! Notifier seam: new-message alerts handed to whatever presents them.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use parley_types::ContactId;

use crate::EngineConfig;

/// One new-message alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Conversation label (contact or group).
    pub title: String,
    /// Message text; empty when previews are disabled.
    pub body: String,
    /// Sender's avatar, when enabled and present on disk.
    pub avatar: Option<PathBuf>,
    /// Show a desktop notification.
    pub desktop: bool,
    /// Ring the terminal bell.
    pub bell: bool,
}

impl Notification {
    /// Build an alert for a new message, or `None` when every notification
    /// channel is disabled.
    pub fn prepare(
        config: &EngineConfig,
        title: impl Into<String>,
        sender: &ContactId,
        text: &str,
    ) -> Option<Self> {
        if !config.desktop_notifications && !config.terminal_bell {
            return None;
        }
        let body = if config.notification_show_message {
            text.to_string()
        } else {
            String::new()
        };
        let avatar = config
            .notification_show_avatar
            .then(|| avatar_path(&config.relay_data_dir, sender));
        Some(Self {
            title: title.into(),
            body,
            avatar,
            desktop: config.desktop_notifications,
            bell: config.terminal_bell,
        })
    }

    /// Drop the avatar if the file does not exist.
    pub async fn resolve_avatar(mut self) -> Self {
        if let Some(path) = &self.avatar {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                self.avatar = None;
            }
        }
        self
    }
}

/// Where the relay caches a contact's avatar.
pub fn avatar_path(relay_dir: &Path, contact: &ContactId) -> PathBuf {
    relay_dir
        .join("avatars")
        .join(format!("contact-{}", contact.as_str()))
}

/// Delivers notifications (desktop, terminal, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Present one notification. Failures are the notifier's to log.
    async fn notify(&self, notification: Notification);
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: Notification) {}
}

/// Keeps every notification for inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notification);
    }
}
