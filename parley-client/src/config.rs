//! Engine configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parley_core::DirectoryOptions;
use parley_types::ContactId;

use crate::relay::RelayCommand;

/// Default seconds between relay restarts.
pub const DEFAULT_RESTART_COOLDOWN_SECS: u64 = 5;

/// Configuration for [`crate::Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Account phone number the relay runs as.
    pub user_number: String,
    /// Name shown for the account's own contact.
    pub user_name: String,
    /// Load and save conversations under `conversation_dir`.
    pub save_messages: bool,
    /// Relay program.
    pub relay_binary: String,
    /// Relay data directory (attachments, avatars, account data).
    pub relay_data_dir: PathBuf,
    /// Where conversation files live.
    pub conversation_dir: PathBuf,
    /// Wait between relay restarts.
    pub restart_cooldown: Duration,
    /// Send through the running daemon.
    pub use_dbus: bool,
    /// Show desktop notifications for new messages.
    pub desktop_notifications: bool,
    /// Include message text in notifications.
    pub notification_show_message: bool,
    /// Include the sender's avatar in notifications.
    pub notification_show_avatar: bool,
    /// Ring the terminal bell for new messages.
    pub terminal_bell: bool,
    /// Aliases keyed by contact name.
    pub contact_aliases: HashMap<String, String>,
    /// Colors keyed by contact name.
    pub contact_colors: HashMap<String, String>,
}

impl EngineConfig {
    /// Configuration for `user_number` with defaults for everything else.
    pub fn new(user_number: impl Into<String>) -> Self {
        Self {
            user_number: user_number.into(),
            user_name: "self".to_string(),
            save_messages: false,
            relay_binary: "signal-cli".to_string(),
            relay_data_dir: PathBuf::from("signal-cli"),
            conversation_dir: PathBuf::from("conversations"),
            restart_cooldown: Duration::from_secs(DEFAULT_RESTART_COOLDOWN_SECS),
            use_dbus: true,
            desktop_notifications: false,
            notification_show_message: true,
            notification_show_avatar: false,
            terminal_bell: false,
            contact_aliases: HashMap::new(),
            contact_colors: HashMap::new(),
        }
    }

    /// Set the own-contact name.
    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    /// Enable persistence into `dir`.
    pub fn with_saved_messages(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_messages = true;
        self.conversation_dir = dir.into();
        self
    }

    /// Set the relay data directory.
    pub fn with_relay_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.relay_data_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the relay program.
    pub fn with_relay_binary(mut self, binary: impl Into<String>) -> Self {
        self.relay_binary = binary.into();
        self
    }

    /// Set the restart cooldown.
    pub fn with_restart_cooldown(mut self, cooldown: Duration) -> Self {
        self.restart_cooldown = cooldown;
        self
    }

    /// Add an alias for the contact named `name`.
    pub fn with_alias(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.contact_aliases.insert(name.into(), alias.into());
        self
    }

    /// Add a color for the contact named `name`.
    pub fn with_color(mut self, name: impl Into<String>, color: impl Into<String>) -> Self {
        self.contact_colors.insert(name.into(), color.into());
        self
    }

    /// The relay's account listing for this user.
    pub fn listing_path(&self) -> PathBuf {
        self.relay_data_dir.join("data").join(&self.user_number)
    }

    /// How to invoke the relay.
    pub fn relay_command(&self) -> RelayCommand {
        RelayCommand::new(self.user_number.as_str())
            .with_binary(self.relay_binary.as_str())
            .with_dbus(self.use_dbus)
    }

    /// Options for building the contact directory.
    pub fn directory_options(&self) -> DirectoryOptions {
        DirectoryOptions {
            self_number: Some(ContactId::new(self.user_number.as_str())),
            self_name: Some(self.user_name.clone()),
            aliases: self.contact_aliases.clone(),
            colors: self.contact_colors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EngineConfig::new("+15550000000");
        assert_eq!(c.user_name, "self");
        assert_eq!(c.relay_binary, "signal-cli");
        assert_eq!(c.restart_cooldown, Duration::from_secs(5));
        assert!(c.use_dbus);
        assert!(!c.save_messages);
    }

    #[test]
    fn builder_sets_fields() {
        let c = EngineConfig::new("+15550000000")
            .with_user_name("me")
            .with_saved_messages("/tmp/convs")
            .with_relay_data_dir("/srv/signal")
            .with_alias("Robert", "Bob")
            .with_color("Robert", "red");

        assert!(c.save_messages);
        assert_eq!(c.conversation_dir, PathBuf::from("/tmp/convs"));
        assert_eq!(
            c.listing_path(),
            PathBuf::from("/srv/signal/data/+15550000000")
        );

        let opts = c.directory_options();
        assert_eq!(opts.self_name.as_deref(), Some("me"));
        assert_eq!(opts.aliases.get("Robert").map(String::as_str), Some("Bob"));
        assert_eq!(opts.colors.get("Robert").map(String::as_str), Some("red"));
    }

    #[test]
    fn relay_command_follows_config() {
        let mut c = EngineConfig::new("+15550000000").with_relay_binary("/opt/signal-cli");
        c.use_dbus = false;
        let cmd = c.relay_command();
        assert_eq!(cmd.binary, "/opt/signal-cli");
        assert_eq!(cmd.user, "+15550000000");
        assert!(!cmd.use_dbus);
    }
}
