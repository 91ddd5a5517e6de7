//! Configuration loading for the parley CLI.
//!
//! Configuration is loaded from a TOML file (default:
//! `<platform config dir>/parley/config.toml`). Every field has a default, so
//! a file containing only `user_number` is complete.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parley_client::EngineConfig;

/// Root configuration for the parley CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Account phone number.
    #[serde(default)]
    pub user_number: String,
    /// Name shown for your own contact (default: "self").
    #[serde(default = "default_user_name")]
    pub user_name: String,
    /// Keep conversations on disk between runs (default: true).
    #[serde(default = "default_save_messages")]
    pub save_messages: bool,
    /// Relay program (default: signal-cli).
    #[serde(default = "default_relay_binary")]
    pub relay_binary: String,
    /// Relay data directory (default: `<data dir>/signal-cli`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_data_dir: Option<PathBuf>,
    /// Where conversation files live (default: `<parley data dir>/conversations`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_dir: Option<PathBuf>,
    /// Seconds between relay restarts (default: 5).
    #[serde(default = "default_restart_cooldown_secs")]
    pub restart_cooldown_secs: u64,
    /// Send through the running daemon's D-Bus interface (default: true).
    #[serde(default = "default_use_dbus")]
    pub use_dbus: bool,
    /// Desktop notifications for new messages (default: false).
    #[serde(default)]
    pub desktop_notifications: bool,
    /// Show message text in notifications (default: true).
    #[serde(default = "default_notification_show_message")]
    pub notification_show_message: bool,
    /// Show the sender's avatar in notifications (default: false).
    #[serde(default)]
    pub notification_show_avatar: bool,
    /// Ring the terminal bell for new messages (default: false).
    #[serde(default)]
    pub terminal_bell: bool,
    /// Aliases keyed by contact name.
    #[serde(default)]
    pub contact_aliases: HashMap<String, String>,
    /// Colors keyed by contact name.
    #[serde(default)]
    pub contact_colors: HashMap<String, String>,
}

// Default value functions
fn default_user_name() -> String {
    "self".to_string()
}

fn default_save_messages() -> bool {
    true
}

fn default_relay_binary() -> String {
    "signal-cli".to_string()
}

fn default_restart_cooldown_secs() -> u64 {
    parley_client::DEFAULT_RESTART_COOLDOWN_SECS
}

fn default_use_dbus() -> bool {
    true
}

fn default_notification_show_message() -> bool {
    true
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            user_number: String::new(),
            user_name: default_user_name(),
            save_messages: default_save_messages(),
            relay_binary: default_relay_binary(),
            relay_data_dir: None,
            conversation_dir: None,
            restart_cooldown_secs: default_restart_cooldown_secs(),
            use_dbus: default_use_dbus(),
            desktop_notifications: false,
            notification_show_message: default_notification_show_message(),
            notification_show_avatar: false,
            terminal_bell: false,
            contact_aliases: HashMap::new(),
            contact_colors: HashMap::new(),
        }
    }
}

/// Platform directories used when the config leaves a path unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultDirs {
    /// Default relay data directory.
    pub relay_data_dir: PathBuf,
    /// Default conversation directory.
    pub conversation_dir: PathBuf,
}

impl DefaultDirs {
    /// Directories for the current user.
    pub fn detect() -> Option<Self> {
        let base = directories::BaseDirs::new()?;
        let project = directories::ProjectDirs::from("chat", "parley", "parley")?;
        Some(Self {
            relay_data_dir: base.data_dir().join("signal-cli"),
            conversation_dir: project.data_dir().join("conversations"),
        })
    }
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("chat", "parley", "parley")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl CliConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load from `path`, or use defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }

    /// Fill unset paths from `dirs`.
    pub fn resolve_paths(&mut self, dirs: &DefaultDirs) {
        if self.relay_data_dir.is_none() {
            self.relay_data_dir = Some(dirs.relay_data_dir.clone());
        }
        if self.conversation_dir.is_none() {
            self.conversation_dir = Some(dirs.conversation_dir.clone());
        }
    }

    /// Engine configuration, with unset paths taken from `dirs`.
    pub fn engine_config(&self, dirs: &DefaultDirs) -> Result<EngineConfig, ConfigError> {
        if self.user_number.trim().is_empty() {
            return Err(ConfigError::MissingUser);
        }
        let mut config = EngineConfig::new(self.user_number.trim())
            .with_user_name(self.user_name.as_str())
            .with_relay_binary(self.relay_binary.as_str())
            .with_relay_data_dir(
                self.relay_data_dir
                    .as_deref()
                    .unwrap_or(&dirs.relay_data_dir),
            )
            .with_restart_cooldown(Duration::from_secs(self.restart_cooldown_secs));
        config.save_messages = self.save_messages;
        config.conversation_dir = self
            .conversation_dir
            .clone()
            .unwrap_or_else(|| dirs.conversation_dir.clone());
        config.use_dbus = self.use_dbus;
        config.desktop_notifications = self.desktop_notifications;
        config.notification_show_message = self.notification_show_message;
        config.notification_show_avatar = self.notification_show_avatar;
        config.terminal_bell = self.terminal_bell;
        config.contact_aliases = self.contact_aliases.clone();
        config.contact_colors = self.contact_colors.clone();
        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// Failed to render configuration.
    #[error("failed to render config: {0}")]
    SerializeError(toml::ser::Error),
    /// No account configured.
    #[error("user_number is not set; add it to the config file or pass --user")]
    MissingUser,
}
