//! Relay abstraction for parley.
//!
//! The relay is an external program that does the actual secure message
//! transport. parley talks to it in two ways:
//! - a long-running daemon whose stdout streams one JSON envelope per line
//! - short one-off invocations for sending, polling, and version queries
//!
//! # Design
//!
//! The trait is async and process-oriented:
//! - `start()` launches the daemon and hands back its output stream
//! - `finish()` reaps the daemon once its stream has closed
//! - `interrupt()` asks the daemon to exit gracefully
//! - `send()` / `send_group()` deliver one message and return its timestamp
//!
//! # Example
//!
//! ```ignore
//! let relay = MockRelay::new();
//! relay.queue_line(r#"{"envelope":{"source":"+15550001111"}}"#);
//! let stream = relay.start().await?;
//! ```

mod mock;
mod process;

pub use mock::{MockRelay, SentRecord};
pub use process::{ProcessRelay, RelayCommand};

use std::path::PathBuf;

use async_trait::async_trait;
use parley_types::{Timestamp, WireError};
use thiserror::Error;
use tokio::io::AsyncBufRead;

/// Line-oriented output of a running daemon.
pub type RelayStream = Box<dyn AsyncBufRead + Send + Unpin>;

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The relay binary could not be launched.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to launch.
        program: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The relay ran but reported failure.
    #[error("relay exited with {status}: {stderr}")]
    Exited {
        /// Exit status as reported by the OS.
        status: std::process::ExitStatus,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The relay refused a request.
    #[error("relay command failed: {0}")]
    Failed(String),

    /// The relay printed something other than what was expected.
    #[error("unexpected relay output: {0}")]
    InvalidOutput(#[from] WireError),

    /// I/O error talking to the relay.
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Relay trait for the external secure-messaging process.
///
/// Implementations handle process management (real subprocess, mock).
#[async_trait]
pub trait Relay: Send + Sync {
    /// Launch the streaming daemon and return its output.
    async fn start(&self) -> Result<RelayStream, RelayError>;

    /// Wait for the daemon to exit after its output has closed.
    ///
    /// A no-op when no daemon is running.
    async fn finish(&self) -> Result<(), RelayError>;

    /// Ask the running daemon to exit. Does not wait for it.
    async fn interrupt(&self) -> Result<(), RelayError>;

    /// Fetch outstanding envelopes once, without a daemon.
    async fn receive(&self) -> Result<Vec<String>, RelayError>;

    /// Send to a peer. Returns the relay-assigned timestamp.
    async fn send(
        &self,
        destination: &str,
        text: &str,
        attachments: &[PathBuf],
    ) -> Result<Timestamp, RelayError>;

    /// Send to a group. Returns the relay-assigned timestamp.
    async fn send_group(
        &self,
        group_id: &str,
        text: &str,
        attachments: &[PathBuf],
    ) -> Result<Timestamp, RelayError>;

    /// Relay version string.
    async fn version(&self) -> Result<String, RelayError>;
}

/// Peer identifiers are phone numbers in international form.
pub(crate) fn normalize_number(destination: &str) -> String {
    if destination.starts_with('+') {
        destination.to_string()
    } else {
        format!("+{destination}")
    }
}
