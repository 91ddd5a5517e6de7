//! # parley-client
//!
//! Client library for the parley synchronization engine.
//!
//! This is the library front ends use to talk to the relay and read the
//! conversation state it produces.
//!
//! ## Features
//!
//! - **Relay Abstraction**: Pluggable relay process (signal-cli, mock)
//! - **Supervision**: The relay daemon restarts after every exit
//! - **Persistence**: One newline-delimited JSON file per conversation
//! - **Pure Model**: Uses parley-core for all reconciliation rules
//!
//! ## Example
//!
//! ```ignore
//! use parley_client::{load_listing, Engine, EngineConfig, NoopNotifier, ProcessRelay};
//!
//! let config = EngineConfig::new("+15550000000");
//! let listing = load_listing(&config.listing_path()).await?;
//! let relay = ProcessRelay::new(config.relay_command());
//! let engine = Engine::open(config, relay, &listing, Arc::new(NoopNotifier)).await;
//!
//! engine.receive_forever().await;
//! engine.send(&"+15550001111".into(), "hello").await?;
//! engine.quit().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod notify;
pub mod persist;
pub mod relay;
pub mod supervisor;

pub use config::{EngineConfig, DEFAULT_RESTART_COOLDOWN_SECS};
pub use engine::{load_listing, ChangeHook, Engine, EngineError, ErrorHook};
pub use notify::{avatar_path, NoopNotifier, Notification, Notifier, RecordingNotifier};
pub use persist::{ConversationStore, PersistError};
pub use relay::{
    MockRelay, ProcessRelay, Relay, RelayCommand, RelayError, RelayStream, SentRecord,
};
pub use supervisor::{Supervisor, SupervisorError};
