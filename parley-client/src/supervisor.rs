//! Process supervisor: keeps the relay daemon running and feeds its output
//! to the dispatcher.
//!
//! ```text
//! forever ─┬─► daemon ─► relay.start() ─► lines ─► Dispatcher
//!          │     │
//!          │     └─ stream closed / fatal error
//!          └── cooldown ◄┘
//! ```
//!
//! `forever()` only returns after [`Supervisor::stop`]. Every other exit of
//! the daemon, clean or not, is followed by a cooldown and a restart.

use std::sync::Arc;
use std::time::Duration;

use parley_core::{DispatchError, Dispatcher};
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::relay::{Relay, RelayError};

/// Why a daemon run ended early.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The relay failed to start or exited abnormally.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// An observer rejected an envelope.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The daemon's output could not be read.
    #[error("failed reading relay output: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs the relay daemon and restarts it when it stops.
pub struct Supervisor<R: Relay> {
    relay: Arc<R>,
    dispatcher: Arc<Dispatcher>,
    cooldown: Duration,
    stop_tx: watch::Sender<bool>,
}

impl<R: Relay> Supervisor<R> {
    /// Create a supervisor; nothing runs until `daemon()` or `forever()`.
    pub fn new(relay: Arc<R>, dispatcher: Arc<Dispatcher>, cooldown: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            relay,
            dispatcher,
            cooldown,
            stop_tx,
        }
    }

    /// The supervised relay.
    pub fn relay(&self) -> &Arc<R> {
        &self.relay
    }

    /// The dispatcher relay output is fed to.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Run the daemon once, until its output closes, a stop is requested,
    /// or an observer fails.
    pub async fn daemon(&self) -> Result<(), SupervisorError> {
        let mut stop = self.stop_tx.subscribe();
        if *stop.borrow_and_update() {
            return Ok(());
        }

        let stream = self.relay.start().await?;
        info!("relay daemon running");
        let mut lines = stream.lines();

        loop {
            let next = tokio::select! {
                next = lines.next_line() => next,
                _ = stop.changed() => {
                    debug!("stop requested, interrupting relay");
                    self.shutdown().await;
                    return Ok(());
                }
            };
            match next {
                Ok(Some(line)) => {
                    if let Err(e) = self.process_line(&line) {
                        self.shutdown().await;
                        return Err(e.into());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    self.shutdown().await;
                    return Err(e.into());
                }
            }
        }

        info!("relay output closed");
        self.relay.finish().await?;
        Ok(())
    }

    /// Run the daemon forever, restarting it after a cooldown.
    ///
    /// Errors go to the dispatcher's error observers. Returns only after
    /// [`Supervisor::stop`].
    pub async fn forever(&self) {
        let mut stop = self.stop_tx.subscribe();
        loop {
            if *stop.borrow_and_update() {
                break;
            }
            if let Err(e) = self.daemon().await {
                warn!(error = %e, "relay daemon failed");
                self.dispatcher.publish_error(&e);
            }
            if *stop.borrow_and_update() {
                break;
            }

            info!(cooldown = ?self.cooldown, "restarting relay after cooldown");
            tokio::select! {
                _ = tokio::time::sleep(self.cooldown) => {}
                _ = stop.changed() => break,
            }
        }
        info!("relay supervisor stopped");
    }

    /// Send a graceful interrupt to the running daemon. Does not wait.
    pub async fn close(&self) -> Result<(), RelayError> {
        self.relay.interrupt().await
    }

    /// Ask `daemon()` and `forever()` to return.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Feed one line to the dispatcher.
    ///
    /// Malformed lines are logged and skipped; only observer failures are
    /// returned.
    pub fn process_line(&self, line: &str) -> Result<(), DispatchError> {
        debug!(line, "relay line");
        match self.dispatcher.process_line(line.as_bytes()) {
            Ok(_) => Ok(()),
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "skipping relay line");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn shutdown(&self) {
        if let Err(e) = self.relay.interrupt().await {
            warn!(error = %e, "failed to interrupt relay");
        }
        if let Err(e) = self.relay.finish().await {
            debug!(error = %e, "relay exit after interrupt");
        }
    }
}
