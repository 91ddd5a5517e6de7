//! Keep the relay running and print messages as they arrive.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parley_client::{EngineConfig, Notification, Notifier, ProcessRelay};
use std::io::Write;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

use super::{format_message, open_engine};

/// Desktop notifications through `notify-send`, plus the terminal bell.
#[derive(Debug, Default)]
pub struct DesktopNotifier;

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, notification: Notification) {
        if notification.bell {
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(b"\x07").and_then(|()| stderr.flush());
        }
        if !notification.desktop {
            return;
        }

        let mut command = Command::new("notify-send");
        command.arg(&notification.title).arg(&notification.body);
        if let Some(avatar) = &notification.avatar {
            command.arg("-i").arg(avatar);
        }
        match command.status().await {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(%status, "notify-send failed"),
            Err(e) => warn!(error = %e, "notify-send unavailable"),
        }
    }
}

/// Run the daemon command.
pub async fn run(config: EngineConfig) -> Result<()> {
    let relay = ProcessRelay::new(config.relay_command());
    let engine = open_engine(config, relay, Arc::new(DesktopNotifier)).await;

    engine.on_change(|conversation| {
        if let Some(message) = conversation.last_message() {
            println!("{} │ {}", conversation.contact(), format_message(message));
        }
    });
    engine.on_error(|e| eprintln!("relay error: {e}"));

    engine.receive_forever().await;
    info!("online, Ctrl-C to quit");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("shutting down");
    engine.quit().await;
    Ok(())
}
