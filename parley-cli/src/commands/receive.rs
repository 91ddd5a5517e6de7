//! Fetch pending envelopes and print them raw.

use anyhow::{Context, Result};
use parley_client::{EngineConfig, ProcessRelay, Relay, Supervisor};
use parley_core::{Dispatcher, EventKind};
use parley_types::WireMessage;
use std::sync::Arc;
use tracing::info;

/// Run the receive command.
pub async fn run(config: EngineConfig, follow: bool) -> Result<()> {
    let mut dispatcher = Dispatcher::new();
    dispatcher.on(EventKind::Any, |envelope| {
        println!("{}", WireMessage::from(envelope.clone()).to_line()?);
        Ok(())
    });
    dispatcher.on_error(|e| eprintln!("error: {e}"));

    let relay = Arc::new(ProcessRelay::new(config.relay_command()));
    let supervisor = Arc::new(Supervisor::new(
        relay.clone(),
        Arc::new(dispatcher),
        config.restart_cooldown,
    ));

    if !follow {
        let lines = relay.receive().await.context("Receive failed")?;
        for line in &lines {
            supervisor.process_line(line)?;
        }
        info!(count = lines.len(), "received");
        return Ok(());
    }

    let task = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.forever().await }
    });
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("interrupted, stopping relay");
    supervisor.stop();
    supervisor.close().await?;
    task.await?;
    Ok(())
}
