//! Send a message.

use anyhow::{Context, Result};
use parley_client::{EngineConfig, NoopNotifier, ProcessRelay};
use parley_types::ContactId;
use std::path::PathBuf;
use std::sync::Arc;

use super::{format_timestamp, open_engine};

/// Run the send command.
pub async fn run(config: EngineConfig, to: &str, message: &str, attach: &[PathBuf]) -> Result<()> {
    for path in attach {
        tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot attach {}", path.display()))?;
    }

    let relay = ProcessRelay::new(config.relay_command());
    let engine = open_engine(config, relay, Arc::new(NoopNotifier)).await;

    let target = engine
        .find_contact(to)
        .map(|c| c.id)
        .unwrap_or_else(|| ContactId::new(to));
    for path in attach {
        engine.add_attachment(&target, path);
    }

    let result = engine.send(&target, message).await;
    engine.quit().await;
    let timestamp = result.context("Send failed")?;

    println!("Sent to {} at {}", target, format_timestamp(timestamp));
    println!("  Timestamp: {}", timestamp);
    if !attach.is_empty() {
        println!("  Attachments: {}", attach.len());
    }
    Ok(())
}
