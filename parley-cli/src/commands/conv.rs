//! Print a conversation.

use anyhow::{bail, Context, Result};
use parley_client::{Engine, EngineConfig, MockRelay, NoopNotifier, ProcessRelay, Relay};
use parley_core::Conversation;
use std::path::Path;
use std::sync::Arc;

use super::{format_message, open_engine};

/// Run the conv command.
///
/// With `mock`, the file's lines are replayed as relay output into a
/// throwaway engine and nothing is saved.
pub async fn run(config: EngineConfig, contact: &str, mock: Option<&Path>) -> Result<()> {
    match mock {
        Some(path) => {
            let lines = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let relay = MockRelay::new();
            for line in lines.lines() {
                relay.queue_line(line);
            }
            let mut config = config;
            config.save_messages = false;
            let engine = open_engine(config, relay, Arc::new(NoopNotifier)).await;
            engine.receive().await.context("Replay failed")?;
            print_conversation(&engine, contact)
        }
        None => {
            let relay = ProcessRelay::new(config.relay_command());
            let engine = open_engine(config, relay, Arc::new(NoopNotifier)).await;
            print_conversation(&engine, contact)
        }
    }
}

fn print_conversation<R: Relay + 'static>(engine: &Engine<R>, query: &str) -> Result<()> {
    let Some(contact) = engine.find_contact(query) else {
        bail!("Unknown contact: {query}");
    };
    let conversation = engine
        .conversation(&contact.id)
        .unwrap_or_else(|| Conversation::new(contact.id.clone()));

    println!("=== {} ({}) ===", contact, contact.id);
    if conversation.is_empty() {
        println!("No messages.");
        return Ok(());
    }
    for message in conversation.messages() {
        println!("{}", format_message(message));
        for attachment in &message.attachments {
            println!(
                "    📎 {}",
                attachment.path(&engine.config().relay_data_dir).display()
            );
        }
    }
    Ok(())
}
