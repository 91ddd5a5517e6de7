//! List contacts and groups.

use anyhow::Result;
use parley_client::{EngineConfig, NoopNotifier, ProcessRelay};
use std::sync::Arc;

use super::open_engine;

/// Run the contacts command.
pub async fn run(config: EngineConfig) -> Result<()> {
    let relay = ProcessRelay::new(config.relay_command());
    let engine = open_engine(config, relay, Arc::new(NoopNotifier)).await;

    let mut contacts = engine.contacts();
    contacts.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    if contacts.is_empty() {
        println!("No contacts.");
        return Ok(());
    }
    for contact in &contacts {
        let unread = engine
            .conversation(&contact.id)
            .is_some_and(|c| c.has_unread());
        println!(
            "{:<24} {}{}",
            contact.to_string(),
            contact.id,
            if unread { "  *" } else { "" }
        );
    }
    Ok(())
}
