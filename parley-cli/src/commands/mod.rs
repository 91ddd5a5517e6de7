//! CLI command implementations.

pub mod config;
pub mod contacts;
pub mod conv;
pub mod daemon;
pub mod receive;
pub mod send;
pub mod version;

use std::sync::Arc;

use chrono::{Local, TimeZone};
use parley_client::{load_listing, Engine, EngineConfig, Notifier, Relay};
use parley_core::Message;
use parley_types::{Timestamp, UserData};
use tracing::warn;

/// Open an engine over `relay`, bootstrapping from the relay's account
/// listing when it can be read.
pub async fn open_engine<R: Relay + 'static>(
    config: EngineConfig,
    relay: R,
    notifier: Arc<dyn Notifier>,
) -> Engine<R> {
    let path = config.listing_path();
    let listing = match load_listing(&path).await {
        Ok(listing) => listing,
        Err(e) => {
            warn!(error = %e, "no contact listing, starting with an empty directory");
            UserData::default()
        }
    };
    Engine::open(config, relay, &listing, notifier).await
}

/// Local wall-clock rendering of a relay timestamp.
pub fn format_timestamp(ts: Timestamp) -> String {
    match Local.timestamp_millis_opt(ts).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => ts.to_string(),
    }
}

/// One conversation line: time, sender, status, text.
pub fn format_message(message: &Message) -> String {
    let status = match (message.from_self, message.is_delivered, message.is_read) {
        (false, _, _) => "",
        (true, _, true) => " ✓✓",
        (true, true, false) => " ✓",
        (true, false, false) => " ·",
    };
    format!(
        "[{}] {}{}: {}",
        format_timestamp(message.timestamp),
        message.from,
        status,
        message.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Contact;

    #[test]
    fn timestamp_renders_date_and_minutes() {
        let rendered = format_timestamp(1_600_000_000_000);
        assert_eq!(rendered.len(), "2020-09-13 12:26".len());
        assert!(rendered.starts_with("2020-09-1"));
    }

    #[test]
    fn message_status_markers() {
        let mut mine = Message::outgoing(1_600_000_000_000, "hi");
        assert!(format_message(&mine).ends_with(" ·: hi"));
        mine.is_delivered = true;
        assert!(format_message(&mine).ends_with(" ✓: hi"));
        mine.is_read = true;
        assert!(format_message(&mine).ends_with(" ✓✓: hi"));

        let bob = Contact::new("+15550001111").with_name("Bob");
        let theirs = Message::incoming(1_600_000_000_000, "yo", &bob);
        assert!(format_message(&theirs).ends_with("] Bob: yo"));
    }
}
