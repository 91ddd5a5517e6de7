//! Show parley and relay versions.

use anyhow::Result;
use parley_client::{ProcessRelay, Relay, RelayCommand};

use crate::config::CliConfig;

/// Run the version command.
pub async fn run(config: &CliConfig) -> Result<()> {
    println!("parley {}", env!("CARGO_PKG_VERSION"));

    let relay = ProcessRelay::new(
        RelayCommand::new(config.user_number.as_str()).with_binary(config.relay_binary.as_str()),
    );
    match relay.version().await {
        Ok(version) => println!("{} {}", config.relay_binary, version),
        Err(e) => println!("{}: unavailable ({})", config.relay_binary, e),
    }
    Ok(())
}
