//! Show the effective configuration.

use anyhow::Result;
use std::path::Path;

use crate::config::CliConfig;

/// Run the config command.
pub fn run(path: &Path, config: &CliConfig) -> Result<()> {
    let state = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("# {}{}", path.display(), state);
    print!("{}", config.to_toml()?);
    Ok(())
}
