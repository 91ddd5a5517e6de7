//! # parley
//!
//! Command-line front end for the parley synchronization engine.
//!
//! ## Commands
//!
//! - `send`: Send a message (with optional attachments)
//! - `receive`: Fetch pending envelopes and print them raw
//! - `contacts`: List contacts and groups
//! - `conv`: Print a saved conversation
//! - `daemon`: Keep the relay running and print messages as they arrive
//! - `config`: Show the effective configuration
//! - `version`: Show parley and relay versions
//!
//! ## Example
//!
//! ```bash
//! # Point parley at your account
//! echo 'user_number = "+15550000000"' > ~/.config/parley/config.toml
//!
//! # Send a message
//! parley send Alice "on my way"
//!
//! # Stay online until Ctrl-C
//! parley daemon
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{config as show_config, contacts, conv, daemon, receive, send, version};
use config::{CliConfig, DefaultDirs};

/// Terminal client for signal-cli.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Account phone number, overriding the config file
    #[arg(long, short, global = true)]
    user: Option<String>,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a message
    Send {
        /// Contact number, group id, alias, or name
        to: String,

        /// Message text
        message: String,

        /// Attach a file (repeatable)
        #[arg(long, short)]
        attach: Vec<PathBuf>,
    },

    /// Fetch pending envelopes and print them raw
    Receive {
        /// Keep the relay running and print envelopes as they arrive
        #[arg(long, short)]
        follow: bool,
    },

    /// List contacts and groups
    Contacts,

    /// Print a conversation
    Conv {
        /// Contact number, group id, alias, or name
        contact: String,

        /// Replay relay output from this file instead of the saved log
        #[arg(long)]
        mock: Option<PathBuf>,
    },

    /// Keep the relay running and print messages as they arrive
    Daemon,

    /// Show the effective configuration
    Config,

    /// Show parley and relay versions
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path().context("Could not determine home directory")?,
    };
    let mut settings = CliConfig::load_or_default(&config_path)?;
    if let Some(user) = cli.user {
        settings.user_number = user;
    }
    let dirs = DefaultDirs::detect().context("Could not determine home directory")?;
    settings.resolve_paths(&dirs);

    match cli.command {
        Commands::Send {
            to,
            message,
            attach,
        } => {
            send::run(settings.engine_config(&dirs)?, &to, &message, &attach).await?;
        }
        Commands::Receive { follow } => {
            receive::run(settings.engine_config(&dirs)?, follow).await?;
        }
        Commands::Contacts => {
            contacts::run(settings.engine_config(&dirs)?).await?;
        }
        Commands::Conv { contact, mock } => {
            conv::run(settings.engine_config(&dirs)?, &contact, mock.as_deref()).await?;
        }
        Commands::Daemon => {
            daemon::run(settings.engine_config(&dirs)?).await?;
        }
        Commands::Config => {
            show_config::run(&config_path, &settings)?;
        }
        Commands::Version => {
            version::run(&settings).await?;
        }
    }

    Ok(())
}

/// Log to stderr; stdout is for command output.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
