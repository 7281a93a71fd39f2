//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod fetch;
mod serve;

use clap::{Parser, Subcommand};

use crate::config::{Settings, SettingsArgs};

#[derive(Parser)]
#[command(name = "fetchgate")]
#[command(about = "Web-scraping gateway with headless rendering and fallback strategies")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Address to bind (e.g., 3000, 0.0.0.0, 127.0.0.1:8080)
        #[arg(default_value = "0.0.0.0:3000")]
        bind: String,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Fetch a single URL and print the result as JSON
    Fetch {
        /// URL to fetch
        url: String,
        /// Milliseconds to wait after the page loads
        #[arg(long, default_value = "0")]
        wait_after_load: u64,
        /// Navigation timeout in milliseconds
        #[arg(long, default_value = "15000")]
        timeout: u64,
        /// Extra request header as NAME:VALUE (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        #[command(flatten)]
        settings: SettingsArgs,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, settings } => {
            serve::cmd_serve(&Settings::from_args(&settings)?, &bind).await
        }
        Commands::Fetch {
            url,
            wait_after_load,
            timeout,
            headers,
            settings,
        } => {
            let settings = Settings::from_args(&settings)?;
            fetch::cmd_fetch(&settings, &url, wait_after_load, timeout, &headers).await
        }
    }
}
