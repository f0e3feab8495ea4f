//! Stratum CLI — offline diagnostics for the engine.
//!
//! Commands:
//! - `check-config`   — Resolve a config file for one mode and print it
//! - `default-config` — Print the default configuration
//! - `scan`           — Run the safety validator and sanitizer on some text

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "stratum",
    about = "Stratum — layered response pipeline and ReAct reasoning engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a config file and print the snapshot as JSON
    CheckConfig {
        /// Path to the TOML config file
        file: PathBuf,

        /// Mode to resolve (defaults to the file's default_mode)
        #[arg(short, long, env = "STRATUM_MODE")]
        mode: Option<String>,
    },

    /// Print the default configuration as TOML
    DefaultConfig,

    /// Scan text for sensitive data and unsafe content
    Scan {
        /// Text to scan (reads stdin when omitted)
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::CheckConfig { file, mode } => commands::config_cmd::check(&file, mode.as_deref()).await?,
        Commands::DefaultConfig => commands::config_cmd::show_default().await?,
        Commands::Scan { text } => commands::scan::run(text).await?,
    }

    Ok(())
}
