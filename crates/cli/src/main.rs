//! Clarion CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write a default config file
//! - `ask`      — Route one message through the pipeline
//! - `catalog`  — List personas, capability servers, and frameworks
//! - `doctor`   — Check configuration and server health

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "clarion",
    about = "Clarion — adaptive enhancement routing with transparent disclosure",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Use this config file instead of ~/.clarion/config.toml
    #[arg(short, long, global = true, env = "CLARION_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Ask a question and print the disclosed response
    Ask {
        /// The message (read from stdin when omitted)
        #[arg(short, long)]
        message: Option<String>,

        /// Opaque conversation reference forwarded to capability servers
        #[arg(long)]
        context: Option<String>,

        /// Print the full response envelope as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the persona, server, and framework catalog
    Catalog {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and capability server health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays parseable.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init { force } => commands::init::run(config, force).await?,
        Commands::Ask {
            message,
            context,
            json,
        } => commands::ask::run(config, message, context, json).await?,
        Commands::Catalog { json } => commands::catalog::run(config, json).await?,
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}
