//! Envoy CLI entry point.
//!
//! Commands:
//! - `chat`: Negotiate with a service agent over stdin/stdout
//! - `profile`: Run retrieval only and print the owner's summaries
//! - `config`: Print a starter configuration file
//! - `doctor`: Diagnose configuration, personal data and provider

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::SessionArgs;

#[derive(Parser)]
#[command(
    name = "envoy",
    about = "Envoy — a personal AI that negotiates with service agents for you",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.envoy/config.toml
    #[arg(short, long, global = true, env = "ENVOY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with a service agent; its messages are read from stdin
    Chat {
        #[command(flatten)]
        session: SessionArgs,

        /// Name the personal AI uses in the conversation (default: <owner>_ai)
        #[arg(long)]
        agent_name: Option<String>,
    },

    /// Build and print the owner's profile for a service agent
    Profile {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Print the default configuration
    Config,

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Chat {
            session,
            agent_name,
        } => commands::chat::run(config_path, session, agent_name).await?,
        Commands::Profile { session } => commands::profile::run(config_path, session).await?,
        Commands::Config => commands::config_cmd::run(),
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
