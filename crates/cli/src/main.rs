//! ThreadScout CLI: the main entry point.
//!
//! Commands:
//! - `answer`: Answer the Slack message behind a permalink
//! - `check` : Verify credentials are configured
//! - `init`  : Print a default configuration file

use clap::{Parser, Subcommand};

mod commands;
mod events;

#[derive(Parser)]
#[command(
    name = "threadscout",
    about = "ThreadScout: answers Slack questions from your team's tools",
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
    /// Answer the question at a Slack message permalink
    Answer {
        /// e.g. https://acme.slack.com/archives/C017U6EBKQS/p1759736875617839
        message_url: String,
    },

    /// Check that API credentials are configured
    Check,

    /// Print a default config.toml
    Init,
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
        .init();

    match cli.command {
        Commands::Answer { message_url } => commands::answer::run(&message_url).await?,
        Commands::Check => commands::check::run()?,
        Commands::Init => commands::init::run(),
    }

    Ok(())
}
