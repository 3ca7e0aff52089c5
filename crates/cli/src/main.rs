//! RelayChat CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the web chat gateway
//! - `chat`: Run one turn in the terminal
//! - `doctor`: Check which credentials are configured

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "relaychat",
    about = "RelayChat: a web chat relay over a planner/executor agent pair",
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
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web chat gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message and print the conversation it triggers
    Chat {
        #[arg(short, long)]
        message: String,
    },

    /// Check configuration and credentials
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; the real environment still applies.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
