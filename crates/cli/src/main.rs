//! Gift registry CLI - database migrations and sample data.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! gr-cli migrate
//!
//! # Insert sample products
//! gr-cli seed --count 12
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Insert sample products for local development

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gr-cli")]
#[command(author, version, about = "Gift registry CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert sample products
    Seed {
        /// Number of products to create
        #[arg(short, long, default_value_t = 8)]
        count: usize,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { count } => commands::seed::products(count).await?,
    }
    Ok(())
}
