//! Hookship CLI
//!
//! Command-line interface for the deployer and the update authority.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "hookship")]
#[command(about = "Hookship push-to-deploy CLI", long_about = None)]
struct Cli {
    /// Deployer URL
    #[arg(
        long,
        env = "HOOKSHIP_DEPLOYER_URL",
        default_value = "http://localhost:8080"
    )]
    deployer_url: String,

    /// Update authority URL (only needed by `deploy`)
    #[arg(long, env = "HOOKSHIP_UPDATE_URL")]
    update_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        deployer_url: cli.deployer_url,
        update_url: cli.update_url,
    };

    handle_command(cli.command, &config).await
}
