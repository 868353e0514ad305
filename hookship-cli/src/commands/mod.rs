//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod deploy;
mod runs;
mod trigger;

pub use runs::RunsCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Send a push event for a repository to the deployer
    Trigger {
        /// Repository name (also the service name)
        #[arg(long)]
        name: String,
        /// Source URL to fetch from
        #[arg(long)]
        url: String,
    },
    /// Inspect and cancel runs
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Send a deploy instruction straight to the update authority
    Deploy {
        /// Service to update
        #[arg(long)]
        service: String,
        /// Image reference (user/repository:tag)
        #[arg(long)]
        image: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Trigger { name, url } => trigger::handle_trigger(&name, &url, config).await,
        Commands::Runs { command } => runs::handle_runs_command(command, config).await,
        Commands::Deploy { service, image } => {
            deploy::handle_deploy(&service, &image, config).await
        }
    }
}
