//! Runs command handlers
//!
//! Handles listing active runs and cancelling them.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use hookship_client::DeployerClient;
use hookship_core::dto::run::ActiveRun;

use crate::config::Config;

/// Runs subcommands
#[derive(Subcommand)]
pub enum RunsCommands {
    /// List active and pending runs
    List,
    /// Cancel the active run for a repository
    Cancel {
        /// Repository name
        name: String,
    },
}

/// Handle runs commands
///
/// # Arguments
/// * `command` - The runs command to execute
/// * `config` - The CLI configuration
pub async fn handle_runs_command(command: RunsCommands, config: &Config) -> Result<()> {
    let client = DeployerClient::new(&config.deployer_url);

    match command {
        RunsCommands::List => list_runs(&client).await,
        RunsCommands::Cancel { name } => cancel_run(&client, &name).await,
    }
}

async fn list_runs(client: &DeployerClient) -> Result<()> {
    let runs = client.list_runs().await?;

    if runs.is_empty() {
        println!("{}", "No active runs.".yellow());
    } else {
        println!("{}", format!("Found {} active run(s):", runs.len()).bold());
        println!();
        for run in runs {
            print_run_summary(&run);
        }
    }

    Ok(())
}

async fn cancel_run(client: &DeployerClient, name: &str) -> Result<()> {
    match client.cancel_run(name).await {
        Ok(()) => {
            println!(
                "{} Cancellation requested for {}; it stops before its next stage",
                "✓".green(),
                name.bold()
            );
            Ok(())
        }
        Err(e) if e.is_client_error() => {
            println!("{}", format!("No active run for {}.", name).yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_run_summary(run: &ActiveRun) {
    println!("  {} {}", "▸".cyan(), run.repository.bold());
    println!("    State:    {}", colorize_state(&run.state));
    if let Some(id) = run.run_id {
        println!("    Run:      {}", id.to_string().dimmed());
    }
    if let Some(started_at) = run.started_at {
        println!(
            "    Started:  {}",
            started_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
    }
    if run.pending {
        println!("    Pending:  {}", "another trigger is queued".yellow());
    }
    println!();
}

fn colorize_state(state: &str) -> ColoredString {
    if state.starts_with("Failed") {
        state.red()
    } else if state == "Succeeded" {
        state.green()
    } else {
        state.cyan()
    }
}
