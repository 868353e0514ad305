//! Trigger command handler

use anyhow::{Context, Result};
use colored::*;
use hookship_client::DeployerClient;
use hookship_core::dto::run::Admission;
use hookship_core::dto::webhook::PushEvent;

use crate::config::Config;

/// Send a push event and report how the deployer scheduled it
pub async fn handle_trigger(name: &str, url: &str, config: &Config) -> Result<()> {
    let client = DeployerClient::new(&config.deployer_url);
    let event = PushEvent::new(name, url);

    // Catch bad names before they reach the deployer
    event.repository_ref()?;

    let accepted = match client.trigger(&event).await {
        Ok(accepted) => accepted,
        Err(e) if e.is_conflict() => {
            println!(
                "{}",
                format!("A run for {} is already in progress; try again later.", name).yellow()
            );
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to trigger {}", name)),
    };

    let admission = match accepted.admission {
        Admission::Started => "started".green(),
        Admission::Queued => "queued behind the active run".yellow(),
        Admission::Coalesced => "merged into the pending run".yellow(),
    };

    println!(
        "{} Trigger for {} {}",
        "✓".green(),
        accepted.repository.bold(),
        admission
    );
    println!("  {}", "Follow it with: hookship runs list".dimmed());

    Ok(())
}
