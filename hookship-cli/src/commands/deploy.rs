//! Deploy command handler
//!
//! Hands an already published image to the update authority. This is the
//! operator path for a run that pushed its image but failed to deploy it.

use anyhow::{Context, Result, anyhow};
use colored::*;
use hookship_client::UpdateClient;
use hookship_core::domain::deploy::DeployInstruction;
use hookship_core::domain::image::ImageRef;
use std::time::Duration;

use crate::config::Config;

const DEPLOY_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn handle_deploy(service: &str, image: &str, config: &Config) -> Result<()> {
    let update_url = config
        .update_url
        .as_deref()
        .ok_or_else(|| anyhow!("--update-url (or HOOKSHIP_UPDATE_URL) is required for deploy"))?;

    let image: ImageRef = image.parse().map_err(|e: String| anyhow!(e))?;
    let instruction = DeployInstruction::new(service, image);

    let client = UpdateClient::new(update_url);
    let response = client
        .deploy(&instruction, DEPLOY_TIMEOUT)
        .await
        .with_context(|| format!("Failed to deploy {}", instruction.image()))?;

    if !response.accepted {
        return Err(anyhow!(
            "Update authority rejected {} for {}: {}",
            instruction.image(),
            service,
            response.detail
        ));
    }

    println!(
        "{} {} now runs {}",
        "✓".green(),
        service.bold(),
        instruction.image().to_string().cyan()
    );
    if !response.detail.is_empty() {
        println!("  {}", response.detail.dimmed());
    }

    Ok(())
}
