use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use std::sync::Arc;

use skyhook_orchestrator::{
    HttpDeploymentClient, HttpIdentityClient, OrchestratorConfig, ResourceManager, ServiceClient,
};

/// Delete a deployed runtime and, optionally, its execution identity.
pub async fn run(
    config: OrchestratorConfig,
    agent_name: &str,
    delete_identity: bool,
) -> Result<()> {
    println!("{} Deleting runtime {}", "→".blue().bold(), agent_name);
    if delete_identity {
        println!("  The execution identity will also be deleted");
    }

    if !Confirm::new()
        .with_prompt("Are you sure you want to delete this runtime?")
        .default(false)
        .interact()?
    {
        println!("{}", "Deletion cancelled".yellow());
        return Ok(());
    }

    let api = ServiceClient::new(&config.service_url)?;
    let manager = ResourceManager::new(
        Arc::new(HttpIdentityClient::new(api.clone())),
        Arc::new(HttpDeploymentClient::new(api)),
        agent_name,
    );

    let report = manager.delete(delete_identity).await;

    for warning in &report.warnings {
        println!("{} {}", "!".yellow().bold(), warning.yellow());
    }

    println!("{} Cleanup completed", "✓".green().bold());
    Ok(())
}
