use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use skyhook_orchestrator::{HttpIdentityClient, OrchestratorConfig, Preparer, ServiceClient};

/// Prepare an agent for deployment: stage the bundle and ensure its
/// execution identity.
pub async fn run(config: OrchestratorConfig, source_dir: &Path) -> Result<()> {
    println!(
        "{} Preparing agent from {}...",
        "→".blue().bold(),
        source_dir.display()
    );

    let api = ServiceClient::new(&config.service_url)?;
    let identity = Arc::new(HttpIdentityClient::new(api));
    let preparer = Preparer::new(identity, config);

    let prepared = preparer.prepare(source_dir).await?;

    println!(
        "{} Prepared bundle for {}",
        "✓".green().bold(),
        prepared.agent_name
    );
    println!(
        "  Bundle:   {}",
        prepared.bundle_dir.display().to_string().cyan()
    );
    println!("  Identity: {}", prepared.identity.arn.cyan());
    println!();
    println!(
        "  Next step: {} deploy {}",
        "skyhook".dimmed(),
        prepared.bundle_dir.display()
    );

    Ok(())
}
