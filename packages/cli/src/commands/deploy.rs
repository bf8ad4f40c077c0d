use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use skyhook_orchestrator::{
    Deployer, DeploymentDescriptor, HttpDeploymentClient, OrchestratorConfig, ResourceRecord,
    ServiceClient,
};

/// Entrypoint file every bundle is expected to carry.
const ENTRYPOINT_FILE: &str = "invoke.py";

/// Dependency manifest shipped alongside the entrypoint.
const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Deploy a prepared bundle to the runtime service and wait for it to
/// become operational.
pub async fn run(config: OrchestratorConfig, bundle_dir: &Path) -> Result<()> {
    let mut record = ResourceRecord::load(bundle_dir)
        .context("No resource record in bundle; run `skyhook prepare` first")?;

    println!(
        "{} Deploying {} from {}...",
        "→".blue().bold(),
        record.agent_name,
        bundle_dir.display()
    );

    let descriptor = DeploymentDescriptor {
        agent_name: record.agent_name.clone(),
        bundle_dir: bundle_dir.to_path_buf(),
        identity_arn: record.identity_arn.clone(),
        entrypoint: bundle_dir.join(ENTRYPOINT_FILE),
        requirements_file: bundle_dir.join(REQUIREMENTS_FILE),
        region: config.region.clone(),
        protocol: "HTTP".to_string(),
    };

    let api = ServiceClient::new(&config.service_url)?;
    let client = Arc::new(HttpDeploymentClient::new(api));
    let mut deployer = Deployer::new(client, &config.poll);

    deployer.configure(&descriptor).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Launching runtime...");

    let handle = deployer.launch().await?;
    record.runtime_id = Some(handle.runtime_id.clone());
    record.save(bundle_dir)?;

    spinner.set_message("Waiting for runtime to be ready...");
    let handle = match deployer
        .await_ready_with(handle, |status| {
            spinner.set_message(format!("Current status: {}...", status))
        })
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    spinner.finish_with_message(format!(
        "{} Runtime {} is ready",
        "✓".green().bold(),
        handle.runtime_id
    ));
    println!();
    println!(
        "  Invoke it: {} invoke {} \"<message>\"",
        "skyhook".dimmed(),
        record.agent_name
    );

    Ok(())
}
