use anyhow::{Context, Result};
use colored::Colorize;
use futures_util::StreamExt;
use std::io::Write;
use std::sync::Arc;

use skyhook_orchestrator::{
    HttpInvocationClient, Invoker, OrchestratorConfig, ResourceRecord, RuntimeHandle,
    RuntimeStatus, ServiceClient,
};

/// Invoke a deployed agent, either batched or streaming.
pub async fn run(
    config: OrchestratorConfig,
    agent_name: &str,
    message: &str,
    stream: bool,
) -> Result<()> {
    let bundle_dir = config.deployments_dir.join(agent_name);
    let record = ResourceRecord::load(&bundle_dir)
        .with_context(|| format!("No resource record for '{}'; run `skyhook prepare` first", agent_name))?;
    let runtime_id = record
        .runtime_id
        .context("Agent has not been deployed yet; run `skyhook deploy` first")?;

    let handle = RuntimeHandle {
        runtime_id,
        status: RuntimeStatus::Ready,
    };

    let api = ServiceClient::new(&config.service_url)?;
    let invoker = Invoker::new(Arc::new(HttpInvocationClient::new(api)), &config.qualifier);

    println!("{} Invoking {}...", "→".blue().bold(), agent_name);

    if stream {
        println!();
        let mut chunks = invoker.invoke_streaming(&handle, message).await;
        while let Some(chunk) = chunks.next().await {
            print!("{}", chunk);
            std::io::stdout().flush()?;
        }
        println!();
    } else {
        let response = invoker.invoke(&handle, message).await;
        println!();
        println!("{}", "Agent Response:".bold());
        println!("{}", response);
    }

    Ok(())
}
