//! CLI Configuration
//!
//! Resolves the orchestrator configuration from ~/.skyhook/config.toml
//! (or an explicit --config path) and applies command-line overrides.

use anyhow::{Context, Result};
use std::path::PathBuf;

use skyhook_orchestrator::OrchestratorConfig;

/// Get the default config file path (~/.skyhook/config.toml).
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".skyhook").join("config.toml"))
}

/// Resolve the effective configuration. A missing default file yields
/// the built-in defaults; an explicitly given path must exist.
pub fn resolve(path: Option<PathBuf>, region: Option<String>) -> Result<OrchestratorConfig> {
    let path = match path {
        Some(p) => Some(p),
        None => {
            let p = default_path()?;
            p.exists().then_some(p)
        }
    };

    let mut config = match path {
        Some(p) => OrchestratorConfig::load(&p)
            .with_context(|| format!("Failed to load config from {}", p.display()))?,
        None => OrchestratorConfig::default_config(),
    };

    if let Some(region) = region {
        config.region = region;
    }

    Ok(config)
}
