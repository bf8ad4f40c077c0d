//! Orchestrator Configuration
//!
//! Handles loading and validating orchestrator configuration from
//! TOML files. Every field has a default so an empty file (or no file
//! at all) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::OrchestratorError;

/// Main configuration for the lifecycle orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Region the remote services run in
    #[serde(default = "default_region")]
    pub region: String,

    /// Base URL of the control plane API
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Directory deployment bundles are staged into
    #[serde(default = "default_deployments_dir")]
    pub deployments_dir: PathBuf,

    /// Version/alias selector used when invoking a runtime
    #[serde(default = "default_qualifier")]
    pub qualifier: String,

    /// Status polling settings
    #[serde(default)]
    pub poll: PollConfig,

    /// Identity service settings
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Status polling configuration for the deployer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between status checks
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Maximum seconds to wait for a terminal status
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

/// Identity service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Seconds to wait after attaching policy to a newly created
    /// identity, covering eventual-consistency propagation
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
}

// Default value functions
fn default_region() -> String {
    std::env::var("SKYHOOK_REGION").unwrap_or_else(|_| "us-east-1".to_string())
}

fn default_service_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_deployments_dir() -> PathBuf {
    PathBuf::from("./deployment")
}

fn default_qualifier() -> String {
    "DEFAULT".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_wait() -> u64 {
    600
}

fn default_settle() -> u64 {
    10
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// Number of status checks the deployer will make before giving up.
    pub fn max_checks(&self) -> u64 {
        (self.max_wait_secs / self.interval_secs.max(1)).max(1)
    }
}

impl IdentityConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OrchestratorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: OrchestratorConfig = toml::from_str(&content)
            .map_err(|e| OrchestratorError::Config(format!(
                "failed to parse config file {}: {}",
                path.display(),
                e
            )))?;

        Ok(config)
    }

    /// Create a configuration with every field defaulted.
    pub fn default_config() -> Self {
        Self {
            region: default_region(),
            service_url: default_service_url(),
            deployments_dir: default_deployments_dir(),
            qualifier: default_qualifier(),
            poll: PollConfig::default(),
            identity: IdentityConfig::default(),
        }
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), OrchestratorError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OrchestratorError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default_config();
        assert_eq!(config.service_url, "http://localhost:8080");
        assert_eq!(config.qualifier, "DEFAULT");
        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.poll.max_wait_secs, 600);
        assert_eq!(config.identity.settle_secs, 10);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml_content = r#"
            region = "eu-west-1"
        "#;

        let config: OrchestratorConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.deployments_dir, PathBuf::from("./deployment"));
        assert_eq!(config.poll.interval_secs, 10);
    }

    #[test]
    fn test_max_checks_bounds() {
        let poll = PollConfig {
            interval_secs: 10,
            max_wait_secs: 600,
        };
        assert_eq!(poll.max_checks(), 60);

        // A zero interval must not divide by zero or unbound the loop
        let poll = PollConfig {
            interval_secs: 0,
            max_wait_secs: 60,
        };
        assert_eq!(poll.max_checks(), 60);

        let poll = PollConfig {
            interval_secs: 10,
            max_wait_secs: 0,
        };
        assert_eq!(poll.max_checks(), 1);
    }
}
