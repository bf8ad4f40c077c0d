//! Resource Record
//!
//! The minimal persisted mapping from an agent name to its remote
//! resources, written into the bundle directory so teardown and
//! invocation can locate resources without re-running preparation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::OrchestratorError;

/// Persisted record of the resources created for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub agent_name: String,
    pub identity_name: String,
    pub identity_arn: String,
    /// Set once the runtime has been launched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub const FILE_NAME: &'static str = "resources.json";

    pub fn new(agent_name: &str, identity_name: &str, identity_arn: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            identity_name: identity_name.to_string(),
            identity_arn: identity_arn.to_string(),
            runtime_id: None,
            created_at: Utc::now(),
        }
    }

    /// Path of the record inside a bundle directory.
    pub fn path(bundle_dir: &Path) -> PathBuf {
        bundle_dir.join(Self::FILE_NAME)
    }

    /// Load the record from a bundle directory.
    pub fn load(bundle_dir: &Path) -> Result<Self, OrchestratorError> {
        let path = Self::path(bundle_dir);
        if !path.exists() {
            return Err(OrchestratorError::NotFound(path));
        }
        let content = std::fs::read_to_string(&path)?;
        let record: ResourceRecord = serde_json::from_str(&content)
            .map_err(|e| OrchestratorError::Config(format!(
                "failed to parse resource record {}: {}",
                path.display(),
                e
            )))?;
        Ok(record)
    }

    /// Save the record into a bundle directory.
    pub fn save(&self, bundle_dir: &Path) -> Result<(), OrchestratorError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| OrchestratorError::Config(format!(
                "failed to serialize resource record: {}",
                e
            )))?;
        std::fs::write(Self::path(bundle_dir), content)?;
        Ok(())
    }
}
