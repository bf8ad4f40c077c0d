//! Preparer
//!
//! Builds a deployable bundle from a source tree and ensures an
//! execution identity exists for it. The identity name is derived
//! deterministically from the agent name, so preparing twice reuses
//! the remote identity instead of creating a second one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::clients::IdentityClient;
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::policy;
use crate::record::ResourceRecord;

/// File extension of deployable code artifacts.
const ARTIFACT_EXTENSION: &str = "py";

/// Dependency manifest shipped alongside the artifacts.
const MANIFEST_FILE: &str = "requirements.txt";

/// Whether a source file belongs in the bundle. Only code artifacts
/// and the dependency manifest are staged; anything else in the
/// source tree (notes, stale resource records) stays out.
fn is_artifact(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == ARTIFACT_EXTENSION)
        || path.file_name().map_or(false, |name| name == MANIFEST_FILE)
}

/// A named credential granting a deployed workload permission to call
/// its dependent services.
#[derive(Debug, Clone)]
pub struct ExecutionIdentity {
    pub name: String,
    pub arn: String,
}

/// Result of a full preparation pass.
#[derive(Debug, Clone)]
pub struct PreparedBundle {
    pub agent_name: String,
    pub bundle_dir: PathBuf,
    pub identity: ExecutionIdentity,
}

/// Handles preparation of an agent for deployment.
pub struct Preparer<I: IdentityClient> {
    identity: Arc<I>,
    config: OrchestratorConfig,
}

impl<I: IdentityClient> Preparer<I> {
    pub fn new(identity: Arc<I>, config: OrchestratorConfig) -> Self {
        Self { identity, config }
    }

    /// Derive the agent name from the source directory (last component).
    pub fn agent_name(source_dir: &Path) -> String {
        source_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "agent".to_string())
    }

    /// Prepare an agent for deployment: stage the bundle, ensure its
    /// execution identity, and persist the resource record.
    pub async fn prepare(&self, source_dir: &Path) -> Result<PreparedBundle, OrchestratorError> {
        let agent_name = Self::agent_name(source_dir);
        let bundle_dir = self.stage_bundle(source_dir, &agent_name)?;
        let identity = self.ensure_identity(&agent_name).await?;

        let record = ResourceRecord::new(&agent_name, &identity.name, &identity.arn);
        record.save(&bundle_dir)?;

        info!(
            agent = %agent_name,
            bundle = %bundle_dir.display(),
            "Preparation complete"
        );

        Ok(PreparedBundle {
            agent_name,
            bundle_dir,
            identity,
        })
    }

    /// Copy the artifact files from the source tree into an isolated,
    /// agent-named bundle directory. Re-staging overwrites; the last
    /// prepare wins.
    pub fn stage_bundle(
        &self,
        source_dir: &Path,
        agent_name: &str,
    ) -> Result<PathBuf, OrchestratorError> {
        if !source_dir.exists() {
            return Err(OrchestratorError::NotFound(source_dir.to_path_buf()));
        }

        let target_dir = self.config.deployments_dir.join(agent_name);
        std::fs::create_dir_all(&target_dir)?;

        info!(
            source = %source_dir.display(),
            target = %target_dir.display(),
            "Staging bundle"
        );

        for entry in std::fs::read_dir(source_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && is_artifact(&path) {
                let dest = target_dir.join(entry.file_name());
                std::fs::copy(&path, &dest)?;
                debug!(file = %entry.file_name().to_string_lossy(), "Copied artifact");
            }
        }

        Ok(target_dir)
    }

    /// Ensure the execution identity for an agent exists and carries
    /// the current execution policy, returning its ARN.
    ///
    /// The create call is issued at most once per identity name. An
    /// existing identity is reused, but its execution policy is
    /// re-attached so stale permissions get upgraded.
    pub async fn ensure_identity(
        &self,
        agent_name: &str,
    ) -> Result<ExecutionIdentity, OrchestratorError> {
        let name = policy::identity_name(agent_name);
        let policy_name = policy::execution_policy_name(&name);
        let execution = policy::execution_policy(&self.config.region, agent_name);

        if let Some(arn) = self
            .identity
            .get_identity(&name)
            .await
            .map_err(OrchestratorError::Identity)?
        {
            info!(identity = %name, "Identity already exists, re-syncing execution policy");
            self.identity
                .attach_policy(&name, &policy_name, &execution)
                .await
                .map_err(OrchestratorError::Identity)?;
            return Ok(ExecutionIdentity { name, arn });
        }

        info!(identity = %name, "Creating execution identity");
        let trust = policy::trust_policy(&self.config.region);
        let arn = match self.identity.create_identity(&name, &trust).await {
            Ok(arn) => arn,
            Err(e) => {
                error!(identity = %name, error = %e, "Failed to create identity");
                return Err(OrchestratorError::Identity(e));
            }
        };

        if let Err(e) = self
            .identity
            .attach_policy(&name, &policy_name, &execution)
            .await
        {
            error!(identity = %name, error = %e, "Failed to attach execution policy");
            return Err(OrchestratorError::Identity(e));
        }

        // Newly attached policy propagates with a delay in the
        // identity service; settle before the deployer assumes it.
        let settle = self.config.identity.settle();
        if !settle.is_zero() {
            debug!(secs = settle.as_secs(), "Waiting for policy propagation");
            tokio::time::sleep(settle).await;
        }

        info!(identity = %name, arn = %arn, "Execution identity created");
        Ok(ExecutionIdentity { name, arn })
    }
}
