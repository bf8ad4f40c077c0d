//! Resource Manager
//!
//! Tears down a deployed runtime and, optionally, its execution
//! identity. Teardown is best-effort: every step runs regardless of
//! earlier outcomes, and failures are collected as warnings instead
//! of aborting the sequence. The one hard ordering rule is that all
//! inline policies must be detached before the identity delete is
//! issued; the identity service rejects anything else.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::{DeploymentClient, IdentityClient};
use crate::error::ClientError;
use crate::policy;

/// Outcome of a teardown pass. Warnings are advisory; the caller
/// decides whether to retry, inspect partial state, or move on.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub runtime_deleted: bool,
    pub identity_deleted: bool,
    pub warnings: Vec<String>,
}

impl CleanupReport {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Handles resource lifecycle teardown for one agent.
pub struct ResourceManager<I: IdentityClient, D: DeploymentClient> {
    identity: Arc<I>,
    deployment: Arc<D>,
    agent_name: String,
}

impl<I: IdentityClient, D: DeploymentClient> ResourceManager<I, D> {
    pub fn new(identity: Arc<I>, deployment: Arc<D>, agent_name: &str) -> Self {
        Self {
            identity,
            deployment,
            agent_name: agent_name.to_string(),
        }
    }

    /// Delete the runtime and, when requested, its execution identity.
    /// All steps are attempted; nothing here aborts the sequence.
    pub async fn delete(&self, delete_identity: bool) -> CleanupReport {
        let mut report = CleanupReport::default();

        self.delete_runtime(&mut report).await;
        if delete_identity {
            self.delete_identity(&mut report).await;
        }

        info!(
            agent = %self.agent_name,
            warnings = report.warnings.len(),
            "Cleanup completed"
        );
        report
    }

    /// Best-effort remote runtime delete. The deployment service may
    /// not expose a delete primitive at all; that becomes a warning
    /// telling the operator to clean up manually.
    async fn delete_runtime(&self, report: &mut CleanupReport) {
        info!(agent = %self.agent_name, "Deleting runtime");

        match self.deployment.delete_runtime(&self.agent_name).await {
            Ok(()) => {
                report.runtime_deleted = true;
            }
            Err(ClientError::NotFound(_)) => {
                debug!(agent = %self.agent_name, "Runtime already absent");
                report.runtime_deleted = true;
            }
            Err(ClientError::Unsupported(_)) => {
                report.warn(format!(
                    "runtime deletion is not supported by the deployment service; \
                     manual cleanup of '{}' is required",
                    self.agent_name
                ));
            }
            Err(e) => {
                report.warn(format!("failed to delete runtime '{}': {}", self.agent_name, e));
            }
        }
    }

    /// Delete the execution identity, detaching every inline policy
    /// first. A detach failure stops the identity delete from being
    /// issued. Missing identity or policies count as success.
    async fn delete_identity(&self, report: &mut CleanupReport) {
        let name = policy::identity_name(&self.agent_name);
        info!(identity = %name, "Deleting execution identity");

        let policies = match self.identity.list_inline_policies(&name).await {
            Ok(policies) => policies,
            Err(ClientError::NotFound(_)) => {
                debug!(identity = %name, "Identity already absent");
                report.identity_deleted = true;
                return;
            }
            Err(e) => {
                report.warn(format!("failed to list policies on '{}': {}", name, e));
                return;
            }
        };

        for policy_name in &policies {
            match self.identity.detach_policy(&name, policy_name).await {
                Ok(()) => {
                    debug!(identity = %name, policy = %policy_name, "Detached policy");
                }
                Err(ClientError::NotFound(_)) => {}
                Err(e) => {
                    // The identity delete must never be issued while
                    // policies may still be attached
                    report.warn(format!(
                        "failed to detach policy '{}' from '{}': {}; identity delete skipped",
                        policy_name, name, e
                    ));
                    return;
                }
            }
        }

        match self.identity.delete_identity(&name).await {
            Ok(()) | Err(ClientError::NotFound(_)) => {
                info!(identity = %name, "Execution identity deleted");
                report.identity_deleted = true;
            }
            Err(e) => {
                report.warn(format!("failed to delete identity '{}': {}", name, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::DeploymentDescriptor;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeIdentity {
        policies: Mutex<Vec<String>>,
        exists: Mutex<bool>,
        fail_detach: Mutex<Option<String>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IdentityClient for FakeIdentity {
        async fn get_identity(&self, _name: &str) -> Result<Option<String>, ClientError> {
            Ok(None)
        }

        async fn create_identity(&self, _n: &str, _t: &Value) -> Result<String, ClientError> {
            Ok(String::new())
        }

        async fn attach_policy(&self, _n: &str, _p: &str, _d: &Value) -> Result<(), ClientError> {
            Ok(())
        }

        async fn list_inline_policies(&self, name: &str) -> Result<Vec<String>, ClientError> {
            self.calls.lock().unwrap().push("list".to_string());
            if !*self.exists.lock().unwrap() {
                return Err(ClientError::NotFound(name.to_string()));
            }
            Ok(self.policies.lock().unwrap().clone())
        }

        async fn detach_policy(&self, _name: &str, policy_name: &str) -> Result<(), ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("detach:{}", policy_name));
            if self.fail_detach.lock().unwrap().as_deref() == Some(policy_name) {
                return Err(ClientError::Api {
                    code: "THROTTLED".to_string(),
                    message: "slow down".to_string(),
                });
            }
            Ok(())
        }

        async fn delete_identity(&self, _name: &str) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push("delete".to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDeployment {
        delete_result: Mutex<Option<ClientError>>,
    }

    #[async_trait]
    impl DeploymentClient for FakeDeployment {
        async fn configure(&self, _d: &DeploymentDescriptor) -> Result<(), ClientError> {
            Ok(())
        }

        async fn launch(&self) -> Result<String, ClientError> {
            Ok(String::new())
        }

        async fn status(&self) -> Result<String, ClientError> {
            Ok(String::new())
        }

        async fn delete_runtime(&self, _agent_name: &str) -> Result<(), ClientError> {
            match self.delete_result.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    fn identity_with_policies(policies: &[&str]) -> Arc<FakeIdentity> {
        let fake = FakeIdentity::default();
        *fake.exists.lock().unwrap() = true;
        *fake.policies.lock().unwrap() = policies.iter().map(|p| p.to_string()).collect();
        Arc::new(fake)
    }

    #[tokio::test]
    async fn test_detaches_all_policies_before_identity_delete() {
        let identity = identity_with_policies(&["p1", "p2", "p3"]);
        let manager =
            ResourceManager::new(identity.clone(), Arc::new(FakeDeployment::default()), "pricer");

        let report = manager.delete(true).await;
        assert!(report.identity_deleted);

        let calls = identity.calls.lock().unwrap();
        let delete_pos = calls.iter().position(|c| c == "delete").unwrap();
        let detaches: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.starts_with("detach:"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(detaches.len(), 3);
        assert!(detaches.iter().all(|&i| i < delete_pos));
    }

    #[tokio::test]
    async fn test_detach_failure_skips_identity_delete() {
        let identity = identity_with_policies(&["p1", "p2"]);
        *identity.fail_detach.lock().unwrap() = Some("p2".to_string());
        let manager =
            ResourceManager::new(identity.clone(), Arc::new(FakeDeployment::default()), "pricer");

        let report = manager.delete(true).await;
        assert!(!report.identity_deleted);
        assert_eq!(report.warnings.len(), 1);
        assert!(!identity.calls.lock().unwrap().iter().any(|c| c == "delete"));
    }

    #[tokio::test]
    async fn test_missing_identity_is_idempotent_success() {
        let identity = Arc::new(FakeIdentity::default());
        let manager =
            ResourceManager::new(identity, Arc::new(FakeDeployment::default()), "pricer");

        let report = manager.delete(true).await;
        assert!(report.identity_deleted);
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_runtime_is_idempotent_success() {
        let deployment = FakeDeployment::default();
        *deployment.delete_result.lock().unwrap() =
            Some(ClientError::NotFound("pricer".to_string()));
        let manager =
            ResourceManager::new(Arc::new(FakeIdentity::default()), Arc::new(deployment), "pricer");

        let report = manager.delete(false).await;
        assert!(report.runtime_deleted);
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_runtime_delete_is_a_warning() {
        let deployment = FakeDeployment::default();
        *deployment.delete_result.lock().unwrap() =
            Some(ClientError::Unsupported("no delete route".to_string()));
        let identity = identity_with_policies(&[]);
        let manager = ResourceManager::new(identity, Arc::new(deployment), "pricer");

        // The runtime warning must not stop the identity teardown
        let report = manager.delete(true).await;
        assert!(!report.runtime_deleted);
        assert!(report.identity_deleted);
        assert_eq!(report.warnings.len(), 1);
    }
}
