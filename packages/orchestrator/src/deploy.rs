//! Deployer
//!
//! Configures and launches a prepared bundle against the remote
//! runtime service, then polls until a terminal status is reached.
//! One deployer instance covers exactly one deploy call; its state
//! machine only ever moves forward.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::clients::{DeploymentClient, DeploymentDescriptor, RuntimeHandle, RuntimeStatus};
use crate::config::PollConfig;
use crate::error::OrchestratorError;

/// Deploy state machine. Terminal states mirror the remote service's
/// terminal status set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Unconfigured,
    Configured,
    Launching,
    Ready,
    CreateFailed,
    UpdateFailed,
    DeleteFailed,
}

impl DeployState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeployState::Ready
                | DeployState::CreateFailed
                | DeployState::UpdateFailed
                | DeployState::DeleteFailed
        )
    }
}

impl std::fmt::Display for DeployState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployState::Unconfigured => write!(f, "Unconfigured"),
            DeployState::Configured => write!(f, "Configured"),
            DeployState::Launching => write!(f, "Launching"),
            DeployState::Ready => write!(f, "Ready"),
            DeployState::CreateFailed => write!(f, "CreateFailed"),
            DeployState::UpdateFailed => write!(f, "UpdateFailed"),
            DeployState::DeleteFailed => write!(f, "DeleteFailed"),
        }
    }
}

/// Handles deployment of a prepared bundle to the runtime service.
pub struct Deployer<D: DeploymentClient> {
    client: Arc<D>,
    state: DeployState,
    poll_interval: Duration,
    max_checks: u64,
}

impl<D: DeploymentClient> Deployer<D> {
    pub fn new(client: Arc<D>, poll: &PollConfig) -> Self {
        Self {
            client,
            state: DeployState::Unconfigured,
            poll_interval: poll.interval(),
            max_checks: poll.max_checks(),
        }
    }

    pub fn state(&self) -> DeployState {
        self.state
    }

    /// Check if a state transition is valid. Transitions are
    /// forward-only; terminal states accept nothing.
    fn is_valid_transition(from: DeployState, to: DeployState) -> bool {
        matches!(
            (from, to),
            (DeployState::Unconfigured, DeployState::Configured)
                | (DeployState::Configured, DeployState::Launching)
                | (DeployState::Launching, DeployState::Ready)
                | (DeployState::Launching, DeployState::CreateFailed)
                | (DeployState::Launching, DeployState::UpdateFailed)
                | (DeployState::Launching, DeployState::DeleteFailed)
        )
    }

    fn transition(
        &mut self,
        to: DeployState,
        operation: &'static str,
    ) -> Result<(), OrchestratorError> {
        if !Self::is_valid_transition(self.state, to) {
            return Err(OrchestratorError::InvalidState {
                operation,
                state: self.state.to_string(),
            });
        }
        debug!(from = %self.state, to = %to, "Deploy state transition");
        self.state = to;
        Ok(())
    }

    /// Register the descriptor with the deployment service. Validation
    /// is syntactic only; nothing is checked for remote existence.
    pub async fn configure(
        &mut self,
        descriptor: &DeploymentDescriptor,
    ) -> Result<(), OrchestratorError> {
        // Reject before the remote call so a configure in the wrong
        // state leaves no side effect on the service
        if !Self::is_valid_transition(self.state, DeployState::Configured) {
            return Err(OrchestratorError::InvalidState {
                operation: "configure",
                state: self.state.to_string(),
            });
        }

        if descriptor.entrypoint.as_os_str().is_empty() {
            return Err(OrchestratorError::Descriptor("entrypoint is empty".to_string()));
        }
        if descriptor.identity_arn.is_empty() {
            return Err(OrchestratorError::Descriptor("identity ARN is empty".to_string()));
        }
        if descriptor.requirements_file.as_os_str().is_empty() {
            return Err(OrchestratorError::Descriptor(
                "requirements manifest path is empty".to_string(),
            ));
        }

        info!(
            agent = %descriptor.agent_name,
            entrypoint = %descriptor.entrypoint.display(),
            region = %descriptor.region,
            "Configuring runtime"
        );

        self.client
            .configure(descriptor)
            .await
            .map_err(|e| OrchestratorError::Deployment {
                status: format!("CONFIGURE_FAILED: {}", e),
            })?;

        self.transition(DeployState::Configured, "configure")
    }

    /// Issue the remote create/update call. Returns immediately with a
    /// handle whose status is not yet terminal.
    pub async fn launch(&mut self) -> Result<RuntimeHandle, OrchestratorError> {
        self.transition(DeployState::Launching, "launch")?;

        let runtime_id = self
            .client
            .launch()
            .await
            .map_err(|e| OrchestratorError::Deployment {
                status: format!("LAUNCH_FAILED: {}", e),
            })?;

        info!(runtime_id = %runtime_id, "Runtime launch issued");

        Ok(RuntimeHandle {
            runtime_id,
            status: RuntimeStatus::Pending("LAUNCHING".to_string()),
        })
    }

    /// Poll the remote status at the configured interval until a
    /// terminal value is reached or the check bound is exhausted.
    /// Unknown status values are treated as non-terminal, so the
    /// bound is what prevents an indefinite hang.
    pub async fn await_ready(
        &mut self,
        handle: RuntimeHandle,
    ) -> Result<RuntimeHandle, OrchestratorError> {
        self.await_ready_with(handle, |_| {}).await
    }

    /// Same as `await_ready`, additionally reporting every observed
    /// status to `on_status` so callers can surface polling progress.
    pub async fn await_ready_with<F>(
        &mut self,
        mut handle: RuntimeHandle,
        mut on_status: F,
    ) -> Result<RuntimeHandle, OrchestratorError>
    where
        F: FnMut(&RuntimeStatus),
    {
        if self.state != DeployState::Launching {
            return Err(OrchestratorError::InvalidState {
                operation: "await_ready",
                state: self.state.to_string(),
            });
        }

        let mut checks = 0u64;
        loop {
            let raw = self
                .client
                .status()
                .await
                .map_err(|e| OrchestratorError::Deployment {
                    status: format!("STATUS_FAILED: {}", e),
                })?;
            checks += 1;

            let status = RuntimeStatus::parse(&raw);
            debug!(runtime_id = %handle.runtime_id, status = %status, checks, "Polled status");
            on_status(&status);
            handle.status = status.clone();

            match status {
                RuntimeStatus::Ready => {
                    self.transition(DeployState::Ready, "await_ready")?;
                    info!(runtime_id = %handle.runtime_id, "Runtime is ready");
                    return Ok(handle);
                }
                RuntimeStatus::CreateFailed
                | RuntimeStatus::UpdateFailed
                | RuntimeStatus::DeleteFailed => {
                    let terminal = match status {
                        RuntimeStatus::CreateFailed => DeployState::CreateFailed,
                        RuntimeStatus::UpdateFailed => DeployState::UpdateFailed,
                        _ => DeployState::DeleteFailed,
                    };
                    self.transition(terminal, "await_ready")?;
                    error!(
                        runtime_id = %handle.runtime_id,
                        status = %raw,
                        "Runtime deployment failed"
                    );
                    return Err(OrchestratorError::Deployment { status: raw });
                }
                RuntimeStatus::Pending(_) => {
                    if checks >= self.max_checks {
                        error!(
                            runtime_id = %handle.runtime_id,
                            last_status = %raw,
                            checks,
                            "Gave up waiting for a terminal status"
                        );
                        return Err(OrchestratorError::Deployment { status: raw });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Fake deployment service replaying a scripted status sequence.
    struct FakeDeployment {
        statuses: Mutex<Vec<String>>,
        status_checks: Mutex<u64>,
        configure_calls: Mutex<u64>,
    }

    impl FakeDeployment {
        fn with_statuses(statuses: &[&str]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().rev().map(|s| s.to_string()).collect()),
                status_checks: Mutex::new(0),
                configure_calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl DeploymentClient for FakeDeployment {
        async fn configure(&self, _descriptor: &DeploymentDescriptor) -> Result<(), ClientError> {
            *self.configure_calls.lock().unwrap() += 1;
            Ok(())
        }

        async fn launch(&self) -> Result<String, ClientError> {
            Ok("rt-42".to_string())
        }

        async fn status(&self) -> Result<String, ClientError> {
            *self.status_checks.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            // The last scripted status repeats once the script runs out
            if statuses.len() > 1 {
                Ok(statuses.pop().unwrap())
            } else {
                Ok(statuses.last().cloned().unwrap_or_default())
            }
        }

        async fn delete_runtime(&self, _agent_name: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn descriptor() -> DeploymentDescriptor {
        DeploymentDescriptor {
            agent_name: "pricer".to_string(),
            bundle_dir: PathBuf::from("deployment/pricer"),
            identity_arn: "srn:skyhook:identity::role/AgentRuntimeRole-pricer".to_string(),
            entrypoint: PathBuf::from("deployment/pricer/invoke.py"),
            requirements_file: PathBuf::from("deployment/pricer/requirements.txt"),
            region: "us-east-1".to_string(),
            protocol: "HTTP".to_string(),
        }
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval_secs: 0,
            max_wait_secs: 30,
        }
    }

    async fn launched(client: Arc<FakeDeployment>) -> (Deployer<FakeDeployment>, RuntimeHandle) {
        let mut deployer = Deployer::new(client, &fast_poll());
        deployer.configure(&descriptor()).await.unwrap();
        let handle = deployer.launch().await.unwrap();
        (deployer, handle)
    }

    #[tokio::test]
    async fn test_await_ready_stops_at_ready() {
        let client = Arc::new(FakeDeployment::with_statuses(&[
            "LAUNCHING",
            "LAUNCHING",
            "READY",
        ]));
        let (mut deployer, handle) = launched(client.clone()).await;

        let handle = deployer.await_ready(handle).await.unwrap();
        assert_eq!(handle.status, RuntimeStatus::Ready);
        assert_eq!(deployer.state(), DeployState::Ready);
        // Exactly three checks, none after the terminal status
        assert_eq!(*client.status_checks.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_await_ready_reports_create_failed() {
        let client = Arc::new(FakeDeployment::with_statuses(&["LAUNCHING", "CREATE_FAILED"]));
        let (mut deployer, handle) = launched(client).await;

        let err = deployer.await_ready(handle).await.unwrap_err();
        match err {
            OrchestratorError::Deployment { status } => assert_eq!(status, "CREATE_FAILED"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(deployer.state(), DeployState::CreateFailed);
    }

    #[tokio::test]
    async fn test_unknown_status_polls_until_bound() {
        let client = Arc::new(FakeDeployment::with_statuses(&["PROVISIONING"]));
        let (mut deployer, handle) = launched(client.clone()).await;

        let err = deployer.await_ready(handle).await.unwrap_err();
        match err {
            OrchestratorError::Deployment { status } => assert_eq!(status, "PROVISIONING"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(*client.status_checks.lock().unwrap(), fast_poll().max_checks());
    }

    #[tokio::test]
    async fn test_configure_rejects_empty_entrypoint() {
        let client = Arc::new(FakeDeployment::with_statuses(&[]));
        let mut deployer = Deployer::new(client, &fast_poll());

        let mut bad = descriptor();
        bad.entrypoint = PathBuf::new();
        let result = deployer.configure(&bad).await;
        assert!(matches!(result, Err(OrchestratorError::Descriptor(_))));
        assert_eq!(deployer.state(), DeployState::Unconfigured);
    }

    #[tokio::test]
    async fn test_await_ready_reports_each_polled_status() {
        let client = Arc::new(FakeDeployment::with_statuses(&[
            "LAUNCHING",
            "PROVISIONING",
            "READY",
        ]));
        let (mut deployer, handle) = launched(client).await;

        let mut seen = Vec::new();
        deployer
            .await_ready_with(handle, |status| seen.push(status.to_string()))
            .await
            .unwrap();
        assert_eq!(seen, vec!["LAUNCHING", "PROVISIONING", "READY"]);
    }

    #[tokio::test]
    async fn test_second_configure_makes_no_remote_call() {
        let client = Arc::new(FakeDeployment::with_statuses(&[]));
        let mut deployer = Deployer::new(client.clone(), &fast_poll());

        deployer.configure(&descriptor()).await.unwrap();
        let result = deployer.configure(&descriptor()).await;
        assert!(matches!(result, Err(OrchestratorError::InvalidState { .. })));
        assert_eq!(*client.configure_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_launch_requires_configured_state() {
        let client = Arc::new(FakeDeployment::with_statuses(&[]));
        let mut deployer = Deployer::new(client, &fast_poll());

        let result = deployer.launch().await;
        assert!(matches!(result, Err(OrchestratorError::InvalidState { .. })));
    }

    #[test]
    fn test_transitions_are_forward_only() {
        use DeployState::*;
        assert!(Deployer::<FakeDeployment>::is_valid_transition(Unconfigured, Configured));
        assert!(Deployer::<FakeDeployment>::is_valid_transition(Launching, Ready));
        assert!(!Deployer::<FakeDeployment>::is_valid_transition(Ready, Launching));
        assert!(!Deployer::<FakeDeployment>::is_valid_transition(Configured, Unconfigured));
        assert!(!Deployer::<FakeDeployment>::is_valid_transition(CreateFailed, Configured));
    }
}
