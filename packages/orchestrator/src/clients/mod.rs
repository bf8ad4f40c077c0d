//! Remote Service Clients
//!
//! Narrow interfaces for the identity, deployment, and invocation
//! services. The orchestrator only ever talks to these traits; the
//! concrete wire bindings live in the `http` module so every
//! component can be exercised against fakes in tests.

pub mod http;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::error::ClientError;

/// Lazily delivered lines of an event-stream body, in arrival order.
pub type LineStream = BoxStream<'static, String>;

/// Marker prefixing each frame of an event-stream response body.
pub const EVENT_STREAM_MARKER: &str = "data: ";

/// Content type declaring incremental delivery.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Everything the deployment service needs to launch a runtime.
/// Immutable once handed to the deployer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    pub agent_name: String,
    pub bundle_dir: PathBuf,
    pub identity_arn: String,
    pub entrypoint: PathBuf,
    pub requirements_file: PathBuf,
    pub region: String,
    pub protocol: String,
}

/// Handle to a launched runtime. The status only moves forward
/// through the deploy state machine within a single deploy call.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    pub runtime_id: String,
    pub status: RuntimeStatus,
}

/// Runtime status as reported by the deployment service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    Ready,
    CreateFailed,
    UpdateFailed,
    DeleteFailed,
    /// Any other value. Treated as non-terminal so newly introduced
    /// intermediate statuses keep the poll loop going.
    Pending(String),
}

impl RuntimeStatus {
    /// Parse a raw status string from the deployment service.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "READY" => RuntimeStatus::Ready,
            "CREATE_FAILED" => RuntimeStatus::CreateFailed,
            "UPDATE_FAILED" => RuntimeStatus::UpdateFailed,
            "DELETE_FAILED" => RuntimeStatus::DeleteFailed,
            other => RuntimeStatus::Pending(other.to_string()),
        }
    }

    /// Whether the state machine performs no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RuntimeStatus::Pending(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuntimeStatus::Ready => "READY",
            RuntimeStatus::CreateFailed => "CREATE_FAILED",
            RuntimeStatus::UpdateFailed => "UPDATE_FAILED",
            RuntimeStatus::DeleteFailed => "DELETE_FAILED",
            RuntimeStatus::Pending(other) => other,
        }
    }
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response from the invocation service, before normalization.
pub struct InvocationResponse {
    pub content_type: String,
    pub body: ResponseBody,
}

/// The two encodings a runtime response can arrive in.
pub enum ResponseBody {
    /// Line-delimited frames, marker included, delivered as the
    /// upstream produces them. Consuming this is what pulls bytes off
    /// the wire; it is finite and non-restartable.
    EventStream(LineStream),
    /// Opaque byte-encoded events; only the first one is meaningful.
    Events(Vec<Vec<u8>>),
}

impl InvocationResponse {
    /// Detection is by declared content type, never by sniffing.
    pub fn is_event_stream(&self) -> bool {
        self.content_type.contains(EVENT_STREAM_CONTENT_TYPE)
    }
}

/// Identity service operations used by the orchestrator.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Look up an identity by name. `None` means it does not exist.
    async fn get_identity(&self, name: &str) -> Result<Option<String>, ClientError>;

    /// Create an identity with the given trust policy, returning its ARN.
    async fn create_identity(&self, name: &str, trust_policy: &Value)
        -> Result<String, ClientError>;

    /// Attach (or replace) an inline policy on an identity.
    async fn attach_policy(
        &self,
        name: &str,
        policy_name: &str,
        document: &Value,
    ) -> Result<(), ClientError>;

    /// List the names of all inline policies attached to an identity.
    async fn list_inline_policies(&self, name: &str) -> Result<Vec<String>, ClientError>;

    /// Detach an inline policy from an identity.
    async fn detach_policy(&self, name: &str, policy_name: &str) -> Result<(), ClientError>;

    /// Delete an identity. All inline policies must be detached first.
    async fn delete_identity(&self, name: &str) -> Result<(), ClientError>;
}

/// Deployment service operations. One client instance carries the
/// state of a single deploy session, mirroring the remote service's
/// configure-then-launch contract.
#[async_trait]
pub trait DeploymentClient: Send + Sync {
    /// Register the descriptor with the deployment service.
    async fn configure(&self, descriptor: &DeploymentDescriptor) -> Result<(), ClientError>;

    /// Issue the create/update call, returning the runtime identifier.
    async fn launch(&self) -> Result<String, ClientError>;

    /// Fetch the current raw status of the launched runtime.
    async fn status(&self) -> Result<String, ClientError>;

    /// Delete a deployed runtime by agent name. May be unsupported.
    async fn delete_runtime(&self, agent_name: &str) -> Result<(), ClientError>;
}

/// Invocation service operations.
#[async_trait]
pub trait InvocationClient: Send + Sync {
    /// Send a payload to a runtime, selecting the live version with
    /// the qualifier.
    async fn invoke(
        &self,
        runtime_id: &str,
        qualifier: &str,
        payload: Vec<u8>,
    ) -> Result<InvocationResponse, ClientError>;
}
