//! Skyhook Orchestrator Library
//!
//! This crate manages the lifecycle of agent workloads on a hosted
//! runtime service: staging deployable bundles, provisioning
//! execution identities, launching runtimes and waiting for them to
//! become operational, invoking them with normalized response
//! handling, and tearing everything down again.

pub mod cleanup;
pub mod clients;
pub mod config;
pub mod deploy;
pub mod error;
pub mod invoke;
pub mod policy;
pub mod prepare;
pub mod record;

// Re-exports for convenience
pub use cleanup::{CleanupReport, ResourceManager};
pub use clients::http::{
    HttpDeploymentClient, HttpIdentityClient, HttpInvocationClient, ServiceClient,
};
pub use clients::{
    DeploymentClient, DeploymentDescriptor, IdentityClient, InvocationClient,
    InvocationResponse, LineStream, ResponseBody, RuntimeHandle, RuntimeStatus,
};
pub use config::OrchestratorConfig;
pub use deploy::{DeployState, Deployer};
pub use error::{ClientError, OrchestratorError};
pub use invoke::{DeltaTracker, Invoker};
pub use prepare::{ExecutionIdentity, PreparedBundle, Preparer};
pub use record::ResourceRecord;
