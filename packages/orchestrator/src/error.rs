//! Error Types
//!
//! Defines the orchestrator error taxonomy and the boundary error
//! returned by remote service clients. Identity and deployment
//! failures are fatal and halt the workflow; invocation and cleanup
//! failures are advisory and are reported without aborting the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the lifecycle orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The source bundle directory does not exist. Aborts prepare.
    #[error("source directory not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Identity create/attach/lookup failure. Aborts prepare.
    #[error("identity operation failed: {0}")]
    Identity(#[source] ClientError),

    /// Invalid deployment descriptor rejected before launch.
    #[error("invalid deployment descriptor: {0}")]
    Descriptor(String),

    /// The deployment reached a terminal non-ready status, or the
    /// poll bound was exhausted. Carries the last observed status.
    #[error("deployment failed with status: {status}")]
    Deployment { status: String },

    /// Transport or decode failure while invoking a runtime.
    #[error("invocation failed: {0}")]
    Invocation(String),

    /// Best-effort teardown step failure. Advisory only.
    #[error("cleanup step failed: {0}")]
    Cleanup(String),

    /// Configuration or persisted record could not be parsed or written.
    #[error("configuration error: {0}")]
    Config(String),

    /// An operation was called in a state that does not permit it.
    #[error("operation {operation} not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Filesystem failure while staging a bundle or persisting a record.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors returned by the remote service clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The named remote resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The remote service does not expose this operation.
    #[error("operation not supported by the remote service: {0}")]
    Unsupported(String),

    /// Transport-level failure reaching the service.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service reported a structured error.
    #[error("[{code}] {message}")]
    Api { code: String, message: String },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether this error means the resource was already absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}
