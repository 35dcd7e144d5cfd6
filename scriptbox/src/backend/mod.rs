//! Execution backends: interchangeable ways to run a harness under a time
//! bound.
//!
//! The [`ExecBackend`] trait decouples the orchestrator from the actual
//! execution path (remote runner service or local interpreter process).
//! Tests use scripted backends that return predetermined results without
//! spawning anything.

mod local;
mod remote;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalBackend;
pub use remote::RemoteBackend;

/// Raw output of exactly one backend run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExecution {
    pub stdout: String,
    pub stderr: String,
    /// Harness exit status, or one of the negative sentinels in
    /// [`crate::harness::status`].
    pub exit_status: i32,
    /// Set by the orchestrator when this result came from the local
    /// fallback; carries the `[runner-unavailable]` annotation.
    pub fallback_note: Option<String>,
}

/// Failure classes a backend can raise past its boundary.
///
/// `Unavailable` is a transport-level condition (connection refused, DNS
/// failure, non-success response, malformed body) and is the only variant
/// that triggers fallback. It is never a script-level error.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("runner unavailable: {0}")]
    Unavailable(String),
    #[error("runner fault: {0}")]
    Fault(String),
}

/// Common contract: run this harness source under a time bound and return
/// raw stdout/stderr/exit status.
pub trait ExecBackend {
    fn run(&self, harness: &str, timeout: Duration) -> Result<RawExecution, BackendError>;
}

impl<T: ExecBackend + ?Sized> ExecBackend for &T {
    fn run(&self, harness: &str, timeout: Duration) -> Result<RawExecution, BackendError> {
        (**self).run(harness, timeout)
    }
}

/// Request body for the runner service `/run` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub harness: String,
    /// Execution timeout in whole seconds.
    #[serde(default = "default_run_timeout")]
    pub timeout: u64,
}

fn default_run_timeout() -> u64 {
    5
}

/// Response body from the runner service `/run` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
}
