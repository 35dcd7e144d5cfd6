//! Execution orchestrator: validate, build the harness, run it remote-first
//! with local fallback, and normalize the outcome.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::backend::{BackendError, ExecBackend, LocalBackend, RawExecution, RemoteBackend};
use crate::config::SandboxConfig;
use crate::harness::{build_harness, status};
use crate::normalize::{ExecutionResponse, normalize};
use crate::validate::Validator;

/// One execution request. All fields are scoped to this request; nothing is
/// shared across requests beyond the sandbox configuration.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub script: String,
    pub timeout: Duration,
    /// Accepted for forward compatibility; not enforced by either backend.
    pub memory_limit_mb: Option<u64>,
}

impl ExecRequest {
    pub fn new(script: impl Into<String>, timeout: Duration) -> Self {
        Self {
            script: script.into(),
            timeout,
            memory_limit_mb: None,
        }
    }
}

/// The dual-path executor.
///
/// The remote backend is tried first when present; on a transport-level
/// failure (and only then) the local backend runs once, with the failure
/// reason annotated into stderr. There is no retry loop: at most one remote
/// and one local attempt per request, bounding worst-case latency to
/// roughly transport deadline + execution timeout.
pub struct Sandbox<R: ExecBackend, L: ExecBackend> {
    validator: Validator,
    remote: Option<R>,
    local: L,
}

impl Sandbox<RemoteBackend, LocalBackend> {
    /// Remote-first sandbox wired from configuration.
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            validator: Validator::from_config(config),
            remote: Some(RemoteBackend::from_config(config)),
            local: LocalBackend::from_config(config),
        }
    }
}

impl<L: ExecBackend> Sandbox<RemoteBackend, L> {
    /// Sandbox that never attempts a remote run.
    pub fn local_only(validator: Validator, local: L) -> Self {
        Self {
            validator,
            remote: None,
            local,
        }
    }
}

impl<R: ExecBackend, L: ExecBackend> Sandbox<R, L> {
    pub fn new(validator: Validator, remote: R, local: L) -> Self {
        Self {
            validator,
            remote: Some(remote),
            local,
        }
    }

    /// Run the full pipeline for one request.
    ///
    /// Rejected scripts return early with the issue summary as `error`; no
    /// backend is invoked. Nothing a script does can escape this method as
    /// a fault; execution problems travel in the response.
    #[instrument(skip_all, fields(script_bytes = request.script.len(), timeout_secs = request.timeout.as_secs()))]
    pub fn execute(&self, request: &ExecRequest) -> ExecutionResponse {
        let report = self.validator.validate(&request.script);
        if let Some(summary) = report.summary() {
            info!(issues = report.issues().len(), "script rejected");
            return ExecutionResponse::rejected(format!(
                "script validation failed: {summary}"
            ));
        }

        if let Some(memory_limit_mb) = request.memory_limit_mb {
            debug!(memory_limit_mb, "memory limit requested but not enforced");
        }

        let harness = build_harness(&request.script);
        let raw = self.run_raw(&harness, request.timeout);
        normalize(&raw, request.timeout)
    }

    /// Run an already-built harness and return the raw backend result.
    ///
    /// Exposed for diagnostics and for the tests that assert on the
    /// fallback annotation and exit statuses; `execute` is the normal entry
    /// point.
    pub fn run_raw(&self, harness: &str, timeout: Duration) -> RawExecution {
        let Some(remote) = &self.remote else {
            return self.run_local(harness, timeout, None);
        };
        match remote.run(harness, timeout) {
            Ok(raw) => raw,
            Err(BackendError::Unavailable(reason)) => {
                warn!(%reason, "remote runner unavailable, falling back to local execution");
                self.run_local(harness, timeout, Some(reason))
            }
            Err(BackendError::Fault(detail)) => fault_execution(detail),
        }
    }

    fn run_local(
        &self,
        harness: &str,
        timeout: Duration,
        fallback_reason: Option<String>,
    ) -> RawExecution {
        let mut raw = match self.local.run(harness, timeout) {
            Ok(raw) => raw,
            Err(err) => fault_execution(err.to_string()),
        };
        if let Some(reason) = fallback_reason {
            let note = format!("[runner-unavailable] {reason}");
            raw.stderr = if raw.stderr.is_empty() {
                note.clone()
            } else {
                format!("{note}\n{}", raw.stderr)
            };
            raw.fallback_note = Some(note);
        }
        raw
    }
}

/// A backend fault is data, not a panic: it flows into the run's stderr so
/// the normalizer surfaces it as the response error.
fn fault_execution(detail: String) -> RawExecution {
    RawExecution {
        stdout: String::new(),
        stderr: format!("runner fault: {detail}"),
        exit_status: status::RUNNER_FAULT,
        fallback_note: None,
    }
}
