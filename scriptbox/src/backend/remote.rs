//! Remote execution backend: POSTs harnesses to the runner service.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::backend::{BackendError, ExecBackend, RawExecution, RunRequest, RunResponse};
use crate::config::SandboxConfig;

/// Client for the runner service `/run` endpoint.
///
/// The transport deadline is the execution timeout plus a fixed margin, so
/// it is always strictly greater: a runner that accepts the request but
/// never answers is classified as unavailable instead of hanging the caller.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    url: String,
    request_timeout_margin: Duration,
    agent: ureq::Agent,
}

impl RemoteBackend {
    pub fn new(url: impl Into<String>, request_timeout_margin: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout_margin,
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(
            config.runner.url.clone(),
            Duration::from_secs(config.runner.request_timeout_margin_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ExecBackend for RemoteBackend {
    /// Every transport-level problem (refused connection, DNS failure,
    /// non-success status, malformed body) is raised as
    /// [`BackendError::Unavailable`], never translated into a script-level
    /// error.
    #[instrument(skip_all, fields(url = %self.url, timeout_secs = timeout.as_secs()))]
    fn run(&self, harness: &str, timeout: Duration) -> Result<RawExecution, BackendError> {
        let transport_deadline = timeout + self.request_timeout_margin;
        let request = RunRequest {
            harness: harness.to_string(),
            timeout: timeout.as_secs(),
        };

        let response = self
            .agent
            .post(&self.url)
            .timeout(transport_deadline)
            .send_json(&request)
            .map_err(|err| {
                warn!(err = %err, "runner request failed");
                BackendError::Unavailable(err.to_string())
            })?;

        let body: RunResponse = response.into_json().map_err(|err| {
            warn!(err = %err, "runner response body malformed");
            BackendError::Unavailable(format!("malformed runner response: {err}"))
        })?;

        debug!(return_code = body.return_code, "runner responded");
        Ok(RawExecution {
            stdout: body.stdout,
            stderr: body.stderr,
            exit_status: body.return_code,
            fallback_note: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Nothing listens on this port; the request must fail at the transport
    /// level and surface as `Unavailable`, not as a script error.
    #[test]
    fn unreachable_endpoint_is_unavailable() {
        let backend = RemoteBackend::new(
            "http://127.0.0.1:1/run",
            Duration::from_secs(1),
        );
        let err = backend
            .run("print('hi')", Duration::from_secs(1))
            .expect_err("must fail");
        assert!(matches!(err, BackendError::Unavailable(_)));
    }
}
