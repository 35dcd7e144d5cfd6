//! Local execution backend: a fresh interpreter process per harness.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, instrument};

use crate::backend::{BackendError, ExecBackend, RawExecution};
use crate::config::SandboxConfig;
use crate::harness::status;
use crate::process::run_with_deadline;

/// Runs harnesses by writing them to an ephemeral file and spawning the
/// configured interpreter against it.
///
/// The ephemeral file is a [`tempfile::NamedTempFile`], removed on drop, so
/// cleanup holds on every exit path: success, script error, timeout, and
/// backend fault alike.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    python_bin: String,
    output_limit_bytes: usize,
    scratch_dir: Option<PathBuf>,
}

impl LocalBackend {
    pub fn new(python_bin: impl Into<String>, output_limit_bytes: usize) -> Self {
        Self {
            python_bin: python_bin.into(),
            output_limit_bytes,
            scratch_dir: None,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(config.python_bin.clone(), config.output_limit_bytes)
    }

    /// Place ephemeral harness files under `dir` instead of the system temp
    /// directory. Tests use this to assert cleanup.
    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = Some(dir);
        self
    }

    fn try_run(&self, harness: &str, timeout: Duration) -> Result<RawExecution> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("scriptbox-").suffix(".py");
        let mut file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("create ephemeral harness file")?;
        file.write_all(harness.as_bytes())
            .context("write harness source")?;
        file.flush().context("flush harness source")?;

        let mut cmd = Command::new(&self.python_bin);
        cmd.arg(file.path());
        let capture = run_with_deadline(cmd, timeout, self.output_limit_bytes)?;

        if capture.timed_out {
            return Ok(RawExecution {
                stdout: String::from_utf8_lossy(&capture.stdout).into_owned(),
                stderr: format!("Execution timed out after {} seconds", timeout.as_secs()),
                exit_status: status::TIMED_OUT,
                fallback_note: None,
            });
        }

        Ok(RawExecution {
            stdout: String::from_utf8_lossy(&capture.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&capture.stderr).into_owned(),
            exit_status: capture.status.code().unwrap_or(status::RUNNER_FAULT),
            fallback_note: None,
        })
    }
}

impl ExecBackend for LocalBackend {
    /// Always returns a result: interpreter faults (missing binary, I/O
    /// errors) become a `RUNNER_FAULT` execution instead of escaping this
    /// boundary, so one misbehaving run can never wedge the caller.
    #[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
    fn run(&self, harness: &str, timeout: Duration) -> Result<RawExecution, BackendError> {
        match self.try_run(harness, timeout) {
            Ok(raw) => {
                debug!(exit_status = raw.exit_status, "local run finished");
                Ok(raw)
            }
            Err(err) => {
                error!(err = %err, "local backend fault");
                Ok(RawExecution {
                    stdout: String::new(),
                    stderr: format!("local runner internal error: {err:#}"),
                    exit_status: status::RUNNER_FAULT,
                    fallback_note: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_interpreter_maps_to_runner_fault() {
        let backend = LocalBackend::new("scriptbox-no-such-python", 10_000);
        let raw = backend
            .run("print('hi')", Duration::from_secs(1))
            .expect("local backend never raises");
        assert_eq!(raw.exit_status, status::RUNNER_FAULT);
        assert!(raw.stderr.contains("local runner internal error"));
    }

    #[test]
    fn scratch_dir_is_empty_after_fault() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let backend = LocalBackend::new("scriptbox-no-such-python", 10_000)
            .with_scratch_dir(scratch.path().to_path_buf());
        backend
            .run("print('hi')", Duration::from_secs(1))
            .expect("local backend never raises");
        let leftovers: Vec<_> = std::fs::read_dir(scratch.path())
            .expect("read scratch dir")
            .collect();
        assert!(leftovers.is_empty(), "harness file leaked: {leftovers:?}");
    }
}
