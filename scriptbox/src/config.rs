//! Sandbox configuration (TOML).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Static configuration for the execution pipeline.
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values. All fields are
/// read-only at runtime; requests never mutate shared configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Reject scripts larger than this many bytes.
    pub max_script_bytes: usize,

    /// Reject scripts with more function definitions than this, anywhere in
    /// the tree. Sanity bound against resource-exhaustion scripts.
    pub max_function_defs: usize,

    /// Execution timeout applied when the caller does not supply one.
    pub default_timeout_secs: u64,

    /// Accepted on requests for forward compatibility. Not enforced by
    /// either backend.
    pub default_memory_mb: u64,

    /// Truncate captured harness stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Interpreter the local backend spawns for harness files.
    pub python_bin: String,

    pub runner: RunnerClientConfig,
}

/// Remote runner service endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerClientConfig {
    /// URL of the runner service `/run` endpoint.
    pub url: String,

    /// Added to the execution timeout to form the transport deadline, so a
    /// hung runner is classified as unavailable instead of hanging the
    /// caller. Must be > 0 to keep the transport deadline strictly above
    /// the execution timeout.
    pub request_timeout_margin_secs: u64,
}

impl Default for RunnerClientConfig {
    fn default() -> Self {
        Self {
            url: "http://sandbox-runner:5000/run".to_string(),
            request_timeout_margin_secs: 5,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_script_bytes: 200 * 1024,
            max_function_defs: 100,
            default_timeout_secs: 5,
            default_memory_mb: 128,
            output_limit_bytes: 100_000,
            python_bin: "python3".to_string(),
            runner: RunnerClientConfig::default(),
        }
    }
}

impl SandboxConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_script_bytes == 0 {
            return Err(anyhow!("max_script_bytes must be > 0"));
        }
        if self.max_function_defs == 0 {
            return Err(anyhow!("max_function_defs must be > 0"));
        }
        if self.default_timeout_secs == 0 {
            return Err(anyhow!("default_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.python_bin.trim().is_empty() {
            return Err(anyhow!("python_bin must be a non-empty command"));
        }
        if self.runner.url.trim().is_empty() {
            return Err(anyhow!("runner.url must be a non-empty URL"));
        }
        if self.runner.request_timeout_margin_secs == 0 {
            return Err(anyhow!("runner.request_timeout_margin_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SandboxConfig::default()`.
pub fn load_config(path: &Path) -> Result<SandboxConfig> {
    if !path.exists() {
        let cfg = SandboxConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SandboxConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SandboxConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
