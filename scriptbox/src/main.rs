//! Scriptbox CLI: screen, wrap, and execute untrusted Python snippets.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use scriptbox::backend::{LocalBackend, RemoteBackend};
use scriptbox::config::{SandboxConfig, load_config};
use scriptbox::execute::{ExecRequest, Sandbox};
use scriptbox::exit_codes;
use scriptbox::harness::build_harness;
use scriptbox::logging;
use scriptbox::validate::Validator;

#[derive(Parser)]
#[command(
    name = "scriptbox",
    version,
    about = "Validated, harnessed execution of untrusted Python snippets"
)]
struct Cli {
    /// Path to a sandbox config TOML (defaults apply when missing).
    #[arg(long, global = true, default_value = "scriptbox.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Statically validate a script and report every issue found.
    Check {
        /// Path to the script file.
        script: PathBuf,
    },
    /// Print the generated harness source for a script (debugging aid).
    Harness {
        /// Path to the script file.
        script: PathBuf,
    },
    /// Execute a script through the full pipeline and print the response.
    Exec {
        /// Path to the script file.
        script: PathBuf,

        /// Execution timeout in seconds (defaults to the configured value).
        #[arg(long)]
        timeout: Option<u64>,

        /// Skip the remote runner and execute locally.
        #[arg(long)]
        local_only: bool,

        /// Override the configured runner URL.
        #[arg(long)]
        runner_url: Option<String>,

        /// Requested memory limit in MiB (accepted, not yet enforced).
        #[arg(long)]
        memory_limit_mb: Option<u64>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::Check { script } => cmd_check(&config, &script),
        Command::Harness { script } => cmd_harness(&script),
        Command::Exec {
            script,
            timeout,
            local_only,
            runner_url,
            memory_limit_mb,
        } => cmd_exec(config, &script, timeout, local_only, runner_url, memory_limit_mb),
    }
}

fn cmd_check(config: &SandboxConfig, script: &PathBuf) -> Result<i32> {
    let source = read_script(script)?;
    let report = Validator::from_config(config).validate(&source);
    if report.is_accepted() {
        println!("ok");
        return Ok(exit_codes::OK);
    }
    for issue in report.issues() {
        println!("{issue}");
    }
    Ok(exit_codes::REJECTED)
}

fn cmd_harness(script: &PathBuf) -> Result<i32> {
    let source = read_script(script)?;
    print!("{}", build_harness(&source));
    Ok(exit_codes::OK)
}

fn cmd_exec(
    mut config: SandboxConfig,
    script: &PathBuf,
    timeout: Option<u64>,
    local_only: bool,
    runner_url: Option<String>,
    memory_limit_mb: Option<u64>,
) -> Result<i32> {
    if let Some(url) = runner_url {
        config.runner.url = url;
    }
    let source = read_script(script)?;
    let timeout = Duration::from_secs(timeout.unwrap_or(config.default_timeout_secs));
    let mut request = ExecRequest::new(source, timeout);
    request.memory_limit_mb = memory_limit_mb.or(Some(config.default_memory_mb));

    let response = if local_only {
        let sandbox: Sandbox<RemoteBackend, LocalBackend> = Sandbox::local_only(
            Validator::from_config(&config),
            LocalBackend::from_config(&config),
        );
        sandbox.execute(&request)
    } else {
        Sandbox::from_config(&config).execute(&request)
    };

    let rendered =
        serde_json::to_string_pretty(&response).context("serialize execution response")?;
    println!("{rendered}");

    if response.error.is_none() {
        Ok(exit_codes::OK)
    } else if response
        .error
        .as_deref()
        .is_some_and(|error| error.starts_with("script validation failed"))
    {
        Ok(exit_codes::REJECTED)
    } else {
        Ok(exit_codes::EXECUTION_FAILED)
    }
}

fn read_script(path: &PathBuf) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read script {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_check() {
        let cli = Cli::parse_from(["scriptbox", "check", "script.py"]);
        assert!(matches!(cli.command, Command::Check { .. }));
    }

    #[test]
    fn parse_exec_with_overrides() {
        let cli = Cli::parse_from([
            "scriptbox",
            "exec",
            "script.py",
            "--timeout",
            "10",
            "--local-only",
            "--runner-url",
            "http://localhost:9000/run",
        ]);
        match cli.command {
            Command::Exec {
                timeout,
                local_only,
                runner_url,
                ..
            } => {
                assert_eq!(timeout, Some(10));
                assert!(local_only);
                assert_eq!(runner_url.as_deref(), Some("http://localhost:9000/run"));
            }
            _ => panic!("expected exec"),
        }
    }
}
