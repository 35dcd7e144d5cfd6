//! Runner service: executes scriptbox harnesses on request.
//!
//! This is the process intended to live inside the isolation boundary
//! (container, nsjail, or similar) in production. It accepts harness source
//! over HTTP, runs it through the same local process backend the
//! orchestrator uses for fallback, and returns raw stdout/stderr/return
//! code. It performs no validation; the API side screens scripts before
//! they get here.

mod routes;

use std::net::SocketAddr;

use clap::Parser;
use tracing::info;

use scriptbox::backend::LocalBackend;

use crate::routes::AppState;

#[derive(Parser)]
#[command(name = "scriptbox-runner")]
#[command(about = "Execution service for scriptbox harnesses")]
struct Args {
    /// Address to bind the server to.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "5000")]
    port: u16,

    /// Interpreter to spawn for harness files.
    #[arg(long, default_value = "python3")]
    python_bin: String,

    /// Truncate captured harness output beyond this many bytes.
    #[arg(long, default_value = "100000")]
    output_limit_bytes: usize,

    /// Reject requests asking for more than this many seconds.
    #[arg(long, default_value = "60")]
    max_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scriptbox_runner=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let state = AppState::new(
        LocalBackend::new(args.python_bin, args.output_limit_bytes),
        args.max_timeout_secs,
    );
    let app = routes::router().with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(%addr, "starting scriptbox-runner");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
