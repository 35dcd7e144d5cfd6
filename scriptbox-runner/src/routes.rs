//! HTTP route handlers for the runner service.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::Serialize;
use tracing::{error, info};

use scriptbox::backend::{ExecBackend, RunRequest, RunResponse};

/// Shared, read-only service state.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn ExecBackend + Send + Sync>,
    max_timeout_secs: u64,
}

impl AppState {
    pub fn new<B>(backend: B, max_timeout_secs: u64) -> Self
    where
        B: ExecBackend + Send + Sync + 'static,
    {
        Self {
            backend: Arc::new(backend),
            max_timeout_secs,
        }
    }
}

/// Build the service router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/run", post(run))
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// POST /run - execute a harness and return raw output.
///
/// The execution blocks a worker thread for up to the timeout, so it runs on
/// the blocking pool rather than the async executor.
async fn run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, (StatusCode, String)> {
    if request.harness.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "missing or empty 'harness'".to_string(),
        ));
    }

    let timeout = Duration::from_secs(request.timeout.clamp(1, state.max_timeout_secs));
    info!(
        harness_bytes = request.harness.len(),
        timeout_secs = timeout.as_secs(),
        "running harness"
    );

    let backend = state.backend.clone();
    let raw = tokio::task::spawn_blocking(move || backend.run(&request.harness, timeout))
        .await
        .map_err(|err| {
            error!(err = %err, "execution task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "runner internal error".to_string(),
            )
        })?
        .map_err(|err| {
            error!(err = %err, "backend error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        })?;

    Ok(Json(RunResponse {
        stdout: raw.stdout,
        stderr: raw.stderr,
        return_code: raw.exit_status,
    }))
}
