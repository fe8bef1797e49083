//! HTTP trigger surface.
//!
//! - `GET /` → 204, liveness only.
//! - `GET|POST /rebalance` → runs one full cycle on a blocking worker.
//!   204 on success, 500 with `{"error": ..., "kind": ...}` on failure,
//!   409 while another cycle is in flight.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use log::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::execution::{self, RebalanceReport, RunOptions};
use crate::flight::SingleFlight;

/// Runs one rebalance cycle. Called on a blocking thread.
pub type Runner = Arc<dyn Fn() -> Result<RebalanceReport> + Send + Sync>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    flight: SingleFlight,
    runner: Runner,
}

impl AppState {
    pub fn new(runner: Runner) -> Self {
        Self {
            flight: SingleFlight::new(),
            runner,
        }
    }

    /// Production state: each trigger connects, downloads and rebalances
    /// without prompting.
    pub fn live(config: Config) -> Self {
        Self::new(Arc::new(move || {
            let opts = RunOptions {
                force: true,
                ..RunOptions::new("http")
            };
            execution::run_live(&config, &opts)
        }))
    }

    pub fn flight(&self) -> &SingleFlight {
        &self.flight
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/rebalance", get(rebalance).post(rebalance))
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");
    axum::serve(listener, router(state)).await
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn rebalance(State(state): State<AppState>) -> Response {
    let guard = match state.flight.try_acquire() {
        Ok(g) => g,
        Err(e) => {
            info!("Rejected rebalance trigger: {e}");
            return error_response(StatusCode::CONFLICT, &e);
        }
    };

    let runner = Arc::clone(&state.runner);
    let joined = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        runner()
    })
    .await;

    match joined {
        Ok(Ok(report)) => {
            info!(
                "Rebalance finished: {} cancelled, {} closed, {} submitted",
                report.cancelled.len(),
                report.closed.len(),
                report.submitted.len()
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(Err(e)) => {
            error!("Rebalance failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
        Err(join_err) => {
            error!("Rebalance task did not complete: {join_err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": join_err.to_string(), "kind": "panic" })),
            )
                .into_response()
        }
    }
}

fn error_response(status: StatusCode, e: &Error) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": e.to_string(), "kind": e.kind() })),
    )
        .into_response()
}
