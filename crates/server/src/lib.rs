//! # ingest-server
//!
//! Thin HTTP boundary over [`ProgressService`].
//!
//! | Method | Path                                   | Purpose                     |
//! |--------|----------------------------------------|-----------------------------|
//! | POST   | `/ingest/progress`                     | Ingest one progress event   |
//! | POST   | `/ingest/runs`                         | Register a run at upload    |
//! | GET    | `/ingest/runs/{runId}`                 | Last published snapshot     |
//! | GET    | `/ingest/runs/{runId}/events`          | Page through the run's log  |
//! | GET    | `/ingest/runs/{runId}/stream`          | Live log entries over SSE   |
//! | GET    | `/ingest/users/{userId}/runs`          | The user's active run ids   |

pub mod error;
pub mod routes;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use ingest_core::config::models::ServerConfig;
use ingest_core::ingest::ProgressService;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use error::ApiError;

/// Builds the router serving `service`.
pub fn router(service: ProgressService) -> Router {
    Router::new()
        .route("/ingest/progress", post(routes::push_progress))
        .route("/ingest/runs", post(routes::register_run))
        .route("/ingest/runs/{run_id}", get(routes::get_run))
        .route("/ingest/runs/{run_id}/events", get(routes::get_run_events))
        .route("/ingest/runs/{run_id}/stream", get(routes::stream_run))
        .route("/ingest/users/{user_id}/runs", get(routes::get_user_runs))
        .with_state(service)
}

/// Serves on `config.bind` until ctrl-c.
pub async fn serve(config: &ServerConfig, service: ProgressService) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    serve_listener(listener, service, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(
    listener: TcpListener,
    service: ProgressService,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!(%addr, "Ingest progress server listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    info!("Ingest progress server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
