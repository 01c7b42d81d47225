//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DashboardError;
use crate::server::handlers::{
    artifact_handler, build_logs_handler, environments_handler, health_handler,
    pipeline_handler, pipelines_handler, refresh_handler, reload_handler, restart_handler,
    retry_stage_handler, version_handler,
};
use crate::server::state::ServerState;

/// Routes of the view API
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Environments
        .route("/environments", get(environments_handler))
        .route("/environments/{env}/reload", post(reload_handler))
        // Pipelines
        .route("/environments/{env}/pipelines", get(pipelines_handler))
        .route("/environments/{env}/pipelines/{name}", get(pipeline_handler))
        .route(
            "/environments/{env}/pipelines/{name}/refresh",
            post(refresh_handler),
        )
        .route(
            "/environments/{env}/pipelines/{name}/restart",
            post(restart_handler),
        )
        .route(
            "/environments/{env}/pipelines/{name}/stages/{stage}/retry",
            post(retry_stage_handler),
        )
        .route(
            "/environments/{env}/pipelines/{name}/stages/{stage}/artifact",
            get(artifact_handler),
        )
        // Builds
        .route("/environments/{env}/builds/{id}/logs", get(build_logs_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DashboardError>>, DashboardError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DashboardError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DashboardError::ServerError(e.to_string()))
    });

    Ok(handle)
}
