//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controller::{ControllerStatus, PipelineController};
use crate::errors::GatewayError;
use crate::models::pipeline::Artifact;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error body returned by every failing handler
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Handler failure with its status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        let status = if e.is_missing_data() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self {
            status,
            message: e.message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "pipedash".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub name: String,
    pub region: String,
    pub is_loading: bool,
    pub pipelines: usize,
}

/// Configured environments
pub async fn environments_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let mut environments = Vec::with_capacity(state.app_state.dashboards.len());
    for dashboard in state.app_state.dashboards.values() {
        environments.push(EnvironmentInfo {
            name: dashboard.environment().name.clone(),
            region: dashboard.environment().region.clone(),
            is_loading: dashboard.is_loading(),
            pipelines: dashboard.search("").await.len(),
        });
    }
    Json(environments)
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// One row of the pipeline list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRow {
    pub name: String,
    pub version: i64,
    pub is_loading: bool,
    pub is_in_progress: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub stale_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelinesResponse {
    pub environment: String,
    pub is_loading: bool,
    pub pipelines: Vec<PipelineRow>,
}

/// Listed pipelines matching `?search=`
pub async fn pipelines_handler(
    State(state): State<Arc<ServerState>>,
    Path(environment): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PipelinesResponse>, ApiError> {
    let dashboard = state.dashboard(&environment)?;
    let text = query.search.unwrap_or_default();

    let mut pipelines = Vec::new();
    for pipeline in dashboard.search(&text).await {
        let status = match dashboard.controller(&pipeline.name).await {
            Some(controller) => Some(controller.status().await),
            None => None,
        };
        let snapshot = status.as_ref().and_then(|s| s.snapshot.as_ref());

        pipelines.push(PipelineRow {
            version: snapshot.map(|p| p.version).unwrap_or(pipeline.version),
            is_loading: status.as_ref().map(|s| s.is_loading).unwrap_or(true),
            is_in_progress: snapshot.map(|p| p.is_in_progress()).unwrap_or(false),
            last_refreshed_at: status.as_ref().and_then(|s| s.last_refreshed_at),
            stale_since: status.as_ref().and_then(|s| s.stale_since),
            name: pipeline.name,
        });
    }

    Ok(Json(PipelinesResponse {
        environment,
        is_loading: dashboard.is_loading(),
        pipelines,
    }))
}

async fn controller_of(
    state: &ServerState,
    environment: &str,
    name: &str,
) -> Result<Arc<PipelineController>, ApiError> {
    state
        .dashboard(environment)?
        .controller(name)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Unknown pipeline: {}", name)))
}

/// Controller status of one pipeline
pub async fn pipeline_handler(
    State(state): State<Arc<ServerState>>,
    Path((environment, name)): Path<(String, String)>,
) -> Result<Json<ControllerStatus>, ApiError> {
    let controller = controller_of(&state, &environment, &name).await?;
    Ok(Json(controller.status().await))
}

/// Outcome of a triggered action
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    fn from_result(result: Result<(), GatewayError>, done: String) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                message: done,
            },
            Err(e) => Self {
                success: false,
                message: e.message(),
            },
        }
    }
}

/// Force a refresh bypassing the cache
pub async fn refresh_handler(
    State(state): State<Arc<ServerState>>,
    Path((environment, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let controller = controller_of(&state, &environment, &name).await?;
    controller.force_refresh().await;
    Ok((
        StatusCode::ACCEPTED,
        Json(ActionResponse {
            success: true,
            message: format!("Refresh of {} requested", name),
        }),
    ))
}

/// Start a new execution
pub async fn restart_handler(
    State(state): State<Arc<ServerState>>,
    Path((environment, name)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    let controller = controller_of(&state, &environment, &name).await?;
    let result = controller.restart().await;
    Ok(Json(ActionResponse::from_result(
        result,
        format!("Restarted {}", name),
    )))
}

/// Retry the failed actions of a stage
pub async fn retry_stage_handler(
    State(state): State<Arc<ServerState>>,
    Path((environment, name, stage)): Path<(String, String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    let controller = controller_of(&state, &environment, &name).await?;
    let result = controller.retry_stage(&stage).await;
    Ok(Json(ActionResponse::from_result(
        result,
        format!("Retried stage {} of {}", stage, name),
    )))
}

/// Source artifact of a stage's latest execution
pub async fn artifact_handler(
    State(state): State<Arc<ServerState>>,
    Path((environment, name, stage)): Path<(String, String, String)>,
) -> Result<Json<Artifact>, ApiError> {
    let controller = controller_of(&state, &environment, &name).await?;
    Ok(Json(controller.stage_artifact(&stage).await?))
}

/// Preformatted build log; empty when it cannot be fetched
pub async fn build_logs_handler(
    State(state): State<Arc<ServerState>>,
    Path((environment, build_id)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let dashboard = state.dashboard(&environment)?;
    let body = dashboard
        .build_logs(&build_id)
        .await
        .map(|bundle| bundle.to_preformatted())
        .unwrap_or_default();
    debug!("Serving {} bytes of logs for build {}", body.len(), build_id);
    Ok(body)
}

/// Rebuild every controller of an environment
pub async fn reload_handler(
    State(state): State<Arc<ServerState>>,
    Path(environment): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    let dashboard = state.dashboard(&environment)?;
    let result = dashboard.reload().await.map(|listed| listed.len());
    Ok(Json(match result {
        Ok(count) => ActionResponse {
            success: true,
            message: format!("Reloaded {} pipelines", count),
        },
        Err(e) => ActionResponse {
            success: false,
            message: e.message(),
        },
    }))
}
