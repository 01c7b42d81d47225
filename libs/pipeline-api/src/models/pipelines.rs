//! Pipeline service models

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Target prefix for pipeline service operations
pub const TARGET_PREFIX: &str = "CodePipeline_20150709";

/// List pipelines request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPipelinesInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// List pipelines response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPipelinesOutput {
    #[serde(default)]
    pub pipelines: Vec<PipelineSummary>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Pipeline summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    /// Epoch seconds
    #[serde(default)]
    pub created: Option<f64>,
    /// Epoch seconds
    #[serde(default)]
    pub updated: Option<f64>,
}

/// Get pipeline / get pipeline state request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineNameInput {
    pub name: String,
}

/// Get pipeline response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPipelineOutput {
    #[serde(default)]
    pub pipeline: Option<PipelineDeclaration>,
}

/// Pipeline structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDeclaration {
    pub name: String,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub stages: Vec<StageDeclaration>,
}

/// Stage structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageDeclaration {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<ActionDeclaration>,
}

/// Action structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDeclaration {
    pub name: String,
    pub action_type_id: ActionTypeId,
    /// Provider specific settings, e.g. `Repo` and `Branch` for source actions
    #[serde(default)]
    pub configuration: Option<HashMap<String, String>>,
    #[serde(default)]
    pub run_order: Option<i64>,
}

/// Action type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionTypeId {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub owner: String,
    pub provider: String,
    #[serde(default)]
    pub version: String,
}

/// Get pipeline state response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPipelineStateOutput {
    #[serde(default)]
    pub pipeline_name: Option<String>,
    #[serde(default)]
    pub pipeline_version: Option<i64>,
    #[serde(default)]
    pub stage_states: Vec<StageState>,
}

/// Live stage state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageState {
    #[serde(default)]
    pub stage_name: Option<String>,
    #[serde(default)]
    pub latest_execution: Option<StageExecution>,
    #[serde(default)]
    pub action_states: Vec<ActionState>,
}

/// Latest stage execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageExecution {
    pub pipeline_execution_id: String,
    pub status: String,
}

/// Live action state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionState {
    #[serde(default)]
    pub action_name: Option<String>,
    #[serde(default)]
    pub latest_execution: Option<ActionExecution>,
}

/// Latest action execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionExecution {
    #[serde(default)]
    pub action_execution_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Epoch seconds
    #[serde(default)]
    pub last_status_change: Option<f64>,
    #[serde(default)]
    pub external_execution_id: Option<String>,
    #[serde(default)]
    pub external_execution_url: Option<String>,
    #[serde(default)]
    pub error_details: Option<ErrorDetails>,
}

/// Failure details of an action execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Start execution response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPipelineExecutionOutput {
    #[serde(default)]
    pub pipeline_execution_id: Option<String>,
}

/// Which actions of a stage a retry re-runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageRetryMode {
    FailedActions,
    AllActions,
}

/// Retry stage request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStageExecutionInput {
    pub pipeline_name: String,
    pub stage_name: String,
    pub pipeline_execution_id: String,
    pub retry_mode: StageRetryMode,
}

/// Retry stage response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStageExecutionOutput {
    #[serde(default)]
    pub pipeline_execution_id: Option<String>,
}

/// Get pipeline execution request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPipelineExecutionInput {
    pub pipeline_name: String,
    pub pipeline_execution_id: String,
}

/// Get pipeline execution response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPipelineExecutionOutput {
    #[serde(default)]
    pub pipeline_execution: Option<PipelineExecution>,
}

/// Pipeline execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineExecution {
    #[serde(default)]
    pub pipeline_name: Option<String>,
    #[serde(default)]
    pub pipeline_version: Option<i64>,
    #[serde(default)]
    pub pipeline_execution_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub artifact_revisions: Option<Vec<ArtifactRevision>>,
}

/// Source revision that went into an execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRevision {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub revision_id: Option<String>,
    #[serde(default)]
    pub revision_change_identifier: Option<String>,
    #[serde(default)]
    pub revision_summary: Option<String>,
    /// Epoch seconds
    #[serde(default)]
    pub created: Option<f64>,
    #[serde(default)]
    pub revision_url: Option<String>,
}
