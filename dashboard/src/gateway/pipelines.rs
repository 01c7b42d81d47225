//! Pipeline service calls and their mapping onto domain models

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use pipeline_api::models::pipelines::{
    ActionDeclaration, ActionExecution, GetPipelineExecutionInput, GetPipelineExecutionOutput,
    GetPipelineOutput, GetPipelineStateOutput, ListPipelinesInput, ListPipelinesOutput,
    PipelineDeclaration, PipelineNameInput, PipelineSummary, RetryStageExecutionInput,
    RetryStageExecutionOutput, StageRetryMode, StartPipelineExecutionOutput,
};
use tracing::{debug, warn};

use crate::errors::{GatewayError, GatewayResult};
use crate::gateway::client::ServiceClient;
use crate::models::pipeline::{Action, Artifact, Pipeline, Stage, Status};

/// Failure message when an execution carries no artifact revisions
pub const EXECUTION_DETAILS_MISSING: &str = "could not find execution details";

/// Upper bound on listing pages fetched in one call
pub const MAX_LIST_PAGES: usize = 100;

impl ServiceClient {
    /// List every pipeline, following pagination tokens
    pub async fn list_pipeline_summaries(&self) -> GatewayResult<Vec<PipelineSummary>> {
        let mut summaries = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut next_token = None;

        for page_number in 1..=MAX_LIST_PAGES {
            let page: ListPipelinesOutput = self
                .call("ListPipelines", &ListPipelinesInput { next_token })
                .await?;
            summaries.extend(page.pipelines);

            match page.next_token {
                Some(token) if !token.is_empty() => {
                    if !seen_tokens.insert(token.clone()) {
                        warn!(
                            "Pipeline listing returned token {} twice, stopping after {} pages",
                            token, page_number
                        );
                        break;
                    }
                    if page_number == MAX_LIST_PAGES {
                        warn!(
                            "Pipeline listing still paginating after {} pages, stopping",
                            MAX_LIST_PAGES
                        );
                    }
                    next_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(summaries)
    }

    /// Get the structural definition of a pipeline
    pub async fn get_pipeline(&self, name: &str) -> GatewayResult<GetPipelineOutput> {
        self.call(
            "GetPipeline",
            &PipelineNameInput {
                name: name.to_string(),
            },
        )
        .await
    }

    /// Get the live state of a pipeline
    pub async fn get_pipeline_state(&self, name: &str) -> GatewayResult<GetPipelineStateOutput> {
        self.call(
            "GetPipelineState",
            &PipelineNameInput {
                name: name.to_string(),
            },
        )
        .await
    }

    /// Start a new execution, returning its id when the service reports one
    pub async fn start_pipeline_execution(&self, name: &str) -> GatewayResult<Option<String>> {
        let output: StartPipelineExecutionOutput = self
            .call(
                "StartPipelineExecution",
                &PipelineNameInput {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(output.pipeline_execution_id)
    }

    /// Retry a stage of an execution
    pub async fn retry_stage_execution(
        &self,
        input: &RetryStageExecutionInput,
    ) -> GatewayResult<RetryStageExecutionOutput> {
        self.call("RetryStageExecution", input).await
    }

    /// Get one pipeline execution
    pub async fn get_pipeline_execution(
        &self,
        pipeline_name: &str,
        execution_id: &str,
    ) -> GatewayResult<GetPipelineExecutionOutput> {
        self.call(
            "GetPipelineExecution",
            &GetPipelineExecutionInput {
                pipeline_name: pipeline_name.to_string(),
                pipeline_execution_id: execution_id.to_string(),
            },
        )
        .await
    }
}

/// Build a retry request that re-runs only the failed actions
pub fn failed_actions_retry(
    pipeline_name: &str,
    stage_execution_id: &str,
    stage_name: &str,
) -> RetryStageExecutionInput {
    RetryStageExecutionInput {
        pipeline_name: pipeline_name.to_string(),
        stage_name: stage_name.to_string(),
        pipeline_execution_id: stage_execution_id.to_string(),
        retry_mode: StageRetryMode::FailedActions,
    }
}

/// Map a listing entry; entries without a name are skipped
pub fn pipeline_from_summary(summary: PipelineSummary) -> Option<Pipeline> {
    let name = summary.name?;
    Some(Pipeline::summary(name, summary.version.unwrap_or_default()))
}

/// Map a definition: structure only, no live status
pub fn pipeline_from_definition(output: GetPipelineOutput, requested: &str) -> GatewayResult<Pipeline> {
    let declaration: PipelineDeclaration = output
        .pipeline
        .ok_or_else(|| GatewayError::missing(format!("could not find pipeline {}", requested)))?;

    Ok(Pipeline {
        name: declaration.name,
        version: declaration.version.unwrap_or_default(),
        stages: declaration
            .stages
            .into_iter()
            .map(|stage| Stage {
                actions: stage.actions.into_iter().map(action_from_declaration).collect(),
                ..Stage::new(stage.name)
            })
            .collect(),
    })
}

fn action_from_declaration(declaration: ActionDeclaration) -> Action {
    let setting = |key: &str| {
        declaration
            .configuration
            .as_ref()
            .and_then(|config| config.get(key).cloned())
    };

    Action {
        branch: setting("Branch"),
        repo: setting("Repo"),
        action_type: Some(declaration.action_type_id.provider.clone()),
        ..Action::new(declaration.name.clone())
    }
}

/// Map live state: names, ids and statuses only
pub fn pipeline_from_state(output: GetPipelineStateOutput, requested: &str) -> Pipeline {
    Pipeline {
        name: output
            .pipeline_name
            .unwrap_or_else(|| requested.to_string()),
        version: output.pipeline_version.unwrap_or_default(),
        stages: output
            .stage_states
            .into_iter()
            .map(|state| {
                let (id, status) = match state.latest_execution {
                    Some(execution) => (
                        Some(execution.pipeline_execution_id),
                        Status::from_wire(&execution.status),
                    ),
                    None => (None, Status::Unknown),
                };

                Stage {
                    name: state.stage_name.unwrap_or_default(),
                    id,
                    status: Some(status),
                    actions: state
                        .action_states
                        .into_iter()
                        .map(|action| {
                            let execution = action.latest_execution.as_ref();
                            Action {
                                id: execution.and_then(|e| e.external_execution_id.clone()),
                                status: Some(
                                    execution
                                        .and_then(|e| e.status.as_deref())
                                        .map(Status::from_wire)
                                        .unwrap_or(Status::Unknown),
                                ),
                                details: execution_details(execution),
                                status_time: execution
                                    .and_then(|e| e.last_status_change)
                                    .and_then(epoch_seconds_to_datetime),
                                ..Action::new(action.action_name.unwrap_or_default())
                            }
                        })
                        .collect(),
                }
            })
            .collect(),
    }
}

/// Error message of a failed execution, summary otherwise
fn execution_details(execution: Option<&ActionExecution>) -> Option<String> {
    let execution = execution?;
    if execution.status.as_deref() == Some("Failed") {
        return execution
            .error_details
            .as_ref()
            .and_then(|details| details.message.clone());
    }
    execution.summary.clone()
}

/// Take the first artifact revision of an execution.
///
/// Executions with several source revisions are not disambiguated; the
/// rest are dropped.
pub fn artifact_from_execution(output: GetPipelineExecutionOutput) -> GatewayResult<Artifact> {
    let revisions = output
        .pipeline_execution
        .and_then(|execution| execution.artifact_revisions)
        .unwrap_or_default();

    if revisions.len() > 1 {
        debug!(
            "Execution has {} artifact revisions, using the first",
            revisions.len()
        );
    }

    let revision = revisions
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::missing(EXECUTION_DETAILS_MISSING))?;

    Ok(Artifact {
        name: revision.name.unwrap_or_default(),
        id: revision.revision_id.unwrap_or_default(),
        summary: revision.revision_summary,
        url: revision.revision_url,
    })
}

/// Convert an epoch-seconds wire timestamp
pub fn epoch_seconds_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
}
