//! Gateway backed by the upstream HTTP services

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use pipeline_api::models::{builds, logs, pipelines};
use tracing::{debug, info};

use crate::errors::GatewayResult;
use crate::gateway::builds::log_location_from_builds;
use crate::gateway::client::ServiceClient;
use crate::gateway::logs::bundle_from_events;
use crate::gateway::pipelines::{
    artifact_from_execution, failed_actions_retry, pipeline_from_definition,
    pipeline_from_state, pipeline_from_summary,
};
use crate::gateway::PipelineGateway;
use crate::models::environment::Environment;
use crate::models::pipeline::{Artifact, LogBundle, LogLocation, Pipeline};

/// Gateway for one environment
pub struct HttpGateway {
    pipelines: ServiceClient,
    builds: ServiceClient,
    logs: ServiceClient,
}

impl HttpGateway {
    /// Create clients for every service of an environment
    pub fn new(environment: &Environment, request_timeout: Duration) -> GatewayResult<Self> {
        let endpoints = &environment.endpoints;
        let credentials = environment.credentials.clone();

        Ok(Self {
            pipelines: ServiceClient::new(
                &endpoints.pipelines,
                pipelines::TARGET_PREFIX,
                credentials.clone(),
                request_timeout,
            )?,
            builds: ServiceClient::new(
                &endpoints.builds,
                builds::TARGET_PREFIX,
                credentials.clone(),
                request_timeout,
            )?,
            logs: ServiceClient::new(
                &endpoints.logs,
                logs::TARGET_PREFIX,
                credentials,
                request_timeout,
            )?,
        })
    }
}

#[async_trait]
impl PipelineGateway for HttpGateway {
    async fn list_pipelines(&self) -> GatewayResult<Vec<Pipeline>> {
        let summaries = self.pipelines.list_pipeline_summaries().await?;
        Ok(summaries
            .into_iter()
            .filter_map(pipeline_from_summary)
            .collect())
    }

    async fn get_pipeline_definition(&self, name: &str) -> GatewayResult<Pipeline> {
        let output = self.pipelines.get_pipeline(name).await?;
        pipeline_from_definition(output, name)
    }

    async fn get_pipeline_state(&self, name: &str) -> GatewayResult<Pipeline> {
        let output = self.pipelines.get_pipeline_state(name).await?;
        Ok(pipeline_from_state(output, name))
    }

    async fn start_execution(&self, pipeline_name: &str) -> GatewayResult<()> {
        let execution_id = self.pipelines.start_pipeline_execution(pipeline_name).await?;
        info!(
            "Started execution {} of {}",
            execution_id.as_deref().unwrap_or("<unknown>"),
            pipeline_name
        );
        Ok(())
    }

    async fn retry_stage(
        &self,
        pipeline_name: &str,
        stage_execution_id: &str,
        stage_name: &str,
    ) -> GatewayResult<()> {
        let input = failed_actions_retry(pipeline_name, stage_execution_id, stage_name);
        let output = self.pipelines.retry_stage_execution(&input).await?;
        debug!(
            "Retried stage {} of {} as execution {:?}",
            stage_name, pipeline_name, output.pipeline_execution_id
        );
        Ok(())
    }

    async fn get_execution_artifact(
        &self,
        pipeline_name: &str,
        stage_execution_id: &str,
    ) -> GatewayResult<Artifact> {
        let output = self
            .pipelines
            .get_pipeline_execution(pipeline_name, stage_execution_id)
            .await?;
        artifact_from_execution(output)
    }

    async fn get_build_log_location(&self, build_id: &str) -> GatewayResult<LogLocation> {
        let output = self.builds.batch_get_builds(&[build_id]).await?;
        log_location_from_builds(output)
    }

    async fn get_log_lines(&self, location: &LogLocation) -> GatewayResult<LogBundle> {
        let output = self.logs.get_log_events(location).await?;
        bundle_from_events(output, location, &Local)
    }
}
