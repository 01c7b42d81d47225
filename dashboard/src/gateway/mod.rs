//! Remote pipeline gateway
//!
//! Every operation returns `Ok(value)` or `Err(GatewayError)` carrying a
//! human-readable message. No retries happen at this layer.

pub mod builds;
pub mod client;
pub mod http;
pub mod logs;
pub mod pipelines;

use async_trait::async_trait;

use crate::errors::GatewayResult;
use crate::models::pipeline::{Artifact, LogBundle, LogLocation, Pipeline};

pub use http::HttpGateway;

/// Operations against the upstream orchestration service
#[async_trait]
pub trait PipelineGateway: Send + Sync {
    /// List pipelines (names and versions only, no stages)
    async fn list_pipelines(&self) -> GatewayResult<Vec<Pipeline>>;

    /// Full stage/action structure without live status
    async fn get_pipeline_definition(&self, name: &str) -> GatewayResult<Pipeline>;

    /// Stage and action status, structurally parallel to the definition
    async fn get_pipeline_state(&self, name: &str) -> GatewayResult<Pipeline>;

    /// Start a new execution
    async fn start_execution(&self, pipeline_name: &str) -> GatewayResult<()>;

    /// Retry the failed actions of a stage
    async fn retry_stage(
        &self,
        pipeline_name: &str,
        stage_execution_id: &str,
        stage_name: &str,
    ) -> GatewayResult<()>;

    /// Source artifact of an execution (first revision only)
    async fn get_execution_artifact(
        &self,
        pipeline_name: &str,
        stage_execution_id: &str,
    ) -> GatewayResult<Artifact>;

    /// Log group and stream of a build
    async fn get_build_log_location(&self, build_id: &str) -> GatewayResult<LogLocation>;

    /// Formatted log lines of a stream
    async fn get_log_lines(&self, location: &LogLocation) -> GatewayResult<LogBundle>;
}
