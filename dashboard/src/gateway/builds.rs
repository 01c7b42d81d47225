//! Build service calls

use pipeline_api::models::builds::{BatchGetBuildsInput, BatchGetBuildsOutput};

use crate::errors::{GatewayError, GatewayResult};
use crate::gateway::client::ServiceClient;
use crate::models::pipeline::LogLocation;

/// Failure message when a build has no log section
pub const LOG_DETAILS_MISSING: &str = "Could not find log details";

impl ServiceClient {
    /// Get builds by id
    pub async fn batch_get_builds(&self, ids: &[&str]) -> GatewayResult<BatchGetBuildsOutput> {
        self.call(
            "BatchGetBuilds",
            &BatchGetBuildsInput {
                ids: ids.iter().map(|id| id.to_string()).collect(),
            },
        )
        .await
    }
}

/// Log group and stream of the first build in a response
pub fn log_location_from_builds(output: BatchGetBuildsOutput) -> GatewayResult<LogLocation> {
    let logs = output
        .builds
        .and_then(|builds| builds.into_iter().next())
        .and_then(|build| build.logs)
        .ok_or_else(|| GatewayError::missing(LOG_DETAILS_MISSING))?;

    match (logs.group_name, logs.stream_name) {
        (Some(log_group), Some(log_stream)) => Ok(LogLocation {
            log_group,
            log_stream,
        }),
        _ => Err(GatewayError::missing(LOG_DETAILS_MISSING)),
    }
}
