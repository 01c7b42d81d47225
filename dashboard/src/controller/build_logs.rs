//! On-demand build log retrieval
//!
//! Logs are never cached and never retried. A failure at either step is
//! logged and yields nothing, so the log surface simply stays empty.

use tracing::{debug, error};

use crate::gateway::PipelineGateway;
use crate::models::pipeline::LogBundle;

/// Resolve a build's log stream and fetch its lines
pub async fn fetch_build_logs(gateway: &dyn PipelineGateway, build_id: &str) -> Option<LogBundle> {
    let location = match gateway.get_build_log_location(build_id).await {
        Ok(location) => location,
        Err(e) => {
            error!("Failed to locate logs of build {}: {}", build_id, e);
            return None;
        }
    };

    match gateway.get_log_lines(&location).await {
        Ok(bundle) => {
            debug!(
                "Fetched {} log lines of build {} from {}/{}",
                bundle.lines.len(),
                build_id,
                bundle.log_group,
                bundle.log_stream
            );
            Some(bundle)
        }
        Err(e) => {
            error!("Failed to fetch logs of build {}: {}", build_id, e);
            None
        }
    }
}
