//! API models

use serde::{Deserialize, Serialize};

pub mod builds;
pub mod logs;
pub mod pipelines;

/// Error body returned by every upstream service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Fully qualified error type, e.g. `com.amazon.x#PipelineNotFoundException`
    #[serde(rename = "__type", default)]
    pub error_type: Option<String>,

    /// Human-readable message
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Short error type without the namespace prefix
    pub fn short_type(&self) -> Option<&str> {
        self.error_type
            .as_deref()
            .map(|t| t.rsplit('#').next().unwrap_or(t))
    }
}
