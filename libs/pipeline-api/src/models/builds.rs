//! Build service models

use serde::{Deserialize, Serialize};

/// Target prefix for build service operations
pub const TARGET_PREFIX: &str = "CodeBuild_20161006";

/// Batch get builds request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGetBuildsInput {
    pub ids: Vec<String>,
}

/// Batch get builds response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetBuildsOutput {
    #[serde(default)]
    pub builds: Option<Vec<Build>>,
    #[serde(default)]
    pub builds_not_found: Option<Vec<String>>,
}

/// A single build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub build_status: Option<String>,
    #[serde(default)]
    pub logs: Option<LogsLocation>,
}

/// Where a build wrote its logs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsLocation {
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub stream_name: Option<String>,
    #[serde(default)]
    pub deep_link: Option<String>,
}
