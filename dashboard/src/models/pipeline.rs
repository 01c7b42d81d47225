//! Pipeline models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider name of actions whose logs can be fetched
pub const BUILD_ACTION_TYPE: &str = "CodeBuild";

/// Execution status of a stage or action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Succeeded,
    Failed,
    InProgress,
    #[serde(other)]
    Unknown,
}

impl Status {
    /// Parse an upstream status string; anything unrecognised is `Unknown`
    pub fn from_wire(status: &str) -> Self {
        match status {
            "Succeeded" => Status::Succeeded,
            "Failed" => Status::Failed,
            "InProgress" => Status::InProgress,
            _ => Status::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Succeeded => "Succeeded",
            Status::Failed => "Failed",
            Status::InProgress => "InProgress",
            Status::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline with its stages.
///
/// Snapshots are produced by merging the structural definition with the
/// live state and are replaced wholesale, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Unique, stable pipeline name
    pub name: String,

    /// Definition version
    pub version: i64,

    /// Ordered stages
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// A pipeline known only by name and version, as returned by listings
    pub fn summary(name: impl Into<String>, version: i64) -> Self {
        Self {
            name: name.into(),
            version,
            stages: Vec::new(),
        }
    }

    /// Find a stage by name
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Whether any stage is currently running
    pub fn is_in_progress(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.status == Some(Status::InProgress))
    }
}

/// A stage of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,

    /// Latest pipeline execution id that ran this stage
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub status: Option<Status>,

    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            status: None,
            actions: Vec::new(),
        }
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// An action inside a stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,

    /// External execution id (build id for build actions)
    #[serde(default)]
    pub id: Option<String>,

    /// Action provider
    #[serde(default, rename = "type")]
    pub action_type: Option<String>,

    #[serde(default)]
    pub status: Option<Status>,

    /// Summary, or the error message of a failed execution
    #[serde(default)]
    pub details: Option<String>,

    #[serde(default)]
    pub status_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub repo: Option<String>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether build logs can be fetched for this action
    pub fn has_build_logs(&self) -> bool {
        self.action_type.as_deref() == Some(BUILD_ACTION_TYPE) && self.id.is_some()
    }
}

/// Source revision behind a stage's latest execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,

    /// Revision id
    pub id: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

/// Log group and stream of a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLocation {
    pub log_group: String,
    pub log_stream: String,
}

/// Formatted log lines of a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBundle {
    pub lines: Vec<String>,
    pub log_group: String,
    pub log_stream: String,
}

impl LogBundle {
    /// Concatenate lines as preformatted text.
    ///
    /// Upstream messages carry their own trailing newlines, so lines are
    /// joined without a separator.
    pub fn to_preformatted(&self) -> String {
        self.lines.concat()
    }
}
