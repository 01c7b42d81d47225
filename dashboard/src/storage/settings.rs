//! Settings file management

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::app::options::{AppOptions, CacheOptions, ServerOptions};
use crate::controller::interval::IntervalPolicy;
use crate::controller::Options as ControllerOptions;
use crate::errors::DashboardError;
use crate::logs::{LogLevel, LogOptions};
use crate::models::environment::{Endpoints, Environment};

/// Settings file read when `--config` is not given
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/pipedash/settings.json";

/// Dashboard settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Environments to watch
    #[serde(default)]
    pub environments: Vec<EnvironmentSettings>,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Polling configuration
    #[serde(default)]
    pub refresh: RefreshSettings,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheSettings,
}

fn default_true() -> bool {
    true
}

/// One environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    pub name: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Explicit service endpoints; derived from the region when absent
    #[serde(default)]
    pub endpoints: Option<EndpointSettings>,

    /// Opaque bearer credential
    #[serde(default, skip_serializing)]
    pub credentials: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub pipelines: String,
    pub builds: String,
    pub logs: String,
}

impl EndpointSettings {
    /// Public endpoints of a region
    pub fn for_region(region: &str) -> Self {
        Self {
            pipelines: format!("https://codepipeline.{}.amazonaws.com", region),
            builds: format!("https://codebuild.{}.amazonaws.com", region),
            logs: format!("https://logs.{}.amazonaws.com", region),
        }
    }
}

impl EnvironmentSettings {
    /// Validate and build the runtime environment
    pub fn to_environment(&self) -> Result<Environment, DashboardError> {
        if self.name.trim().is_empty() {
            return Err(DashboardError::ConfigError(
                "environment name must not be empty".to_string(),
            ));
        }

        let endpoints = self
            .endpoints
            .clone()
            .unwrap_or_else(|| EndpointSettings::for_region(&self.region));

        for endpoint in [&endpoints.pipelines, &endpoints.builds, &endpoints.logs] {
            url::Url::parse(endpoint).map_err(|e| {
                DashboardError::ConfigError(format!(
                    "invalid endpoint {} for environment {}: {}",
                    endpoint, self.name, e
                ))
            })?;
        }

        Ok(Environment {
            name: self.name.clone(),
            region: self.region.clone(),
            endpoints: Endpoints {
                pipelines: endpoints.pipelines,
                builds: endpoints.builds,
                logs: endpoints.logs,
            },
            credentials: self.credentials.clone().map(SecretString::from),
        })
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// Interval while a stage is in progress
    #[serde(default = "default_active_interval")]
    pub active_interval_ms: u64,

    /// Interval otherwise
    #[serde(default = "default_idle_interval")]
    pub idle_interval_ms: u64,

    #[serde(default = "default_pipeline_ttl")]
    pub pipeline_ttl_secs: u64,

    #[serde(default = "default_artifact_ttl")]
    pub artifact_ttl_secs: u64,

    /// Bound on one definition/state fetch; 0 disables it
    #[serde(default = "default_timeout")]
    pub fetch_timeout_secs: u64,

    /// Bound on a single upstream request
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_active_interval() -> u64 {
    5_000
}

fn default_idle_interval() -> u64 {
    60_000
}

fn default_pipeline_ttl() -> u64 {
    10
}

fn default_artifact_ttl() -> u64 {
    30
}

fn default_timeout() -> u64 {
    30
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            active_interval_ms: default_active_interval(),
            idle_interval_ms: default_idle_interval(),
            pipeline_ttl_secs: default_pipeline_ttl(),
            artifact_ttl_secs: default_artifact_ttl(),
            fetch_timeout_secs: default_timeout(),
            request_timeout_secs: default_timeout(),
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Freshness applied to entries written without their own TTL
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_ms: u64,

    /// Maximum entries per bucket
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_ttl() -> u64 {
    1_000
}

fn default_cache_capacity() -> usize {
    500
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_cache_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

impl Settings {
    /// Logging options from these settings
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            json_format: self.log_json,
            ..Default::default()
        }
    }

    /// Validate and build the application options
    pub fn to_app_options(&self) -> Result<AppOptions, DashboardError> {
        if self.environments.is_empty() {
            return Err(DashboardError::ConfigError(
                "no environments configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut environments = Vec::with_capacity(self.environments.len());
        for settings in &self.environments {
            if !seen.insert(settings.name.as_str()) {
                return Err(DashboardError::ConfigError(format!(
                    "duplicate environment {}",
                    settings.name
                )));
            }
            environments.push(settings.to_environment()?);
        }

        let refresh = &self.refresh;
        if refresh.active_interval_ms == 0 || refresh.idle_interval_ms == 0 {
            return Err(DashboardError::ConfigError(
                "refresh intervals must be positive".to_string(),
            ));
        }

        Ok(AppOptions {
            environments,
            enable_server: self.server.enabled,
            server: ServerOptions {
                host: self.server.host.clone(),
                port: self.server.port,
            },
            controller: ControllerOptions {
                intervals: IntervalPolicy {
                    active: Duration::from_millis(refresh.active_interval_ms),
                    idle: Duration::from_millis(refresh.idle_interval_ms),
                },
                pipeline_ttl: Duration::from_secs(refresh.pipeline_ttl_secs),
                artifact_ttl: Duration::from_secs(refresh.artifact_ttl_secs),
                fetch_timeout: (refresh.fetch_timeout_secs > 0)
                    .then(|| Duration::from_secs(refresh.fetch_timeout_secs)),
            },
            caches: CacheOptions {
                default_ttl: Duration::from_millis(self.cache.default_ttl_ms),
                capacity: self.cache.capacity.max(1),
            },
            request_timeout: Duration::from_secs(refresh.request_timeout_secs.max(1)),
            ..Default::default()
        })
    }
}
