//! Refresh controller for a single pipeline
//!
//! Owns the displayed snapshot of one pipeline and the loop that keeps it
//! fresh. Cycles never overlap: the next timer is armed only after the
//! previous fetch completed, so the effective period is the interval plus
//! the fetch latency.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::timed::CacheBucket;
use crate::controller::interval::IntervalPolicy;
use crate::controller::merge::merge_state;
use crate::errors::{GatewayError, GatewayResult};
use crate::gateway::PipelineGateway;
use crate::models::pipeline::{Artifact, Pipeline, Status};

/// Controller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Fast/slow polling intervals
    pub intervals: IntervalPolicy,

    /// How long a merged snapshot stays in the cache
    pub pipeline_ttl: Duration,

    /// How long a stage artifact stays in the cache
    pub artifact_ttl: Duration,

    /// Upper bound for the definition/state fetch pair
    pub fetch_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            intervals: IntervalPolicy::default(),
            pipeline_ttl: Duration::from_secs(10),
            artifact_ttl: Duration::from_secs(30),
            fetch_timeout: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, Clone)]
struct ControllerState {
    snapshot: Option<Pipeline>,
    refresh_interval: Duration,
    force_next_fetch: bool,
    is_loading: bool,
    last_refreshed_at: Option<DateTime<Utc>>,
    stale_since: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// What the view layer renders for one pipeline
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub pipeline: String,
    pub environment: String,
    pub snapshot: Option<Pipeline>,
    pub is_loading: bool,
    pub refresh_interval_ms: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Set when refreshes started failing after a good snapshot
    pub stale_since: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Refresh controller for one pipeline in one environment
pub struct PipelineController {
    name: String,
    environment: String,
    gateway: Arc<dyn PipelineGateway>,
    pipelines: CacheBucket<Pipeline>,
    artifacts: CacheBucket<Artifact>,
    options: Options,
    state: RwLock<ControllerState>,
    cancelled: AtomicBool,
    wake: Notify,
}

impl PipelineController {
    /// Create a controller; caches must be bound to the environment's bucket
    pub fn new(
        name: impl Into<String>,
        environment: impl Into<String>,
        gateway: Arc<dyn PipelineGateway>,
        pipelines: CacheBucket<Pipeline>,
        artifacts: CacheBucket<Artifact>,
        options: Options,
    ) -> Self {
        let state = ControllerState {
            snapshot: None,
            refresh_interval: options.intervals.idle,
            force_next_fetch: false,
            is_loading: true,
            last_refreshed_at: None,
            stale_since: None,
            last_error: None,
        };

        Self {
            name: name.into(),
            environment: environment.into(),
            gateway,
            pipelines,
            artifacts,
            options,
            state: RwLock::new(state),
            cancelled: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    /// Pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Environment name
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Fetch the merged pipeline, from the cache unless `force` is set
    pub async fn fetch_once(&self, force: bool) -> GatewayResult<Pipeline> {
        if !force {
            if let Some(cached) = self.pipelines.get(&self.name) {
                debug!("Pipeline {} served from cache", self.name);
                return Ok(cached);
            }
        }

        let fetch = async {
            tokio::join!(
                self.gateway.get_pipeline_definition(&self.name),
                self.gateway.get_pipeline_state(&self.name),
            )
        };
        let (definition, state) = match self.options.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| GatewayError::Timeout(limit))?,
            None => fetch.await,
        };

        let merged = match (definition, state) {
            (Ok(definition), Ok(state)) => merge_state(definition, &state),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
            (Err(e), Err(other)) => {
                debug!("State of {} also failed: {}", self.name, other);
                return Err(e);
            }
        };

        if !self.is_cancelled() {
            self.pipelines
                .set_with_ttl(self.name.clone(), merged.clone(), self.options.pipeline_ttl);
        }
        Ok(merged)
    }

    /// Run one refresh cycle, returning the snapshot it applied.
    ///
    /// A failed cycle keeps the previous snapshot. Results arriving after
    /// `shutdown` are discarded.
    pub async fn poll_once(&self) -> Option<Pipeline> {
        if self.is_cancelled() {
            return None;
        }

        let force = {
            let mut state = self.state.write().await;
            std::mem::take(&mut state.force_next_fetch)
        };

        let result = self.fetch_once(force).await;

        let mut state = self.state.write().await;
        if self.is_cancelled() {
            debug!("Discarding refresh of {} after shutdown", self.name);
            return None;
        }
        state.is_loading = false;

        match result {
            Ok(pipeline) => {
                let interval = self.options.intervals.next_interval(&pipeline);
                if interval != state.refresh_interval {
                    debug!(
                        "Refresh interval of {} changed to {:?}",
                        self.name, interval
                    );
                }
                state.refresh_interval = interval;
                state.snapshot = Some(pipeline.clone());
                state.last_refreshed_at = Some(Utc::now());
                state.stale_since = None;
                state.last_error = None;
                Some(pipeline)
            }
            Err(e) => {
                warn!(
                    "Failed to refresh pipeline {} in {}: {}",
                    self.name, self.environment, e
                );
                // A failed forced fetch is still forced on retry
                state.force_next_fetch |= force;
                if state.snapshot.is_some() && state.stale_since.is_none() {
                    state.stale_since = Some(Utc::now());
                }
                state.last_error = Some(e.message());
                None
            }
        }
    }

    /// Poll until shut down, sleeping the adaptive interval between cycles
    pub async fn run<S, F>(&self, sleep_fn: S)
    where
        S: Fn(Duration) -> F,
        F: Future<Output = ()>,
    {
        info!(
            "Refresh controller for {} ({}) starting...",
            self.name, self.environment
        );

        while !self.is_cancelled() {
            self.poll_once().await;

            if self.is_cancelled() {
                break;
            }

            let interval = self.refresh_interval().await;
            tokio::select! {
                _ = self.wake.notified() => {
                    debug!("Refresh of {} requested", self.name);
                }
                _ = sleep_fn(interval) => {}
            }
        }

        info!(
            "Refresh controller for {} ({}) stopped",
            self.name, self.environment
        );
    }

    /// Spawn the polling loop on the runtime
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            controller.run(tokio::time::sleep).await;
        })
    }

    /// Bypass the cache on the next cycle and run it now
    pub async fn force_refresh(&self) {
        self.state.write().await.force_next_fetch = true;
        self.wake.notify_one();
    }

    /// Start a new execution, then force a refresh whatever the outcome
    pub async fn restart(&self) -> GatewayResult<()> {
        info!("Restarting pipeline {} in {}", self.name, self.environment);

        let result = self.gateway.start_execution(&self.name).await;
        if let Err(e) = &result {
            error!("Failed to restart pipeline {}: {}", self.name, e);
        }

        self.force_refresh().await;
        result
    }

    /// Retry the failed actions of a failed stage, then force a refresh
    pub async fn retry_stage(&self, stage_name: &str) -> GatewayResult<()> {
        let execution_id = self.stage_execution_id(stage_name).await?;
        if self.stage_status(stage_name).await != Some(Status::Failed) {
            return Err(GatewayError::missing(format!(
                "stage {} has not failed",
                stage_name
            )));
        }
        info!(
            "Retrying stage {} of {} (execution {})",
            stage_name, self.name, execution_id
        );

        let result = self
            .gateway
            .retry_stage(&self.name, &execution_id, stage_name)
            .await;
        if let Err(e) = &result {
            error!(
                "Failed to retry stage {} of {}: {}",
                stage_name, self.name, e
            );
        }

        self.force_refresh().await;
        result
    }

    /// Artifact behind a stage's latest execution, cached briefly
    pub async fn stage_artifact(&self, stage_name: &str) -> GatewayResult<Artifact> {
        let execution_id = self.stage_execution_id(stage_name).await?;

        if let Some(artifact) = self.artifacts.get(&execution_id) {
            return Ok(artifact);
        }

        match self
            .gateway
            .get_execution_artifact(&self.name, &execution_id)
            .await
        {
            Ok(artifact) => {
                self.artifacts.set_with_ttl(
                    execution_id,
                    artifact.clone(),
                    self.options.artifact_ttl,
                );
                Ok(artifact)
            }
            Err(e) => {
                error!(
                    "Failed to get artifact of stage {} of {}: {}",
                    stage_name, self.name, e
                );
                Err(e)
            }
        }
    }

    async fn stage_status(&self, stage_name: &str) -> Option<Status> {
        let state = self.state.read().await;
        state
            .snapshot
            .as_ref()
            .and_then(|pipeline| pipeline.stage(stage_name))
            .and_then(|stage| stage.status)
    }

    async fn stage_execution_id(&self, stage_name: &str) -> GatewayResult<String> {
        let state = self.state.read().await;
        state
            .snapshot
            .as_ref()
            .and_then(|pipeline| pipeline.stage(stage_name))
            .and_then(|stage| stage.id.clone())
            .ok_or_else(|| {
                GatewayError::missing(format!(
                    "could not find an execution of stage {}",
                    stage_name
                ))
            })
    }

    /// Stop polling; in-flight results will not be applied
    pub fn shutdown(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("Shutting down refresh controller for {}", self.name);
        }
        self.wake.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> Option<Pipeline> {
        self.state.read().await.snapshot.clone()
    }

    /// Whether the first fetch is still outstanding
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.is_loading
    }

    /// Interval the next timer will be armed with
    pub async fn refresh_interval(&self) -> Duration {
        self.state.read().await.refresh_interval
    }

    /// Whether the next cycle bypasses the cache
    pub async fn is_force_pending(&self) -> bool {
        self.state.read().await.force_next_fetch
    }

    /// Everything the view needs in one read
    pub async fn status(&self) -> ControllerStatus {
        let state = self.state.read().await;
        ControllerStatus {
            pipeline: self.name.clone(),
            environment: self.environment.clone(),
            snapshot: state.snapshot.clone(),
            is_loading: state.is_loading,
            refresh_interval_ms: state.refresh_interval.as_millis() as u64,
            last_refreshed_at: state.last_refreshed_at,
            stale_since: state.stale_since,
            last_error: state.last_error.clone(),
        }
    }
}
