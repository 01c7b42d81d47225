//! Per-environment dashboard
//!
//! Lists the environment's pipelines and keeps one refresh controller
//! mounted for each of them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::timed::CacheBucket;
use crate::controller::build_logs::fetch_build_logs;
use crate::controller::{Options as ControllerOptions, PipelineController};
use crate::errors::GatewayResult;
use crate::gateway::PipelineGateway;
use crate::models::environment::Environment;
use crate::models::pipeline::{Artifact, LogBundle, Pipeline};

struct Mounted {
    controller: Arc<PipelineController>,
    handle: Option<JoinHandle<()>>,
}

/// Dashboard of one environment
pub struct Dashboard {
    environment: Environment,
    gateway: Arc<dyn PipelineGateway>,
    pipeline_cache: CacheBucket<Pipeline>,
    artifact_cache: CacheBucket<Artifact>,
    options: ControllerOptions,
    spawn_controllers: bool,
    pipelines: RwLock<Vec<Pipeline>>,
    controllers: RwLock<HashMap<String, Mounted>>,
    is_loading: AtomicBool,
}

impl Dashboard {
    /// Create a dashboard. With `spawn_controllers` unset, mounted
    /// controllers are not polled in the background and are driven through
    /// [`Dashboard::poll_all`] instead.
    pub fn new(
        environment: Environment,
        gateway: Arc<dyn PipelineGateway>,
        pipeline_cache: CacheBucket<Pipeline>,
        artifact_cache: CacheBucket<Artifact>,
        options: ControllerOptions,
        spawn_controllers: bool,
    ) -> Self {
        Self {
            environment,
            gateway,
            pipeline_cache,
            artifact_cache,
            options,
            spawn_controllers,
            pipelines: RwLock::new(Vec::new()),
            controllers: RwLock::new(HashMap::new()),
            is_loading: AtomicBool::new(false),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn gateway(&self) -> &Arc<dyn PipelineGateway> {
        &self.gateway
    }

    /// Whether a listing is outstanding
    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::SeqCst)
    }

    /// List the environment's pipelines and mount a controller for each.
    ///
    /// Controllers of pipelines no longer listed are unmounted. A failed
    /// listing keeps the previous list and controllers.
    pub async fn load(&self) -> GatewayResult<Vec<Pipeline>> {
        self.is_loading.store(true, Ordering::SeqCst);
        let result = self.gateway.list_pipelines().await;
        self.is_loading.store(false, Ordering::SeqCst);

        let listed = match result {
            Ok(listed) => listed,
            Err(e) => {
                warn!(
                    "Failed to list pipelines of {}: {}",
                    self.environment.name, e
                );
                return Err(e);
            }
        };

        let names: HashSet<&str> = listed.iter().map(|p| p.name.as_str()).collect();
        let gone: Vec<String> = self
            .controllers
            .read()
            .await
            .keys()
            .filter(|name| !names.contains(name.as_str()))
            .cloned()
            .collect();
        for name in gone {
            self.unmount(&name).await;
        }

        for pipeline in &listed {
            self.mount(&pipeline.name).await;
        }

        info!(
            "Loaded {} pipelines in {}",
            listed.len(),
            self.environment.name
        );
        *self.pipelines.write().await = listed.clone();
        Ok(listed)
    }

    /// Listed pipelines whose name contains `text`; empty text matches all
    pub async fn search(&self, text: &str) -> Vec<Pipeline> {
        self.pipelines
            .read()
            .await
            .iter()
            .filter(|p| p.name.contains(text))
            .cloned()
            .collect()
    }

    /// Mount a controller for `name`, returning the existing one if mounted
    pub async fn mount(&self, name: &str) -> Arc<PipelineController> {
        let mut controllers = self.controllers.write().await;
        if let Some(mounted) = controllers.get(name) {
            return mounted.controller.clone();
        }

        debug!("Mounting controller for {} in {}", name, self.environment.name);
        let controller = Arc::new(PipelineController::new(
            name,
            self.environment.name.clone(),
            self.gateway.clone(),
            self.pipeline_cache.clone(),
            self.artifact_cache.clone(),
            self.options.clone(),
        ));
        let handle = self.spawn_controllers.then(|| controller.spawn());

        controllers.insert(
            name.to_string(),
            Mounted {
                controller: controller.clone(),
                handle,
            },
        );
        controller
    }

    /// Stop and drop the controller for `name`
    pub async fn unmount(&self, name: &str) -> bool {
        let removed = self.controllers.write().await.remove(name);
        match removed {
            Some(mounted) => {
                debug!("Unmounting controller for {} in {}", name, self.environment.name);
                stop(mounted).await;
                true
            }
            None => false,
        }
    }

    /// Mounted controller for `name`
    pub async fn controller(&self, name: &str) -> Option<Arc<PipelineController>> {
        self.controllers
            .read()
            .await
            .get(name)
            .map(|mounted| mounted.controller.clone())
    }

    /// Mounted controllers sorted by pipeline name
    pub async fn controllers(&self) -> Vec<Arc<PipelineController>> {
        let mut controllers: Vec<_> = self
            .controllers
            .read()
            .await
            .values()
            .map(|mounted| mounted.controller.clone())
            .collect();
        controllers.sort_by(|a, b| a.name().cmp(b.name()));
        controllers
    }

    /// Run one refresh cycle on every mounted controller
    pub async fn poll_all(&self) -> Vec<Option<Pipeline>> {
        let controllers = self.controllers().await;
        futures::future::join_all(controllers.iter().map(|c| c.poll_once())).await
    }

    /// Tear every controller down and rebuild from a fresh listing.
    ///
    /// New controllers start from the idle interval with no snapshot.
    pub async fn reload(&self) -> GatewayResult<Vec<Pipeline>> {
        info!("Reloading dashboard of {}", self.environment.name);
        self.stop_all().await;
        self.pipelines.write().await.clear();
        self.load().await
    }

    /// Logs of a build, or nothing when they cannot be fetched
    pub async fn build_logs(&self, build_id: &str) -> Option<LogBundle> {
        fetch_build_logs(self.gateway.as_ref(), build_id).await
    }

    /// Stop every controller
    pub async fn shutdown(&self) {
        info!("Shutting down dashboard of {}", self.environment.name);
        self.stop_all().await;
    }

    async fn stop_all(&self) {
        let drained: Vec<Mounted> = self
            .controllers
            .write()
            .await
            .drain()
            .map(|(_, mounted)| mounted)
            .collect();
        for mounted in drained {
            stop(mounted).await;
        }
    }
}

async fn stop(mounted: Mounted) {
    mounted.controller.shutdown();
    if let Some(handle) = mounted.handle {
        // Results of an in-flight fetch are discarded anyway
        handle.abort();
        let _ = handle.await;
    }
}
