//! Application state

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::dashboard::Dashboard;
use crate::app::options::CacheOptions;
use crate::cache::timed::TimedCache;
use crate::controller::Options as ControllerOptions;
use crate::errors::DashboardError;
use crate::gateway::{HttpGateway, PipelineGateway};
use crate::models::environment::Environment;
use crate::models::pipeline::{Artifact, Pipeline};

/// Application caches, one bucket per environment in each
pub struct Caches {
    pub pipelines: Arc<TimedCache<Pipeline>>,
    pub artifacts: Arc<TimedCache<Artifact>>,
}

impl Caches {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            pipelines: Arc::new(TimedCache::new(options.default_ttl, options.capacity)),
            artifacts: Arc::new(TimedCache::new(options.default_ttl, options.capacity)),
        }
    }

    /// Drop expired entries from every cache
    pub fn purge_expired(&self) -> usize {
        self.pipelines.purge_expired() + self.artifacts.purge_expired()
    }
}

/// Main application state
pub struct AppState {
    /// Dashboards keyed by environment name
    pub dashboards: BTreeMap<String, Arc<Dashboard>>,

    /// Application caches
    pub caches: Arc<Caches>,
}

impl AppState {
    /// Build a dashboard backed by the HTTP gateway for every environment
    pub fn init(
        environments: &[Environment],
        request_timeout: Duration,
        controller: &ControllerOptions,
        caches: CacheOptions,
        spawn_controllers: bool,
    ) -> Result<Self, DashboardError> {
        info!("Initializing application state...");

        let mut gateways: Vec<(Environment, Arc<dyn PipelineGateway>)> =
            Vec::with_capacity(environments.len());
        for environment in environments {
            let gateway = HttpGateway::new(environment, request_timeout)?;
            gateways.push((environment.clone(), Arc::new(gateway)));
        }

        Ok(Self::with_gateways(
            gateways,
            controller,
            caches,
            spawn_controllers,
        ))
    }

    /// Build dashboards over the given gateways
    pub fn with_gateways(
        gateways: Vec<(Environment, Arc<dyn PipelineGateway>)>,
        controller: &ControllerOptions,
        caches: CacheOptions,
        spawn_controllers: bool,
    ) -> Self {
        let caches = Arc::new(Caches::new(caches));

        let dashboards = gateways
            .into_iter()
            .map(|(environment, gateway)| {
                let name = environment.name.clone();
                let dashboard = Dashboard::new(
                    environment,
                    gateway,
                    caches.pipelines.bucket(name.clone()),
                    caches.artifacts.bucket(name.clone()),
                    controller.clone(),
                    spawn_controllers,
                );
                (name, Arc::new(dashboard))
            })
            .collect();

        Self { dashboards, caches }
    }

    /// Dashboard of an environment
    pub fn dashboard(&self, environment: &str) -> Result<&Arc<Dashboard>, DashboardError> {
        self.dashboards
            .get(environment)
            .ok_or_else(|| DashboardError::UnknownEnvironment(environment.to_string()))
    }

    /// List pipelines in every environment; failures are logged and skipped
    pub async fn load_all(&self) {
        let loads = self.dashboards.values().map(|dashboard| dashboard.load());
        let results = futures::future::join_all(loads).await;

        for (environment, result) in self.dashboards.keys().zip(results) {
            if let Err(e) = result {
                warn!("Environment {} not loaded: {}", environment, e);
            }
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), DashboardError> {
        info!("Shutting down application state...");
        for dashboard in self.dashboards.values() {
            dashboard.shutdown().await;
        }
        self.caches.pipelines.clear();
        self.caches.artifacts.clear();
        Ok(())
    }
}
