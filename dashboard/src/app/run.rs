//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::{AppState, Caches};
use crate::errors::DashboardError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::cache_purge;

/// Run the dashboard until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DashboardError> {
    info!("Initializing pipedash...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start pipedash: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, DashboardError> {
    let app_state = init_app_state(options, shutdown_manager)?;

    init_cache_purge_worker(
        options.cache_purger.clone(),
        app_state.caches.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    if options.enable_server {
        init_server(
            options,
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )
        .await?;
    }

    app_state.load_all().await;

    Ok(app_state)
}

fn init_app_state(
    options: &AppOptions,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, DashboardError> {
    let app_state = Arc::new(AppState::init(
        &options.environments,
        options.request_timeout,
        &options.controller,
        options.caches,
        true,
    )?);

    shutdown_manager.with_app_state(app_state.clone())?;
    Ok(app_state)
}

fn init_cache_purge_worker(
    options: cache_purge::Options,
    caches: Arc<Caches>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DashboardError> {
    info!("Initializing cache purge worker...");

    let handle = tokio::spawn(async move {
        cache_purge::run(
            &options,
            caches.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_cache_purge_worker_handle(handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DashboardError> {
    info!("Initializing local HTTP server...");

    let server_state = ServerState::new(app_state);

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    server_handle: Option<JoinHandle<Result<(), DashboardError>>>,
    cache_purge_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            server_handle: None,
            cache_purge_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), DashboardError> {
        if self.app_state.is_some() {
            return Err(DashboardError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_cache_purge_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), DashboardError> {
        if self.cache_purge_worker_handle.is_some() {
            return Err(DashboardError::ShutdownError(
                "cache_purge_handle already set".to_string(),
            ));
        }
        self.cache_purge_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DashboardError>>,
    ) -> Result<(), DashboardError> {
        if self.server_handle.is_some() {
            return Err(DashboardError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), DashboardError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), DashboardError> {
        info!("Shutting down pipedash...");

        // 1. Refresh controllers
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        // 2. Cache purge worker
        if let Some(handle) = self.cache_purge_worker_handle.take() {
            handle
                .await
                .map_err(|e| DashboardError::ShutdownError(e.to_string()))?;
        }

        // 3. HTTP server
        if let Some(handle) = self.server_handle.take() {
            handle
                .await
                .map_err(|e| DashboardError::ShutdownError(e.to_string()))??;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
