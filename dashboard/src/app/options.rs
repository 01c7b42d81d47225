//! Application configuration options

use std::time::Duration;

use crate::controller::Options as ControllerOptions;
use crate::models::environment::Environment;
use crate::workers::cache_purge;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Environments to watch
    pub environments: Vec<Environment>,

    /// Enable local HTTP server
    pub enable_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Refresh controller options
    pub controller: ControllerOptions,

    /// Cache configuration
    pub caches: CacheOptions,

    /// Bound on a single upstream request
    pub request_timeout: Duration,

    /// Cache purge worker options
    pub cache_purger: cache_purge::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            environments: Vec::new(),
            enable_server: true,
            server: ServerOptions::default(),
            controller: ControllerOptions::default(),
            caches: CacheOptions::default(),
            request_timeout: Duration::from_secs(30),
            cache_purger: cache_purge::Options::default(),
        }
    }
}

/// Lifecycle options for the dashboard
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// TTL for entries written without one
    pub default_ttl: Duration,

    /// Maximum entries per bucket
    pub capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(1),
            capacity: 500,
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
