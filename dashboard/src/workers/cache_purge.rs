//! Periodic removal of expired cache entries
//!
//! Reads already treat expired entries as absent; this worker only bounds
//! memory for keys nobody asks for again.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info};

use crate::app::state::Caches;

/// Cache purge worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Purge interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Run the cache purge worker until shut down
pub async fn run<S, F>(
    options: &Options,
    caches: &Caches,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Cache purge worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Cache purge worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let purged = caches.purge_expired();
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
    }
}
