//! Server state

use std::sync::Arc;

use crate::app::dashboard::Dashboard;
use crate::app::state::AppState;
use crate::server::handlers::ApiError;

/// Server state shared across handlers
pub struct ServerState {
    pub app_state: Arc<AppState>,
}

impl ServerState {
    pub fn new(app_state: Arc<AppState>) -> Self {
        Self { app_state }
    }

    /// Dashboard of an environment, or 404
    pub fn dashboard(&self, environment: &str) -> Result<Arc<Dashboard>, ApiError> {
        self.app_state
            .dashboard(environment)
            .cloned()
            .map_err(|e| ApiError::not_found(e.to_string()))
    }
}
