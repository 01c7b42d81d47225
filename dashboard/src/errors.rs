//! Error types for pipedash

use thiserror::Error;

/// Application error type
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Failure half of every gateway call.
///
/// `Display` is the human-readable message shown to the user: the provider's
/// own message for service failures, a fixed description for missing data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The upstream service rejected the call
    #[error("{message}")]
    Service {
        kind: Option<String>,
        message: String,
    },

    /// The call could not be completed (connect, TLS, decode)
    #[error("{0}")]
    Transport(String),

    /// A successful response lacked a field the caller needs
    #[error("{0}")]
    MissingData(String),

    /// The call did not complete in time
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl GatewayError {
    pub fn missing(message: impl Into<String>) -> Self {
        GatewayError::MissingData(message.into())
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn is_missing_data(&self) -> bool {
        matches!(self, GatewayError::MissingData(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Transport(format!("invalid response body: {}", err))
    }
}

/// Success/failure envelope returned by every gateway operation
pub type GatewayResult<T> = Result<T, GatewayError>;
