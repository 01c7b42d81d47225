//! Environment model

use secrecy::SecretString;

/// Service endpoints of one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub pipelines: String,
    pub builds: String,
    pub logs: String,
}

/// A named deployment target.
///
/// Created once at start-up from the settings file and never mutated. The
/// name doubles as the cache bucket for everything fetched from it.
#[derive(Debug, Clone)]
pub struct Environment {
    pub name: String,
    pub region: String,
    pub endpoints: Endpoints,

    /// Opaque bearer credential, passed through untouched
    pub credentials: Option<SecretString>,
}
