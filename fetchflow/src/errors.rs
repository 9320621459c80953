//! Error types for the fetchflow engine.
//!
//! The taxonomy mirrors the places a resolver execution can go wrong:
//! invalid definitions are rejected before any network call, unresolvable
//! datasource names list what is registered, and exhausted retry budgets
//! carry the last underlying failure.

use thiserror::Error;

/// The main error type for fetchflow operations.
#[derive(Debug, Error)]
pub enum FetchflowError {
    /// A resolver or datasource definition is invalid.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A datasource name could not be resolved against the registry.
    #[error("{0}")]
    NotFound(#[from] DatasourceNotFoundError),

    /// A datasource call exhausted its retry budget.
    #[error("{0}")]
    Unavailable(#[from] DatasourceUnavailableError),

    /// A resolver definition carried an unknown `type` discriminator.
    #[error("Unsupported resolver type: '{kind}'")]
    UnsupportedResolverType {
        /// The unrecognized discriminator value.
        kind: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Error raised when a definition fails validation.
///
/// Always surfaced before any network call is made.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a datasource name is not present in the registry.
#[derive(Debug, Clone, Error)]
#[error("Datasource '{name}' is not registered (available: [{}])", .available.join(", "))]
pub struct DatasourceNotFoundError {
    /// The name that failed to resolve.
    pub name: String,
    /// The registered names, in their original casing.
    pub available: Vec<String>,
}

impl DatasourceNotFoundError {
    /// Creates a new not-found error.
    #[must_use]
    pub fn new(name: impl Into<String>, available: Vec<String>) -> Self {
        Self {
            name: name.into(),
            available,
        }
    }
}

/// Error raised when a datasource call exhausted its retry budget.
#[derive(Debug, Clone, Error)]
#[error("Datasource '{datasource}' unavailable after {attempts} attempt(s): {last_error}")]
pub struct DatasourceUnavailableError {
    /// The datasource name.
    pub datasource: String,
    /// How many attempts were made.
    pub attempts: u32,
    /// The last underlying error message.
    pub last_error: String,
}

impl DatasourceUnavailableError {
    /// Creates a new unavailable error.
    #[must_use]
    pub fn new(datasource: impl Into<String>, attempts: u32, last_error: impl Into<String>) -> Self {
        Self {
            datasource: datasource.into(),
            attempts,
            last_error: last_error.into(),
        }
    }
}
