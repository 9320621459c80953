//! Named backend connection profiles.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-attempt timeout applied when a profile does not set one.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Retry budget applied when a profile does not set one.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// A named backend connection profile.
///
/// Immutable once registered. The registry keys profiles by the lower-cased
/// name while `name` preserves the original casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceProfile {
    /// The datasource name, original casing preserved.
    pub name: String,
    /// The datasource kind (e.g. `"rest"`). Opaque metadata, never
    /// interpreted by the engine.
    pub kind: String,
    /// Base address every call path is joined onto.
    pub base_address: String,
    /// Per-attempt timeout in milliseconds. Must be greater than zero.
    pub timeout_ms: u64,
    /// Maximum number of attempts per call. Must be at least one.
    pub retry_budget: u32,
    /// Headers applied to every call, overridable per request.
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
}

impl DatasourceProfile {
    /// Creates a profile with default timeout and retry budget.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        base_address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            base_address: base_address.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_budget: DEFAULT_RETRY_BUDGET,
            default_headers: HashMap::new(),
        }
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    /// Adds a default header.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Checks the profile invariants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.retry_budget < 1 {
            return Err(ConfigurationError::new(format!(
                "Datasource '{}' must have a retry budget of at least 1",
                self.name
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigurationError::new(format!(
                "Datasource '{}' must have a timeout greater than 0ms",
                self.name
            )));
        }
        Ok(())
    }
}
