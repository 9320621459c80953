//! Resolver and step definitions supplied per request.
//!
//! Definitions are read-only during execution. A resolver is either a single
//! datasource call (`unit`) or an ordered sequence of calls (`pipeline`)
//! sharing an execution context.

use crate::datasource::HttpMethod;
use crate::errors::{ConfigurationError, FetchflowError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Seconds a cached resolver result lives when the definition sets no TTL.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// A declarative resolver definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolverDefinition {
    /// Exactly one datasource call.
    #[serde(rename = "unit")]
    Unit(UnitDefinition),
    /// An ordered sequence of calls sharing an execution context.
    #[serde(rename = "pipeline")]
    Pipeline(PipelineDefinition),
}

impl ResolverDefinition {
    /// Parses a definition from raw JSON.
    ///
    /// Unknown `type` discriminators are rejected with
    /// [`FetchflowError::UnsupportedResolverType`] instead of a generic
    /// deserialization error.
    pub fn from_value(value: &Value) -> Result<Self, FetchflowError> {
        let kind = value.get("type").and_then(Value::as_str).ok_or_else(|| {
            FetchflowError::UnsupportedResolverType {
                kind: "<missing>".to_string(),
            }
        })?;
        match kind {
            "unit" | "pipeline" => serde_json::from_value(value.clone())
                .map_err(|error| FetchflowError::Serialization(error.to_string())),
            other => Err(FetchflowError::UnsupportedResolverType {
                kind: other.to_string(),
            }),
        }
    }

    /// Validates the definition before any network call.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Self::Unit(unit) => unit.validate(),
            Self::Pipeline(pipeline) => pipeline.validate(),
        }
    }

    /// Returns the discriminator as text, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit(_) => "unit",
            Self::Pipeline(_) => "pipeline",
        }
    }
}

/// A resolver consisting of exactly one datasource call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDefinition {
    /// Name of the datasource to call.
    pub datasource: String,
    /// Method for the call.
    pub method: HttpMethod,
    /// Path joined onto the datasource base address.
    pub path: String,
    /// Request body. Required for POST, PUT, and PATCH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Per-request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    /// Query parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    /// Whether the result is memoized.
    #[serde(default)]
    pub is_cached: bool,
    /// Cache key; required when `is_cached`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Seconds the cached result lives; defaults to
    /// [`DEFAULT_CACHE_TTL_SECS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_seconds: Option<u64>,
}

impl UnitDefinition {
    /// Creates an uncached unit definition.
    #[must_use]
    pub fn new(
        datasource: impl Into<String>,
        method: HttpMethod,
        path: impl Into<String>,
    ) -> Self {
        Self {
            datasource: datasource.into(),
            method,
            path: path.into(),
            body: None,
            headers: None,
            params: None,
            is_cached: false,
            cache_key: None,
            cache_ttl_seconds: None,
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Map<String, Value>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Sets the query parameters.
    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    /// Enables caching under the given key.
    #[must_use]
    pub fn cached(mut self, cache_key: impl Into<String>) -> Self {
        self.is_cached = true;
        self.cache_key = Some(cache_key.into());
        self
    }

    /// Sets the cache TTL in seconds.
    #[must_use]
    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl_seconds = Some(seconds);
        self
    }

    /// Checks the definition invariants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.method.requires_body() && self.body.is_none() {
            return Err(ConfigurationError::new(format!(
                "Unit resolver for datasource '{}' uses {} and requires a body",
                self.datasource, self.method
            )));
        }
        validate_cache_fields(self.is_cached, self.cache_key.as_deref(), "Unit resolver")
    }

    /// Returns the effective cache TTL.
    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.cache_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS)
    }
}

/// How a pipeline responds to a failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Abort on the first step failure.
    #[default]
    #[serde(rename = "failFast")]
    FailFast,
    /// Record the failure and keep executing subsequent steps.
    #[serde(rename = "continue")]
    Continue,
}

/// A resolver consisting of an ordered sequence of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    /// Steps in declaration order. At least one.
    pub steps: Vec<StepDefinition>,
    /// Failure policy. Defaults to fail-fast.
    #[serde(default)]
    pub on_error: ErrorPolicy,
    /// Whether the final pipeline result is memoized.
    #[serde(default)]
    pub is_cached: bool,
    /// Cache key; required when `is_cached`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Seconds the cached result lives; defaults to
    /// [`DEFAULT_CACHE_TTL_SECS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_seconds: Option<u64>,
}

impl PipelineDefinition {
    /// Creates an uncached fail-fast pipeline.
    #[must_use]
    pub fn new(steps: Vec<StepDefinition>) -> Self {
        Self {
            steps,
            on_error: ErrorPolicy::default(),
            is_cached: false,
            cache_key: None,
            cache_ttl_seconds: None,
        }
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    /// Enables whole-pipeline caching under the given key.
    #[must_use]
    pub fn cached(mut self, cache_key: impl Into<String>) -> Self {
        self.is_cached = true;
        self.cache_key = Some(cache_key.into());
        self
    }

    /// Sets the cache TTL in seconds.
    #[must_use]
    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl_seconds = Some(seconds);
        self
    }

    /// Checks the definition invariants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.steps.is_empty() {
            return Err(ConfigurationError::new(
                "Pipeline resolver declares no steps",
            ));
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(ConfigurationError::new(format!(
                    "Pipeline step calling datasource '{}' has an empty name",
                    step.datasource
                )));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(ConfigurationError::new(format!(
                    "Pipeline step name '{}' is not unique",
                    step.name
                )));
            }
            step.validate()?;
        }
        validate_cache_fields(self.is_cached, self.cache_key.as_deref(), "Pipeline resolver")
    }

    /// Returns the effective cache TTL.
    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.cache_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS)
    }
}

/// One step of a pipeline resolver.
///
/// Unlike a unit resolver, a step may omit the body for any method; the
/// body is a substitutable value materialized at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    /// Step name, unique within the pipeline; the substitution handle.
    pub name: String,
    /// Name of the datasource to call.
    pub datasource: String,
    /// Method for the call.
    pub method: HttpMethod,
    /// Path joined onto the datasource base address.
    pub path: String,
    /// Request body, substitutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Per-request headers, substitutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    /// Query parameters, substitutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    /// Whether the step result is memoized on its own.
    #[serde(default)]
    pub is_cached: bool,
    /// Cache key; required when `is_cached`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Seconds the cached result lives; defaults to
    /// [`DEFAULT_CACHE_TTL_SECS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_seconds: Option<u64>,
}

impl StepDefinition {
    /// Creates an uncached step.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        datasource: impl Into<String>,
        method: HttpMethod,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            datasource: datasource.into(),
            method,
            path: path.into(),
            body: None,
            headers: None,
            params: None,
            is_cached: false,
            cache_key: None,
            cache_ttl_seconds: None,
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Map<String, Value>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Sets the query parameters.
    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    /// Enables step caching under the given key.
    #[must_use]
    pub fn cached(mut self, cache_key: impl Into<String>) -> Self {
        self.is_cached = true;
        self.cache_key = Some(cache_key.into());
        self
    }

    /// Sets the cache TTL in seconds.
    #[must_use]
    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl_seconds = Some(seconds);
        self
    }

    /// Checks the step invariants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_cache_fields(
            self.is_cached,
            self.cache_key.as_deref(),
            &format!("Pipeline step '{}'", self.name),
        )
    }

    /// Returns the effective cache TTL.
    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.cache_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS)
    }
}

fn validate_cache_fields(
    is_cached: bool,
    cache_key: Option<&str>,
    what: &str,
) -> Result<(), ConfigurationError> {
    if is_cached && cache_key.map_or(true, str::is_empty) {
        return Err(ConfigurationError::new(format!(
            "{what} is marked cached but sets no cache key"
        )));
    }
    Ok(())
}
