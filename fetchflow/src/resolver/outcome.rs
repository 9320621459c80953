//! Resolver and step outcome types returned at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Audit record for one pipeline step, recorded whether it succeeded or
/// failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    /// The step name.
    pub name: String,
    /// Whether the step produced data.
    pub ok: bool,
    /// The datasource the step targeted.
    pub datasource: String,
    /// Step output (successful steps only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure message (failed steps only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Whether the step was served from its own cache entry.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub from_cache: bool,
    /// Whether this execution wrote the step's cache entry.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
    /// Wall-clock duration of the step in milliseconds.
    pub duration_ms: u64,
    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl StepOutcome {
    /// Records a successful step.
    #[must_use]
    pub fn success(
        name: impl Into<String>,
        datasource: impl Into<String>,
        data: Value,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            ok: true,
            datasource: datasource.into(),
            data: Some(data),
            error_message: None,
            from_cache: false,
            cached: false,
            duration_ms,
            recorded_at: Utc::now(),
        }
    }

    /// Records a failed step.
    #[must_use]
    pub fn failure(
        name: impl Into<String>,
        datasource: impl Into<String>,
        error_message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            ok: false,
            datasource: datasource.into(),
            data: None,
            error_message: Some(error_message.into()),
            from_cache: false,
            cached: false,
            duration_ms,
            recorded_at: Utc::now(),
        }
    }

    /// Marks the outcome as served from the step's cache entry.
    #[must_use]
    pub fn served_from_cache(mut self) -> Self {
        self.from_cache = true;
        self
    }

    /// Marks the outcome as freshly written to the step's cache entry.
    #[must_use]
    pub fn written_to_cache(mut self) -> Self {
        self.cached = true;
        self
    }
}

/// Aggregate result of a resolver execution.
///
/// Unit resolvers leave `steps` empty; pipelines carry one [`StepOutcome`]
/// per executed step (none on a whole-pipeline cache hit).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverOutcome {
    /// Whether the execution succeeded as a whole.
    pub ok: bool,
    /// Final output data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Aggregate failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Datasource a unit resolver targeted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
    /// Per-step audit trail.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepOutcome>,
    /// Whether the result came from cache without touching any datasource.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub from_cache: bool,
    /// Whether this execution wrote the result to cache.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

impl ResolverOutcome {
    /// Builds a successful unit outcome.
    #[must_use]
    pub fn unit_success(data: Value, datasource: impl Into<String>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            datasource: Some(datasource.into()),
            steps: Vec::new(),
            from_cache: false,
            cached: false,
        }
    }

    /// Builds a failed unit outcome.
    #[must_use]
    pub fn unit_failure(error: impl Into<String>, datasource: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
            datasource: Some(datasource.into()),
            steps: Vec::new(),
            from_cache: false,
            cached: false,
        }
    }

    /// Builds an outcome served entirely from cache.
    #[must_use]
    pub fn cache_hit(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            datasource: None,
            steps: Vec::new(),
            from_cache: true,
            cached: false,
        }
    }

    /// Builds a completed pipeline outcome.
    ///
    /// `data` is the last successfully-produced step output, absent when no
    /// step succeeded under the `continue` policy.
    #[must_use]
    pub fn pipeline_success(data: Option<Value>, steps: Vec<StepOutcome>) -> Self {
        Self {
            ok: true,
            data,
            error: None,
            datasource: None,
            steps,
            from_cache: false,
            cached: false,
        }
    }

    /// Builds a fail-fast pipeline abort naming the offending step.
    #[must_use]
    pub fn pipeline_failure(
        step_name: &str,
        message: &str,
        steps: Vec<StepOutcome>,
    ) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(format!("Pipeline failed at step '{step_name}': {message}")),
            datasource: None,
            steps,
            from_cache: false,
            cached: false,
        }
    }

    /// Attaches the datasource name.
    #[must_use]
    pub fn with_datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    /// Marks the outcome as freshly written to cache.
    #[must_use]
    pub fn written_to_cache(mut self) -> Self {
        self.cached = true;
        self
    }
}
