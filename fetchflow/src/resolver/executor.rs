//! Resolver execution: the unit and pipeline state machines.

use super::{
    ErrorPolicy, ExecutionContext, PipelineDefinition, ResolverDefinition, ResolverOutcome,
    StepDefinition, StepOutcome, UnitDefinition,
};
use crate::cache::{CacheStore, NoopCache};
use crate::datasource::{CallRequest, DatasourceInvoker, DatasourceRegistry, Transport};
use crate::errors::FetchflowError;
use crate::substitution::{substitute, value_to_raw_string};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Executes resolver definitions against registered datasources.
///
/// One executor serves any number of concurrent executions; each execution
/// is a single sequential task owning its own context. The registry is the
/// only shared collaborator, and it is injected rather than a process
/// global.
pub struct ResolverExecutor {
    registry: Arc<DatasourceRegistry>,
    invoker: DatasourceInvoker,
    cache: Arc<dyn CacheStore>,
}

/// Result of one step execution, before it is recorded as an outcome.
enum StepResult {
    Success {
        data: Value,
        from_cache: bool,
        cached: bool,
        duration_ms: u64,
    },
    Failure {
        message: String,
        duration_ms: u64,
    },
}

impl ResolverExecutor {
    /// Creates an executor with no cache collaborator.
    #[must_use]
    pub fn new(registry: Arc<DatasourceRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            invoker: DatasourceInvoker::new(transport),
            cache: Arc::new(NoopCache),
        }
    }

    /// Sets the cache collaborator.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    /// Executes a resolver definition against the original request input.
    ///
    /// `Err` is reserved for definition problems surfaced before any network
    /// call; datasource and cache failures are reported inside the outcome.
    pub async fn execute(
        &self,
        definition: &ResolverDefinition,
        input: &Value,
    ) -> Result<ResolverOutcome, FetchflowError> {
        definition.validate()?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("resolver", run_id = %run_id, kind = definition.kind());
        async {
            match definition {
                ResolverDefinition::Unit(unit) => Ok(self.execute_unit(unit).await),
                ResolverDefinition::Pipeline(pipeline) => {
                    Ok(self.execute_pipeline(pipeline, input).await)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Runs a unit resolver: cache check, one invocation, best-effort cache
    /// write. Datasource failures become `ok: false` outcomes, never errors.
    async fn execute_unit(&self, unit: &UnitDefinition) -> ResolverOutcome {
        if unit.is_cached {
            if let Some(key) = unit.cache_key.as_deref() {
                if let Some(hit) = self.cache.get(key).await {
                    tracing::debug!(cache_key = key, "Unit resolver served from cache");
                    return ResolverOutcome::cache_hit(hit).with_datasource(&unit.datasource);
                }
            }
        }

        let profile = match self.registry.resolve(&unit.datasource) {
            Ok(profile) => profile,
            Err(error) => {
                return ResolverOutcome::unit_failure(error.to_string(), &unit.datasource)
            }
        };

        let request = CallRequest {
            method: unit.method,
            path: unit.path.clone(),
            body: unit.body.clone(),
            headers: unit.headers.clone(),
            query: unit.params.clone(),
        };

        match self.invoker.invoke(&profile, &request).await {
            Ok(result) => {
                let mut outcome = ResolverOutcome::unit_success(result.data.clone(), &profile.name);
                if unit.is_cached {
                    if let Some(key) = unit.cache_key.as_deref() {
                        if self.write_cache(key, &result.data, unit.ttl_seconds()).await {
                            outcome = outcome.written_to_cache();
                        }
                    }
                }
                outcome
            }
            Err(error) => ResolverOutcome::unit_failure(error.to_string(), &profile.name),
        }
    }

    /// Runs a pipeline resolver: whole-pipeline cache check, then steps in
    /// declaration order over an evolving context.
    async fn execute_pipeline(
        &self,
        pipeline: &PipelineDefinition,
        input: &Value,
    ) -> ResolverOutcome {
        if pipeline.is_cached {
            if let Some(key) = pipeline.cache_key.as_deref() {
                if let Some(hit) = self.cache.get(key).await {
                    tracing::debug!(cache_key = key, "Pipeline resolver served from cache");
                    return ResolverOutcome::cache_hit(hit);
                }
            }
        }

        let mut ctx = ExecutionContext::new(input.clone());
        let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(pipeline.steps.len());

        for step in &pipeline.steps {
            match self.execute_step(step, &ctx).await {
                StepResult::Success {
                    data,
                    from_cache,
                    cached,
                    duration_ms,
                } => {
                    ctx.record_step(&step.name, data.clone());
                    let mut outcome =
                        StepOutcome::success(&step.name, &step.datasource, data, duration_ms);
                    if from_cache {
                        outcome = outcome.served_from_cache();
                    }
                    if cached {
                        outcome = outcome.written_to_cache();
                    }
                    outcomes.push(outcome);
                }
                StepResult::Failure {
                    message,
                    duration_ms,
                } => {
                    tracing::warn!(step = %step.name, error = %message, "Pipeline step failed");
                    outcomes.push(StepOutcome::failure(
                        &step.name,
                        &step.datasource,
                        &message,
                        duration_ms,
                    ));
                    if pipeline.on_error == ErrorPolicy::FailFast {
                        return ResolverOutcome::pipeline_failure(&step.name, &message, outcomes);
                    }
                    // continue: the failed step contributes no context data.
                }
            }
        }

        let data = ctx.previous_output().cloned();
        let mut outcome = ResolverOutcome::pipeline_success(data.clone(), outcomes);
        if pipeline.is_cached {
            if let (Some(key), Some(value)) = (pipeline.cache_key.as_deref(), data.as_ref()) {
                if self.write_cache(key, value, pipeline.ttl_seconds()).await {
                    outcome = outcome.written_to_cache();
                }
            }
        }
        outcome
    }

    /// Runs one step against the current context.
    async fn execute_step(&self, step: &StepDefinition, ctx: &ExecutionContext) -> StepResult {
        let started = Instant::now();
        tracing::debug!(step = %step.name, datasource = %step.datasource, "Executing pipeline step");

        if step.is_cached {
            if let Some(key) = step.cache_key.as_deref() {
                if let Some(hit) = self.cache.get(key).await {
                    tracing::debug!(step = %step.name, cache_key = key, "Step served from cache");
                    return StepResult::Success {
                        data: hit,
                        from_cache: true,
                        cached: false,
                        duration_ms: elapsed_ms(started),
                    };
                }
            }
        }

        let profile = match self.registry.resolve(&step.datasource) {
            Ok(profile) => profile,
            Err(error) => {
                return StepResult::Failure {
                    message: error.to_string(),
                    duration_ms: elapsed_ms(started),
                }
            }
        };

        let request = materialize_request(step, ctx);
        match self.invoker.invoke(&profile, &request).await {
            Ok(result) => {
                let mut cached = false;
                if step.is_cached {
                    if let Some(key) = step.cache_key.as_deref() {
                        cached = self.write_cache(key, &result.data, step.ttl_seconds()).await;
                    }
                }
                StepResult::Success {
                    data: result.data,
                    from_cache: false,
                    cached,
                    duration_ms: elapsed_ms(started),
                }
            }
            Err(error) => StepResult::Failure {
                message: error.to_string(),
                duration_ms: elapsed_ms(started),
            },
        }
    }

    /// Best-effort cache write; failures are logged and swallowed.
    async fn write_cache(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool {
        let stored = self
            .cache
            .set(key, value.clone(), Duration::from_secs(ttl_seconds))
            .await;
        if !stored {
            tracing::warn!(cache_key = key, "Cache write failed; continuing without memoization");
        }
        stored
    }
}

/// Substitutes a step's request fields against the current context.
///
/// Later steps therefore see earlier steps' real outputs, never
/// placeholders. A path that substitutes into a structured value is
/// re-serialized to its JSON text.
fn materialize_request(step: &StepDefinition, ctx: &ExecutionContext) -> CallRequest {
    let path = match substitute(&Value::String(step.path.clone()), ctx) {
        Value::String(path) => path,
        parsed => value_to_raw_string(&parsed),
    };
    let body = step.body.as_ref().map(|body| substitute(body, ctx));
    let headers = step.headers.as_ref().map(|headers| substitute_map(headers, ctx));
    let query = step.params.as_ref().map(|params| substitute_map(params, ctx));

    CallRequest {
        method: step.method,
        path,
        body,
        headers,
        query,
    }
}

fn substitute_map(map: &Map<String, Value>, ctx: &ExecutionContext) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), substitute(value, ctx)))
        .collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::HttpMethod;
    use crate::testing::{get_unit, test_executor, RecordingCache, ScriptedTransport};
    use serde_json::json;

    #[tokio::test]
    async fn test_unit_success_reports_datasource_and_data() {
        let transport = Arc::new(ScriptedTransport::ok(json!({"id": 7})));
        let executor = test_executor(transport.clone());
        let definition = ResolverDefinition::Unit(get_unit("/users/7"));

        let outcome = executor.execute(&definition, &json!({})).await.unwrap();

        assert!(outcome.ok);
        assert_eq!(outcome.data, Some(json!({"id": 7})));
        assert_eq!(outcome.datasource.as_deref(), Some("backend"));
        assert!(!outcome.from_cache);
        assert!(outcome.steps.is_empty());
    }

    #[tokio::test]
    async fn test_unit_failure_is_reported_not_raised() {
        let transport = Arc::new(ScriptedTransport::failing("connection refused"));
        let executor = test_executor(transport);
        let definition = ResolverDefinition::Unit(get_unit("/users/7"));

        let outcome = executor.execute(&definition, &json!({})).await.unwrap();

        assert!(!outcome.ok);
        assert!(outcome
            .error
            .as_deref()
            .is_some_and(|error| error.contains("connection refused")));
        assert_eq!(outcome.datasource.as_deref(), Some("backend"));
    }

    #[tokio::test]
    async fn test_unit_unknown_datasource_becomes_failed_outcome() {
        let transport = Arc::new(ScriptedTransport::ok(json!({})));
        let executor = test_executor(transport.clone());
        let definition = ResolverDefinition::Unit(UnitDefinition::new(
            "nowhere",
            HttpMethod::Get,
            "/ping",
        ));

        let outcome = executor.execute(&definition, &json!({})).await.unwrap();

        assert!(!outcome.ok);
        assert!(outcome
            .error
            .as_deref()
            .is_some_and(|error| error.contains("not registered")));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unit_cache_hit_never_invokes_datasource() {
        let transport = Arc::new(ScriptedTransport::ok(json!({"fresh": true})));
        let cache = Arc::new(RecordingCache::new());
        cache.seed("user:7", json!({"id": 7})).await;
        let executor = test_executor(transport.clone()).with_cache(cache.clone());
        let definition = ResolverDefinition::Unit(get_unit("/users/7").cached("user:7"));

        let outcome = executor.execute(&definition, &json!({})).await.unwrap();

        assert!(outcome.ok);
        assert!(outcome.from_cache);
        assert!(!outcome.cached);
        assert_eq!(outcome.data, Some(json!({"id": 7})));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unit_miss_invokes_then_writes_cache() {
        let transport = Arc::new(ScriptedTransport::ok(json!({"id": 7})));
        let cache = Arc::new(RecordingCache::new());
        let executor = test_executor(transport.clone()).with_cache(cache.clone());
        let definition = ResolverDefinition::Unit(get_unit("/users/7").cached("user:7"));

        let first = executor.execute(&definition, &json!({})).await.unwrap();
        assert!(first.cached);
        assert!(!first.from_cache);
        assert_eq!(cache.set_count(), 1);
        assert_eq!(transport.call_count(), 1);

        let second = executor.execute(&definition, &json!({})).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unit_cache_write_failure_is_swallowed() {
        let transport = Arc::new(ScriptedTransport::ok(json!({"id": 7})));
        let cache = Arc::new(RecordingCache::rejecting_writes());
        let executor = test_executor(transport).with_cache(cache.clone());
        let definition = ResolverDefinition::Unit(get_unit("/users/7").cached("user:7"));

        let outcome = executor.execute(&definition, &json!({})).await.unwrap();

        assert!(outcome.ok);
        assert!(!outcome.cached);
        assert_eq!(cache.set_count(), 1);
    }

    #[tokio::test]
    async fn test_unit_post_without_body_is_a_configuration_error() {
        let transport = Arc::new(ScriptedTransport::ok(json!({})));
        let executor = test_executor(transport.clone());
        let definition = ResolverDefinition::Unit(UnitDefinition::new(
            "backend",
            HttpMethod::Post,
            "/orders",
        ));

        let err = executor.execute(&definition, &json!({})).await.unwrap_err();

        assert!(matches!(err, FetchflowError::Configuration(_)));
        assert_eq!(transport.call_count(), 0);
    }
}
