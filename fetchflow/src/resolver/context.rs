//! Per-run execution context for pipeline substitution.

use serde_json::Value;
use std::collections::HashMap;

/// The evolving state of one pipeline execution.
///
/// Exclusively owned by one executor invocation: created when the pipeline
/// starts, mutated only as steps complete, and discarded when the pipeline
/// returns. Never shared or reused across requests.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    original_input: Value,
    previous_output: Option<Value>,
    step_outputs: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Creates a context seeded with the caller's original input.
    #[must_use]
    pub fn new(original_input: Value) -> Self {
        Self {
            original_input,
            previous_output: None,
            step_outputs: HashMap::new(),
        }
    }

    /// Returns the original request input.
    #[must_use]
    pub fn original_input(&self) -> &Value {
        &self.original_input
    }

    /// Returns the most recent successful step output.
    #[must_use]
    pub fn previous_output(&self) -> Option<&Value> {
        self.previous_output.as_ref()
    }

    /// Returns the output recorded under a step name.
    #[must_use]
    pub fn step_output(&self, name: &str) -> Option<&Value> {
        self.step_outputs.get(name)
    }

    /// Records a successful step output under its name.
    ///
    /// Failed steps are never recorded, so `previous_output` keeps pointing
    /// at the last step that actually produced data.
    pub fn record_step(&mut self, name: impl Into<String>, output: Value) {
        self.previous_output = Some(output.clone());
        self.step_outputs.insert(name.into(), output);
    }

    /// Returns the step names with recorded outputs.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.step_outputs.keys().map(String::as_str).collect()
    }
}
