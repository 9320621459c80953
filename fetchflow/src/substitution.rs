//! Marker substitution over step request fields.
//!
//! Rewrites textual and structured fields by replacing `$prev`,
//! `$steps.<name>`, and `$input.<field>` markers with data from the
//! execution context. The replacement is purely textual: a marker carrying a
//! trailing field accessor (`$prev.id`) still injects the entire serialized
//! output, never an extracted scalar.

use crate::resolver::ExecutionContext;
use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};
use serde_json::Value;

/// Matches `$prev` plus any trailing dot accessors.
static PREVIOUS_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$prev(?:\.[A-Za-z0-9_]+)*").expect("previous-step marker pattern compiles")
});

/// Matches `$steps.<name>` plus any trailing dot accessors.
static NAMED_STEP_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$steps\.([A-Za-z0-9_]+)(?:\.[A-Za-z0-9_]+)*")
        .expect("named-step marker pattern compiles")
});

/// Matches `$input.<field>`.
static INPUT_FIELD_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$input\.([A-Za-z0-9_]+)").expect("input-field marker pattern compiles"));

/// Substitutes markers in `value` against the execution context.
///
/// Strings receive the three replacement passes in fixed order (previous
/// step, named steps, input fields); objects and arrays recurse with keys
/// and ordering preserved; every other value is returned unchanged.
/// Substitution never fails: text that looks like JSON after replacement but
/// does not parse stays a plain string.
#[must_use]
pub fn substitute(value: &Value, ctx: &ExecutionContext) -> Value {
    match value {
        Value::String(text) => substitute_text(text, ctx),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), substitute(value, ctx)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| substitute(item, ctx)).collect())
        }
        other => other.clone(),
    }
}

/// Renders a value the way input-field markers do: strings stay raw text,
/// everything else is JSON-serialized.
#[must_use]
pub fn value_to_raw_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn substitute_text(original: &str, ctx: &ExecutionContext) -> Value {
    let mut text = original.to_string();

    // Pass a: previous-step marker, skipped while no step has produced output.
    if let Some(previous) = ctx.previous_output() {
        let serialized = previous.to_string();
        text = PREVIOUS_MARKER
            .replace_all(&text, NoExpand(&serialized))
            .into_owned();
    }

    // Pass b: named-step markers; names without a recorded output stay verbatim.
    text = NAMED_STEP_MARKER
        .replace_all(&text, |caps: &Captures<'_>| match ctx.step_output(&caps[1]) {
            Some(output) => output.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned();

    // Pass c: input-field markers; missing fields stay verbatim.
    text = INPUT_FIELD_MARKER
        .replace_all(&text, |caps: &Captures<'_>| {
            match ctx.original_input().get(&caps[1]) {
                Some(field) => value_to_raw_string(field),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    if (text.starts_with('{') || text.starts_with('[')) && text != original {
        match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => return parsed,
            Err(error) => tracing::debug!(
                %error,
                "Substituted text looks like JSON but does not parse; keeping it as a string"
            ),
        }
    }

    Value::String(text)
}
