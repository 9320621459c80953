//! End-to-end pipeline execution tests over scripted transports.

use crate::resolver::{
    ErrorPolicy, PipelineDefinition, ResolverDefinition, ResolverOutcome,
};
use crate::testing::{get_step, test_executor, RecordingCache, ScriptedTransport};
use serde_json::json;
use std::sync::Arc;

async fn run(
    transport: &Arc<ScriptedTransport>,
    pipeline: PipelineDefinition,
    input: serde_json::Value,
) -> ResolverOutcome {
    let executor = test_executor(transport.clone());
    executor
        .execute(&ResolverDefinition::Pipeline(pipeline), &input)
        .await
        .expect("pipeline definitions in these tests are valid")
}

#[tokio::test]
async fn test_step_path_receives_whole_serialized_previous_output() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(200, json!({"id": 7}));
    transport.push_ok(200, json!([{"post": 1}]));

    let pipeline = PipelineDefinition::new(vec![
        get_step("getUser", "/users/7"),
        get_step("getPosts", "/posts?userId=$prev.id"),
    ]);

    let outcome = run(&transport, pipeline, json!({})).await;

    assert!(outcome.ok);
    assert_eq!(outcome.data, Some(json!([{"post": 1}])));

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    // Whole-object substitution: the entire serialized output of the
    // previous step lands in the path, not an extracted scalar.
    assert_eq!(
        requests[1].url,
        "http://localhost:9999/posts?userId={\"id\":7}"
    );
}

#[tokio::test]
async fn test_steps_can_reference_named_outputs_and_input_fields() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(200, json!({"id": 7}));
    transport.push_ok(200, json!({"region": "eu"}));
    transport.push_ok(200, json!({"done": true}));

    let pipeline = PipelineDefinition::new(vec![
        get_step("getUser", "/users/$input.userId"),
        get_step("getRegion", "/regions/current"),
        get_step("audit", "/audit?user=$steps.getUser&region=$prev"),
    ]);

    let outcome = run(&transport, pipeline, json!({"userId": "7"})).await;

    assert!(outcome.ok);
    let requests = transport.requests();
    assert_eq!(requests[0].url, "http://localhost:9999/users/7");
    assert_eq!(
        requests[2].url,
        "http://localhost:9999/audit?user={\"id\":7}&region={\"region\":\"eu\"}"
    );
}

#[tokio::test]
async fn test_fail_fast_stops_at_the_failing_step() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(200, json!({"id": 7}));
    transport.push_error("connection refused");
    transport.push_ok(200, json!({"unreachable": true}));

    let pipeline = PipelineDefinition::new(vec![
        get_step("getUser", "/users/7"),
        get_step("getPosts", "/posts"),
        get_step("getComments", "/comments"),
    ]);

    let outcome = run(&transport, pipeline, json!({})).await;

    assert!(!outcome.ok);
    assert!(outcome
        .error
        .as_deref()
        .is_some_and(|error| error.starts_with("Pipeline failed at step 'getPosts':")));
    assert_eq!(outcome.steps.len(), 2);
    assert!(outcome.steps[0].ok);
    assert!(!outcome.steps[1].ok);
    assert!(outcome.data.is_none());
    // The third step never ran.
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_fail_fast_abort_skips_the_pipeline_cache_write() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(200, json!({"id": 7}));
    transport.push_error("boom");
    let cache = Arc::new(RecordingCache::new());

    let pipeline = PipelineDefinition::new(vec![
        get_step("getUser", "/users/7"),
        get_step("getPosts", "/posts"),
    ])
    .cached("pipeline:user-posts");

    let executor = test_executor(transport.clone()).with_cache(cache.clone());
    let outcome = executor
        .execute(&ResolverDefinition::Pipeline(pipeline), &json!({}))
        .await
        .unwrap();

    assert!(!outcome.ok);
    assert_eq!(cache.set_count(), 0);
}

#[tokio::test]
async fn test_continue_records_failure_and_keeps_prior_context() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(200, json!({"id": 1}));
    transport.push_error("posts exploded");
    transport.push_ok(200, json!({"audited": true}));

    let pipeline = PipelineDefinition::new(vec![
        get_step("getUser", "/users/1"),
        get_step("getPosts", "/posts"),
        get_step("audit", "/audit?subject=$prev"),
    ])
    .with_error_policy(ErrorPolicy::Continue);

    let outcome = run(&transport, pipeline, json!({})).await;

    assert!(outcome.ok);
    assert_eq!(outcome.steps.len(), 3);
    assert!(!outcome.steps[1].ok);
    assert_eq!(outcome.data, Some(json!({"audited": true})));
    // Step 3 substituted against step 1's output; the failed step
    // contributed nothing to the context.
    let requests = transport.requests();
    assert_eq!(
        requests[2].url,
        "http://localhost:9999/audit?subject={\"id\":1}"
    );
}

#[tokio::test]
async fn test_continue_with_trailing_failures_returns_last_successful_output() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_ok(200, json!({"id": 1}));
    transport.push_error("posts exploded");
    transport.push_error("audit exploded");

    let pipeline = PipelineDefinition::new(vec![
        get_step("getUser", "/users/1"),
        get_step("getPosts", "/posts"),
        get_step("audit", "/audit"),
    ])
    .with_error_policy(ErrorPolicy::Continue);

    let outcome = run(&transport, pipeline, json!({})).await;

    assert!(outcome.ok);
    assert_eq!(outcome.steps.len(), 3);
    assert_eq!(outcome.data, Some(json!({"id": 1})));
}

#[tokio::test]
async fn test_continue_with_every_step_failing_produces_no_data() {
    let transport = Arc::new(ScriptedTransport::failing("down"));

    let pipeline = PipelineDefinition::new(vec![
        get_step("one", "/one"),
        get_step("two", "/two"),
    ])
    .with_error_policy(ErrorPolicy::Continue);

    let outcome = run(&transport, pipeline, json!({})).await;

    assert!(outcome.ok);
    assert!(outcome.data.is_none());
    assert_eq!(outcome.steps.len(), 2);
    assert!(outcome.steps.iter().all(|step| !step.ok));
}

#[tokio::test]
async fn test_whole_pipeline_cache_hit_short_circuits_with_no_steps() {
    let transport = Arc::new(ScriptedTransport::ok(json!({"fresh": true})));
    let cache = Arc::new(RecordingCache::new());
    cache.seed("pipeline:user-posts", json!({"memoized": true})).await;

    let pipeline = PipelineDefinition::new(vec![get_step("getUser", "/users/7")])
        .cached("pipeline:user-posts");

    let executor = test_executor(transport.clone()).with_cache(cache);
    let outcome = executor
        .execute(&ResolverDefinition::Pipeline(pipeline), &json!({}))
        .await
        .unwrap();

    assert!(outcome.ok);
    assert!(outcome.from_cache);
    assert!(outcome.steps.is_empty());
    assert_eq!(outcome.data, Some(json!({"memoized": true})));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_completed_pipeline_writes_its_cache_entry() {
    let transport = Arc::new(ScriptedTransport::ok(json!({"id": 7})));
    let cache = Arc::new(RecordingCache::new());

    let pipeline = PipelineDefinition::new(vec![get_step("getUser", "/users/7")])
        .cached("pipeline:user");

    let executor = test_executor(transport.clone()).with_cache(cache.clone());
    let outcome = executor
        .execute(&ResolverDefinition::Pipeline(pipeline.clone()), &json!({}))
        .await
        .unwrap();

    assert!(outcome.cached);
    assert_eq!(cache.set_count(), 1);

    let second = executor
        .execute(&ResolverDefinition::Pipeline(pipeline), &json!({}))
        .await
        .unwrap();
    assert!(second.from_cache);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_step_cache_hit_skips_only_that_steps_call() {
    let transport = Arc::new(ScriptedTransport::ok(json!({"posts": []})));
    let cache = Arc::new(RecordingCache::new());
    cache.seed("step:user", json!({"id": 7})).await;

    let pipeline = PipelineDefinition::new(vec![
        get_step("getUser", "/users/7").cached("step:user"),
        get_step("getPosts", "/posts?userId=$prev"),
    ]);

    let executor = test_executor(transport.clone()).with_cache(cache);
    let outcome = executor
        .execute(&ResolverDefinition::Pipeline(pipeline), &json!({}))
        .await
        .unwrap();

    assert!(outcome.ok);
    assert_eq!(outcome.steps.len(), 2);
    assert!(outcome.steps[0].from_cache);
    assert!(!outcome.steps[1].from_cache);
    // Only the second step reached the transport, and the cached output
    // still fed its substitution.
    assert_eq!(transport.call_count(), 1);
    assert_eq!(
        transport.requests()[0].url,
        "http://localhost:9999/posts?userId={\"id\":7}"
    );
}

#[tokio::test]
async fn test_failing_step_with_unknown_datasource_is_recorded() {
    let transport = Arc::new(ScriptedTransport::ok(json!({"id": 7})));

    let pipeline = PipelineDefinition::new(vec![
        get_step("getUser", "/users/7"),
        crate::resolver::StepDefinition::new(
            "missing",
            "nowhere",
            crate::datasource::HttpMethod::Get,
            "/void",
        ),
    ])
    .with_error_policy(ErrorPolicy::Continue);

    let outcome = run(&transport, pipeline, json!({})).await;

    assert!(outcome.ok);
    assert!(!outcome.steps[1].ok);
    assert!(outcome.steps[1]
        .error_message
        .as_deref()
        .is_some_and(|error| error.contains("not registered")));
    assert_eq!(outcome.data, Some(json!({"id": 7})));
}
