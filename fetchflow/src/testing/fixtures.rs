//! Shared fixtures for engine tests.

use crate::datasource::{DatasourceProfile, DatasourceRegistry, HttpMethod, Transport};
use crate::resolver::{ResolverExecutor, StepDefinition, UnitDefinition};
use std::sync::Arc;

/// Profile pointing at a local test address with a single-attempt budget, so
/// tests that are not about retries never sleep.
#[must_use]
pub fn test_profile(name: &str) -> DatasourceProfile {
    DatasourceProfile::new(name, "rest", "http://localhost:9999")
        .with_timeout_ms(1_000)
        .with_retry_budget(1)
}

/// Registry pre-loaded with the given profiles.
#[must_use]
pub fn registry_with(profiles: Vec<DatasourceProfile>) -> Arc<DatasourceRegistry> {
    let registry = DatasourceRegistry::new();
    for profile in profiles {
        // Fixture profiles always satisfy the registration invariants.
        let _ = registry.register(profile);
    }
    Arc::new(registry)
}

/// Executor over a single test datasource named `backend`.
#[must_use]
pub fn test_executor(transport: Arc<dyn Transport>) -> ResolverExecutor {
    ResolverExecutor::new(registry_with(vec![test_profile("backend")]), transport)
}

/// GET step against the `backend` datasource.
#[must_use]
pub fn get_step(name: &str, path: &str) -> StepDefinition {
    StepDefinition::new(name, "backend", HttpMethod::Get, path)
}

/// GET unit resolver against the `backend` datasource.
#[must_use]
pub fn get_unit(path: &str) -> UnitDefinition {
    UnitDefinition::new("backend", HttpMethod::Get, path)
}
