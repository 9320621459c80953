//! # Fetchflow
//!
//! A request-resolution engine that dispatches declaratively-configured
//! calls to named backend datasources, optionally chains several calls into
//! a pipeline with inter-step data substitution, and optionally memoizes
//! results in a best-effort cache.
//!
//! - **Unit resolvers**: a single datasource call, optionally cached
//! - **Pipeline resolvers**: ordered steps sharing an execution context,
//!   with `$prev`, `$steps.<name>`, and `$input.<field>` substitution
//! - **Retry discipline**: per-datasource budgets with exponential backoff
//!   and per-attempt timeouts
//! - **Failure policy**: fail-fast aborts or record-and-continue
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fetchflow::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(DatasourceRegistry::new());
//! registry.register(DatasourceProfile::new("users", "rest", "https://users.internal"))?;
//!
//! let executor = ResolverExecutor::new(registry, Arc::new(HttpTransport::new()))
//!     .with_cache(Arc::new(InMemoryCache::new()));
//!
//! let definition = ResolverDefinition::Unit(
//!     UnitDefinition::new("users", HttpMethod::Get, "/users/7"),
//! );
//! let outcome = executor.execute(&definition, &serde_json::json!({})).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod config;
pub mod datasource;
pub mod errors;
pub mod observability;
pub mod resolver;
pub mod substitution;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheStore, InMemoryCache, NoopCache};
    pub use crate::config::{load_env_file, registry_from_env};
    pub use crate::datasource::{
        CallRequest, CallResult, DatasourceInvoker, DatasourceProfile, DatasourceRegistry,
        HttpMethod, HttpTransport, Transport,
    };
    pub use crate::errors::{
        ConfigurationError, DatasourceNotFoundError, DatasourceUnavailableError, FetchflowError,
    };
    pub use crate::resolver::{
        ErrorPolicy, ExecutionContext, PipelineDefinition, ResolverDefinition, ResolverExecutor,
        ResolverOutcome, StepDefinition, StepOutcome, UnitDefinition,
    };
    pub use crate::substitution::substitute;
}
