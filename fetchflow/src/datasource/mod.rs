//! Datasource profiles, registry, and call execution.
//!
//! This module provides:
//! - Named connection profiles carrying timeout and retry budgets
//! - A case-insensitive, read-mostly concurrent registry
//! - The invoker wrapping one transport call with retry/backoff discipline

mod call;
mod invoker;
mod profile;
mod registry;
mod transport;

pub use call::{CallRequest, CallResult, HttpMethod};
pub use invoker::DatasourceInvoker;
pub use profile::{DatasourceProfile, DEFAULT_RETRY_BUDGET, DEFAULT_TIMEOUT_MS};
pub use registry::DatasourceRegistry;
pub use transport::{
    HttpTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
