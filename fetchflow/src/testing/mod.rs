//! Testing utilities for the fetchflow engine.
//!
//! This module provides:
//! - A scripted transport with call counters and request recording
//! - A recording cache wrapper for best-effort cache assertions
//! - Small fixtures shared by the test suites

mod fixtures;
mod mocks;

pub use fixtures::{get_step, get_unit, registry_with, test_executor, test_profile};
pub use mocks::{RecordingCache, ScriptedTransport};
