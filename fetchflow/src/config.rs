//! Datasource registry bootstrap from process-wide configuration.
//!
//! Profiles are declared as
//! `DATASOURCE_<NAME> = <kind>|<baseUrl>|<timeoutMs>|<retryCount>` and parsed
//! once at startup. Parsing sits outside the execution core: the resulting
//! registry instance is dependency-injected into the executor, mutated only
//! via explicit calls, and never lazily initialized.

use crate::datasource::{DatasourceProfile, DatasourceRegistry};
use crate::errors::{ConfigurationError, FetchflowError};

/// Prefix selecting datasource definitions from the environment.
pub const DATASOURCE_ENV_PREFIX: &str = "DATASOURCE_";

/// Loads a `.env` file into the process environment when one is present.
pub fn load_env_file() {
    dotenvy::dotenv().ok();
}

/// Builds a registry from every `DATASOURCE_*` variable in the environment.
pub fn registry_from_env() -> Result<DatasourceRegistry, FetchflowError> {
    let registry = DatasourceRegistry::new();
    for (key, raw) in std::env::vars() {
        if let Some(name) = key.strip_prefix(DATASOURCE_ENV_PREFIX) {
            if name.is_empty() {
                continue;
            }
            registry.register(parse_profile_entry(name, &raw)?)?;
            tracing::debug!(datasource = name, "Registered datasource from environment");
        }
    }
    Ok(registry)
}

/// Parses one `<kind>|<baseUrl>|<timeoutMs>|<retryCount>` entry.
pub fn parse_profile_entry(
    name: &str,
    raw: &str,
) -> Result<DatasourceProfile, ConfigurationError> {
    let parts: Vec<&str> = raw.split('|').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(ConfigurationError::new(format!(
            "Datasource '{name}' has a malformed definition '{raw}': \
             expected <kind>|<baseUrl>|<timeoutMs>|<retryCount>"
        )));
    }

    let timeout_ms = parts[2].parse::<u64>().map_err(|_| {
        ConfigurationError::new(format!(
            "Datasource '{name}' has a non-numeric timeout '{}'",
            parts[2]
        ))
    })?;
    let retry_budget = parts[3].parse::<u32>().map_err(|_| {
        ConfigurationError::new(format!(
            "Datasource '{name}' has a non-numeric retry count '{}'",
            parts[3]
        ))
    })?;

    Ok(DatasourceProfile::new(name, parts[0], parts[1])
        .with_timeout_ms(timeout_ms)
        .with_retry_budget(retry_budget))
}
