//! Registry of named datasource profiles.

use super::DatasourceProfile;
use crate::errors::{ConfigurationError, DatasourceNotFoundError};
use dashmap::DashMap;

/// Holds named backend connection profiles for case-insensitive lookup.
///
/// Reads vastly outnumber writes; registration is administrative.
/// Re-registering a name overwrites the previous profile: last registration
/// wins, deliberately and silently.
#[derive(Debug, Default)]
pub struct DatasourceRegistry {
    profiles: DashMap<String, DatasourceProfile>,
}

impl DatasourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile, inserting or overwriting under its lower-cased
    /// name.
    pub fn register(&self, profile: DatasourceProfile) -> Result<(), ConfigurationError> {
        profile.validate()?;
        self.profiles.insert(profile.name.to_lowercase(), profile);
        Ok(())
    }

    /// Resolves a profile by case-insensitive name.
    pub fn resolve(&self, name: &str) -> Result<DatasourceProfile, DatasourceNotFoundError> {
        self.profiles
            .get(&name.to_lowercase())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DatasourceNotFoundError::new(name, self.names()))
    }

    /// Removes a profile if present, returning whether one was removed.
    ///
    /// Unregistering an unknown name is a no-op, not an error.
    pub fn unregister(&self, name: &str) -> bool {
        self.profiles.remove(&name.to_lowercase()).is_some()
    }

    /// Lists registered names in their original casing, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .profiles
            .iter()
            .map(|entry| entry.value().name.clone())
            .collect();
        names.sort();
        names
    }

    /// Returns the number of registered profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Returns true when no profiles are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> DatasourceProfile {
        DatasourceProfile::new(name, "rest", "http://localhost:9999")
    }

    #[test]
    fn test_register_and_resolve_any_case_variant() {
        let registry = DatasourceRegistry::new();
        registry.register(profile("UserService")).unwrap();

        for variant in ["UserService", "userservice", "USERSERVICE", "uSeRsErViCe"] {
            let resolved = registry.resolve(variant).unwrap();
            assert_eq!(resolved.name, "UserService");
        }
    }

    #[test]
    fn test_resolve_unknown_lists_available_names() {
        let registry = DatasourceRegistry::new();
        registry.register(profile("users")).unwrap();
        registry.register(profile("payments")).unwrap();

        let err = registry.resolve("orders").unwrap_err();
        assert_eq!(err.name, "orders");
        assert_eq!(err.available, vec!["payments", "users"]);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = DatasourceRegistry::new();
        registry.register(profile("Users")).unwrap();
        registry
            .register(profile("USERS").with_timeout_ms(1_234))
            .unwrap();

        assert_eq!(registry.len(), 1);
        let resolved = registry.resolve("users").unwrap();
        assert_eq!(resolved.name, "USERS");
        assert_eq!(resolved.timeout_ms, 1_234);
    }

    #[test]
    fn test_unregister_then_resolve_fails() {
        let registry = DatasourceRegistry::new();
        registry.register(profile("users")).unwrap();

        assert!(registry.unregister("USERS"));
        assert!(!registry.unregister("users"));
        assert!(registry.resolve("users").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_rejects_invalid_profile() {
        let registry = DatasourceRegistry::new();
        let result = registry.register(profile("users").with_retry_budget(0));

        assert!(result.is_err());
        assert!(registry.is_empty());
    }
}
