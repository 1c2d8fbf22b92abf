//! Secret stores.

use super::Secret;
use std::collections::HashMap;

/// Source of named secrets.
pub trait SecretStore: Send + Sync {
    fn get(&self, name: &str) -> Option<Secret>;
}

/// Reads secrets from environment variables of the same name.
///
/// This is how CI systems hand secrets to a job. Empty variables count as
/// unset.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, name: &str) -> Option<Secret> {
        std::env::var(name)
            .ok()
            .filter(|value| !value.is_empty())
            .map(Secret::new)
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MapSecretStore {
    values: HashMap<String, Secret>,
}

impl MapSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), Secret::new(value));
        self
    }
}

impl SecretStore for MapSecretStore {
    fn get(&self, name: &str) -> Option<Secret> {
        self.values.get(name).cloned()
    }
}
