//! Secrets and their per-stage scoping.
//!
//! A stage only ever sees the secrets it lists under `secrets:`. The engine
//! resolves those names against a [`SecretStore`] right before the stage
//! runs and hands the stage a [`ScopedSecrets`]; nothing else is exposed.

mod store;

pub use store::{EnvSecretStore, MapSecretStore, SecretStore};

use crate::stages::base::StageError;
use std::collections::BTreeMap;
use std::fmt;

/// Replacement text for masked secret values.
pub const MASK: &str = "***";

/// An opaque credential.
///
/// `Debug` and `Display` never print the value. There is no `Serialize`
/// implementation, so a secret cannot end up in a run record.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for handing to a tool.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({MASK})")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

/// The secrets visible to one stage.
#[derive(Debug, Clone, Default)]
pub struct ScopedSecrets {
    values: BTreeMap<String, Secret>,
}

impl ScopedSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, secret: Secret) -> Self {
        self.values.insert(name.into(), secret);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Secret> {
        self.values.get(name)
    }

    /// Look up a secret the stage's settings depend on.
    ///
    /// Fails when the stage did not declare it, even if the store has it.
    pub fn require(&self, name: &str) -> Result<&Secret, StageError> {
        self.get(name).ok_or_else(|| {
            StageError::MissingSecret(format!("'{name}' is not declared for this stage"))
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fragments that must never appear in output.
    ///
    /// Multi-line values (service-account key files) also contribute each
    /// of their longer lines, since tools print them line by line.
    pub(crate) fn mask_fragments(&self) -> Vec<String> {
        let mut fragments: Vec<String> = Vec::new();
        for secret in self.values.values() {
            let value = secret.expose();
            if value.is_empty() {
                continue;
            }
            fragments.push(value.to_string());
            if value.contains('\n') {
                fragments.extend(
                    value
                        .lines()
                        .map(str::trim)
                        .filter(|line| line.len() >= 8)
                        .map(str::to_string),
                );
            }
        }
        // Longest first so a value containing another is masked whole.
        fragments.sort_by_key(|f| std::cmp::Reverse(f.len()));
        fragments.dedup();
        fragments
    }
}

/// Resolve the declared secret `names` of a stage against `store`.
pub fn scope(store: &dyn SecretStore, names: &[String]) -> Result<ScopedSecrets, StageError> {
    let mut scoped = ScopedSecrets::new();
    let mut missing = Vec::new();
    for name in names {
        match store.get(name) {
            Some(secret) => scoped = scoped.with(name.clone(), secret),
            None => missing.push(name.as_str()),
        }
    }
    if missing.is_empty() {
        Ok(scoped)
    } else {
        Err(StageError::MissingSecret(format!(
            "not found in secret store: {}",
            missing.join(", ")
        )))
    }
}

/// Replace every fragment in `line` with [`MASK`].
pub(crate) fn mask_line(line: &str, fragments: &[String]) -> String {
    let mut masked = line.to_string();
    for fragment in fragments {
        if masked.contains(fragment.as_str()) {
            masked = masked.replace(fragment.as_str(), MASK);
        }
    }
    masked
}
