use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use super::domain::{ParameterDefinition, ParameterPatch};

/// Errors raised by registry lookups and admin mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("parameter '{0}' not found")]
    NotFound(String),
    #[error("parameter with key '{0}' already exists")]
    Duplicate(String),
    #[error("parameter key must be a non-empty identifier without surrounding whitespace")]
    InvalidKey,
}

/// Process-wide store of parameter definitions keyed by `key`.
///
/// All inserts go through the write lock, which makes the registry the single
/// writer for key creation: two callers racing on the same key observe exactly
/// one definition.
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    definitions: RwLock<BTreeMap<String, ParameterDefinition>>,
}

/// Immutable copy of the registry taken at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    definitions: BTreeMap<String, ParameterDefinition>,
}

/// Display labels keyed by parameter key, with the key as fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterLabels(BTreeMap<String, String>);

/// Read access to the registry as it will look once staged definitions publish.
///
/// Only available inside [`ParameterRegistry::extend_with`], while the write
/// lock is held.
#[derive(Debug)]
pub struct LiveSchema<'a> {
    live: &'a BTreeMap<String, ParameterDefinition>,
    pending: &'a [ParameterDefinition],
}

impl LiveSchema<'_> {
    pub fn resolves(&self, key: &str) -> bool {
        self.live.contains_key(key) || self.pending.iter().any(|definition| definition.key == key)
    }
}

/// Outcome of publishing staged definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryExtension {
    /// Keys inserted by this extension.
    pub created: Vec<String>,
    /// Staged keys that another writer created first; rules bind to the survivor.
    pub rebound: Vec<String>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definitions<I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = ParameterDefinition>,
    {
        let registry = Self::new();
        registry.seed(definitions);
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ParameterDefinition>> {
        self.definitions.read().expect("registry lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ParameterDefinition>> {
        self.definitions.write().expect("registry lock poisoned")
    }

    pub fn lookup(&self, key: &str) -> Result<ParameterDefinition, RegistryError> {
        self.read()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Definitions offered to new submissions, ordered by key.
    pub fn active(&self) -> Vec<ParameterDefinition> {
        self.read()
            .values()
            .filter(|definition| definition.active)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<ParameterDefinition> {
        self.read().values().cloned().collect()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            definitions: self.read().clone(),
        }
    }

    /// Labels for every definition, inactive ones included, so existing rules
    /// keep rendering after a field is retired.
    pub fn labels(&self) -> ParameterLabels {
        self.snapshot().labels()
    }

    /// Inserts definitions whose keys are absent; returns how many were added.
    pub fn seed<I>(&self, definitions: I) -> usize
    where
        I: IntoIterator<Item = ParameterDefinition>,
    {
        let mut guard = self.write();
        let mut inserted = 0;
        for definition in definitions {
            if !guard.contains_key(&definition.key) {
                guard.insert(definition.key.clone(), definition);
                inserted += 1;
            }
        }
        inserted
    }

    pub fn create(
        &self,
        definition: ParameterDefinition,
    ) -> Result<ParameterDefinition, RegistryError> {
        if !is_valid_key(&definition.key) {
            return Err(RegistryError::InvalidKey);
        }

        let mut guard = self.write();
        if guard.contains_key(&definition.key) {
            return Err(RegistryError::Duplicate(definition.key));
        }
        guard.insert(definition.key.clone(), definition.clone());
        info!(key = %definition.key, data_type = definition.data_type.label(), "parameter created");
        Ok(definition)
    }

    pub fn update(
        &self,
        key: &str,
        patch: ParameterPatch,
    ) -> Result<ParameterDefinition, RegistryError> {
        let mut guard = self.write();
        let definition = guard
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;
        patch.apply(definition);
        Ok(definition.clone())
    }

    /// Hides the definition from new submissions; rules keep evaluating against it.
    pub fn deactivate(&self, key: &str) -> Result<ParameterDefinition, RegistryError> {
        self.update(
            key,
            ParameterPatch {
                active: Some(false),
                ..ParameterPatch::default()
            },
        )
    }

    /// Physically removes a definition once `check` approves. The check runs
    /// under the write lock, and every path that binds rules to keys
    /// (ingestion and rule administration through `extend_with`) holds the
    /// same lock, so nothing can bind the key in between. `check` must not
    /// call back into the registry.
    pub fn remove_checked<E, F>(&self, key: &str, check: F) -> Result<ParameterDefinition, E>
    where
        E: From<RegistryError>,
        F: FnOnce(&str) -> Result<(), E>,
    {
        let mut guard = self.write();
        if !guard.contains_key(key) {
            return Err(RegistryError::NotFound(key.to_string()).into());
        }
        check(key)?;
        guard
            .remove(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()).into())
    }

    /// Publishes `staged` definitions together with a dependent commit.
    ///
    /// Under the write lock, each staged key is re-resolved against the live
    /// registry: keys created meanwhile are skipped and reported as rebound.
    /// `commit` then runs with the resolved extension and a view of the keys
    /// that will exist afterwards; staged definitions are inserted only if it
    /// succeeds, so a failed commit leaves the registry untouched. `commit`
    /// must not call back into the registry.
    pub fn extend_with<T, E, F>(
        &self,
        staged: Vec<ParameterDefinition>,
        commit: F,
    ) -> Result<(T, RegistryExtension), E>
    where
        F: FnOnce(&RegistryExtension, &LiveSchema<'_>) -> Result<T, E>,
    {
        let mut guard = self.write();
        let mut extension = RegistryExtension::default();
        let mut pending = Vec::new();

        for definition in staged {
            let duplicate_in_batch = pending
                .iter()
                .any(|queued: &ParameterDefinition| queued.key == definition.key);
            if guard.contains_key(&definition.key) {
                debug!(key = %definition.key, "staged parameter already registered; rebinding");
                extension.rebound.push(definition.key);
            } else if !duplicate_in_batch {
                extension.created.push(definition.key.clone());
                pending.push(definition);
            }
        }

        let schema = LiveSchema {
            live: &guard,
            pending: &pending,
        };
        let value = commit(&extension, &schema)?;

        for definition in pending {
            guard.insert(definition.key.clone(), definition);
        }

        Ok((value, extension))
    }
}

impl RegistrySnapshot {
    pub fn contains(&self, key: &str) -> bool {
        self.definitions.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ParameterDefinition> {
        self.definitions.get(key)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.definitions.values()
    }

    pub fn labels(&self) -> ParameterLabels {
        ParameterLabels(
            self.definitions
                .values()
                .map(|definition| (definition.key.clone(), definition.label.clone()))
                .collect(),
        )
    }
}

impl FromIterator<ParameterDefinition> for RegistrySnapshot {
    fn from_iter<I: IntoIterator<Item = ParameterDefinition>>(iter: I) -> Self {
        Self {
            definitions: iter
                .into_iter()
                .map(|definition| (definition.key.clone(), definition))
                .collect(),
        }
    }
}

impl ParameterLabels {
    pub fn label_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.0.get(key).map(String::as_str).unwrap_or(key)
    }
}

impl FromIterator<(String, String)> for ParameterLabels {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.trim() == key && !key.chars().any(char::is_whitespace)
}
