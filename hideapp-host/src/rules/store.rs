//! Rule store
//!
//! The table the rule editor writes: target apps with an enabled flag, and
//! per target the apps hidden from it. The engine only ever reads the
//! exported configuration string.

use super::parse::encode_rules;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

/// Error type for rule store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Target not found: {0}")]
    NotFound(String),

    #[error("Store is read-only")]
    ReadOnly,
}

/// A caller app rules can be attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetApp {
    pub package: String,
    pub label: String,
    pub enabled: bool,
}

/// An app hidden from a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenApp {
    pub package: String,
    pub label: String,
}

impl HiddenApp {
    pub fn new(package: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            label: label.into(),
        }
    }
}

/// Key-value storage of hide rules
pub trait RuleStore: Send + Sync {
    /// All targets, ordered by package
    fn targets(&self) -> Result<Vec<TargetApp>, StoreError>;

    /// Add or update a target
    fn save_target(&self, package: &str, label: &str, enabled: bool) -> Result<(), StoreError>;

    /// Remove a target together with its rules
    fn delete_target(&self, package: &str) -> Result<(), StoreError>;

    /// Apps hidden from a target
    fn hidden_for(&self, package: &str) -> Result<Vec<HiddenApp>, StoreError>;

    /// Replace the apps hidden from a target
    fn save_hidden(&self, package: &str, hidden: Vec<HiddenApp>) -> Result<(), StoreError>;

    /// Rules of enabled targets hiding at least one app, ordered by target
    fn enabled_rules(&self) -> Result<Vec<(String, Vec<String>)>, StoreError> {
        let mut rules = Vec::new();
        for target in self.targets()?.into_iter().filter(|t| t.enabled) {
            let hidden: Vec<String> = self
                .hidden_for(&target.package)?
                .into_iter()
                .map(|h| h.package)
                .collect();
            if !hidden.is_empty() {
                rules.push((target.package, hidden));
            }
        }
        Ok(rules)
    }

    /// Configuration string handed to the plugin
    fn export_config(&self) -> Result<String, StoreError> {
        let rules = self.enabled_rules()?;
        Ok(encode_rules(rules.iter().map(|(target, hidden)| {
            (target.as_str(), hidden.iter().map(String::as_str))
        })))
    }
}

// ============================================================================
// Memory Rule Store
// ============================================================================

#[derive(Debug, Default)]
struct StoreData {
    targets: BTreeMap<String, TargetApp>,
    hidden: BTreeMap<String, Vec<HiddenApp>>,
}

/// In-memory rule store
#[derive(Default)]
pub struct MemoryRuleStore {
    data: RwLock<StoreData>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .targets
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RuleStore for MemoryRuleStore {
    fn targets(&self) -> Result<Vec<TargetApp>, StoreError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(data.targets.values().cloned().collect())
    }

    fn save_target(&self, package: &str, label: &str, enabled: bool) -> Result<(), StoreError> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.targets.insert(
            package.to_string(),
            TargetApp {
                package: package.to_string(),
                label: label.to_string(),
                enabled,
            },
        );
        Ok(())
    }

    fn delete_target(&self, package: &str) -> Result<(), StoreError> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.hidden.remove(package);
        data.targets
            .remove(package)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(package.to_string()))
    }

    fn hidden_for(&self, package: &str) -> Result<Vec<HiddenApp>, StoreError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(data.hidden.get(package).cloned().unwrap_or_default())
    }

    fn save_hidden(&self, package: &str, hidden: Vec<HiddenApp>) -> Result<(), StoreError> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        if !data.targets.contains_key(package) {
            return Err(StoreError::NotFound(package.to_string()));
        }
        data.hidden.insert(package.to_string(), hidden);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryRuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRuleStore")
            .field("targets", &self.len())
            .finish()
    }
}

// ============================================================================
// Read-Only Rule Store
// ============================================================================

/// Read-only wrapper for any rule store
pub struct ReadOnlyRuleStore<S: RuleStore> {
    inner: S,
}

impl<S: RuleStore> ReadOnlyRuleStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: RuleStore> RuleStore for ReadOnlyRuleStore<S> {
    fn targets(&self) -> Result<Vec<TargetApp>, StoreError> {
        self.inner.targets()
    }

    fn save_target(&self, _package: &str, _label: &str, _enabled: bool) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn delete_target(&self, _package: &str) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn hidden_for(&self, package: &str) -> Result<Vec<HiddenApp>, StoreError> {
        self.inner.hidden_for(package)
    }

    fn save_hidden(&self, _package: &str, _hidden: Vec<HiddenApp>) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }
}

impl<S: RuleStore + std::fmt::Debug> std::fmt::Debug for ReadOnlyRuleStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyRuleStore")
            .field("inner", &self.inner)
            .finish()
    }
}
