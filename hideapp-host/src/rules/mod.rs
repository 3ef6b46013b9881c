//! Hide rules
//!
//! A [`RuleTable`] maps caller identities to the target identifiers hidden
//! from them. Tables are built whole and never edited once published; the
//! [`PolicyProvider`] swaps in a new table with a single pointer replacement,
//! so every reader sees either the old table or the new one.
//!
//! - `parse`: rule configuration strings to tables, and back
//! - `store`: the rule store the configuration string is exported from

pub mod parse;
pub mod store;

pub use parse::{encode_rules, parse_app_list, parse_rules, IdentityResolver, ParsedRules};
pub use store::{HiddenApp, MemoryRuleStore, ReadOnlyRuleStore, RuleStore, StoreError, TargetApp};

use hideapp_api::CallerId;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Immutable caller → hidden-target mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleTable {
    rules: HashMap<CallerId, HashSet<String>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(caller, hidden targets)` pairs, merging repeats
    pub fn from_mapping<I, H, S>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (CallerId, H)>,
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (caller, hidden) in mapping {
            table.insert(caller, hidden);
        }
        table
    }

    /// Add hidden targets for a caller while the table is still being built
    pub fn insert<H, S>(&mut self, caller: CallerId, hidden: H)
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self.rules.entry(caller).or_default();
        set.extend(hidden.into_iter().map(Into::into).filter(|s| !s.is_empty()));
        if set.is_empty() {
            self.rules.remove(&caller);
        }
    }

    /// Targets hidden from `caller`; `None` means the caller is unfiltered
    pub fn hidden_set_for(&self, caller: CallerId) -> Option<&HashSet<String>> {
        self.rules.get(&caller)
    }

    pub fn is_hidden(&self, caller: CallerId, target: &str) -> bool {
        self.rules
            .get(&caller)
            .is_some_and(|hidden| hidden.contains(target))
    }

    /// Remove a target from one caller's set while building
    pub fn unhide(&mut self, caller: CallerId, target: &str) {
        if let Some(hidden) = self.rules.get_mut(&caller) {
            hidden.remove(target);
            if hidden.is_empty() {
                self.rules.remove(&caller);
            }
        }
    }

    /// Callers with at least one hidden target, ascending
    pub fn callers(&self) -> Vec<CallerId> {
        let mut callers: Vec<CallerId> = self.rules.keys().copied().collect();
        callers.sort();
        callers
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Order-independent content hash, for audit records
    pub fn compute_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for caller in self.callers() {
            hasher.update(&caller.0.to_le_bytes());
            let mut hidden: Vec<&String> = self.rules[&caller].iter().collect();
            hidden.sort();
            for target in hidden {
                hasher.update(target.as_bytes());
                hasher.update(&[0]);
            }
            hasher.update(&[0xff]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Holder of the current rule snapshot, shared by every interception
#[derive(Debug, Clone, Default)]
pub struct PolicyProvider {
    current: Arc<RwLock<Arc<RuleTable>>>,
}

impl PolicyProvider {
    pub fn new(table: RuleTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// Publish a fully built table, returning the one it replaced
    pub fn set_rules(&self, table: RuleTable) -> Arc<RuleTable> {
        let next = Arc::new(table);
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *current, next)
    }

    /// Current table; stays valid and unchanged even if replaced meanwhile
    pub fn snapshot(&self) -> Arc<RuleTable> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_hidden(&self, caller: CallerId, target: &str) -> bool {
        self.snapshot().is_hidden(caller, target)
    }
}
