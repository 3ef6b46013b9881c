//! Hook transactions
//!
//! Interceptions spliced under an open transaction stay dormant: their
//! handlers check the transaction's [`ActivationGate`] and fall through to
//! the original call until the transaction commits. Rolling back restores
//! every spliced method in reverse installation order. Dropping an open
//! transaction rolls it back.

use crate::dispatch::{DispatchPatcher, MethodRef};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

/// Shared switch making a transaction's interceptions observable
#[derive(Debug, Clone, Default)]
pub struct ActivationGate(Arc<AtomicBool>);

impl ActivationGate {
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn open(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// What a finished transaction did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSummary {
    pub state: TransactionState,
    pub installed: Vec<MethodRef>,
    pub required_failures: Vec<String>,
    /// Methods whose restore failed during rollback
    pub restore_failures: Vec<MethodRef>,
}

pub struct HookTransaction<'p> {
    patcher: &'p dyn DispatchPatcher,
    state: TransactionState,
    gate: ActivationGate,
    installed: Vec<MethodRef>,
    required_failures: Vec<String>,
}

impl<'p> HookTransaction<'p> {
    pub fn begin(patcher: &'p dyn DispatchPatcher) -> Self {
        tracing::debug!("Hook transaction opened");
        Self {
            patcher,
            state: TransactionState::Open,
            gate: ActivationGate::default(),
            installed: Vec::new(),
            required_failures: Vec::new(),
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Gate every handler spliced under this transaction must check
    pub fn gate(&self) -> ActivationGate {
        self.gate.clone()
    }

    pub fn record_installed(&mut self, target: MethodRef) {
        self.installed.push(target);
    }

    pub fn record_required_failure(&mut self, target: impl Into<String>) {
        self.required_failures.push(target.into());
    }

    pub fn contains(&self, target: &MethodRef) -> bool {
        self.installed.contains(target)
    }

    pub fn installed_count(&self) -> usize {
        self.installed.len()
    }

    /// Activate every interception installed under this transaction
    pub fn commit(mut self) -> TransactionSummary {
        self.gate.open();
        self.state = TransactionState::Committed;
        tracing::info!(installed = self.installed.len(), "Hook transaction committed");
        self.summary(Vec::new())
    }

    /// Restore every method spliced under this transaction
    pub fn rollback(mut self) -> TransactionSummary {
        let restore_failures = self.restore_all();
        self.summary(restore_failures)
    }

    fn restore_all(&mut self) -> Vec<MethodRef> {
        let mut failures = Vec::new();
        for target in self.installed.iter().rev() {
            if let Err(e) = self.patcher.uninstall(&target.class, &target.method) {
                tracing::error!(target = %target, error = %e, "Failed to restore original call path");
                failures.push(target.clone());
            }
        }
        self.state = TransactionState::RolledBack;
        tracing::warn!(
            reverted = self.installed.len() - failures.len(),
            required_failures = ?self.required_failures,
            "Hook transaction rolled back"
        );
        failures
    }

    fn summary(&mut self, restore_failures: Vec<MethodRef>) -> TransactionSummary {
        TransactionSummary {
            state: self.state,
            installed: std::mem::take(&mut self.installed),
            required_failures: std::mem::take(&mut self.required_failures),
            restore_failures,
        }
    }
}

impl Drop for HookTransaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Open {
            self.restore_all();
        }
    }
}
