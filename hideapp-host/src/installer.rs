//! Transactional installer
//!
//! Applies an [`InterceptionRegistry`] to the live runtime all-or-nothing.
//! Every handler is spliced dormant under one [`HookTransaction`]; only a
//! commit makes them observable. Any required failure, a signature defect
//! or too few installed hooks rolls the whole batch back.
//!
//! The outcome is kept for the life of the installer: a second
//! `install_all` returns it without touching the dispatch table.

use crate::audit::{self, AuditSink, NullAuditSink};
use crate::backup::NativeCallBackup;
use crate::dispatch::{Delegate, DispatchPatcher, Handler, MethodRef};
use crate::error::HookError;
use crate::registry::{Behavior, InterceptionRegistry, MethodInterception};
use crate::signature;
use crate::transaction::{ActivationGate, HookTransaction};
use hideapp_api::{Invocation, RuntimeVersion};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Commit threshold for an install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPolicy {
    /// Fewer installed interceptions than this and the batch is rolled back
    pub min_installed_hooks: usize,
}

impl Default for InstallPolicy {
    fn default() -> Self {
        // One concrete hook beyond the baseline
        Self {
            min_installed_hooks: 2,
        }
    }
}

/// What a committed install put in place
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<MethodRef>,
    /// Optional targets or interceptions left out, with the reason
    pub skipped: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
enum InstallState {
    NotAttempted,
    Installed(InstallReport),
    Failed(String),
}

pub struct TransactionalInstaller {
    policy: InstallPolicy,
    backup: NativeCallBackup,
    state: Mutex<InstallState>,
    installed: AtomicBool,
    audit: Arc<dyn AuditSink>,
}

impl TransactionalInstaller {
    pub fn new(policy: InstallPolicy) -> Self {
        Self::with_audit(policy, Arc::new(NullAuditSink::new()))
    }

    pub fn with_audit(policy: InstallPolicy, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            policy,
            backup: NativeCallBackup::new(),
            state: Mutex::new(InstallState::NotAttempted),
            installed: AtomicBool::new(false),
            audit,
        }
    }

    pub fn policy(&self) -> InstallPolicy {
        self.policy
    }

    /// Whether a committed install is in place
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    pub fn report(&self) -> Option<InstallReport> {
        match &*self.lock_state() {
            InstallState::Installed(report) => Some(report.clone()),
            _ => None,
        }
    }

    /// Reason of the last failed install, if it failed
    pub fn failure(&self) -> Option<String> {
        match &*self.lock_state() {
            InstallState::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    pub fn backup(&self) -> &NativeCallBackup {
        &self.backup
    }

    /// Forget a failed outcome so the next `install_all` tries again
    ///
    /// A committed install is never forgotten.
    pub fn retry(&self) -> bool {
        let mut state = self.lock_state();
        if matches!(*state, InstallState::Failed(_)) {
            *state = InstallState::NotAttempted;
            return true;
        }
        false
    }

    /// Install every interception in `registry`, or none of them
    pub fn install_all(&self, patcher: &dyn DispatchPatcher, registry: &InterceptionRegistry) -> bool {
        // Held for the whole install: concurrent attempts wait, then see the outcome
        let mut state = self.lock_state();
        match &*state {
            InstallState::Installed(_) => return true,
            InstallState::Failed(_) => return false,
            InstallState::NotAttempted => {}
        }

        match self.run(patcher, registry) {
            Ok(report) => {
                tracing::info!(
                    installed = report.installed.len(),
                    skipped = report.skipped.len(),
                    "Interceptions installed"
                );
                *state = InstallState::Installed(report);
                self.installed.store(true, Ordering::Release);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Interception install failed, registry stays unfiltered");
                *state = InstallState::Failed(e.to_string());
                false
            }
        }
    }

    fn run(
        &self,
        patcher: &dyn DispatchPatcher,
        registry: &InterceptionRegistry,
    ) -> Result<InstallReport, HookError> {
        let version = patcher.runtime_version();
        let mut tx = HookTransaction::begin(patcher);
        let gate = tx.gate();
        let mut skipped = Vec::new();

        for entry in registry.iter() {
            let descriptor = &entry.descriptor;
            let anchor = descriptor.anchor.to_string();

            if !descriptor.applies_to(version) {
                self.skip(&mut skipped, &anchor, &format!("not present on runtime {}", version));
                continue;
            }

            let class = match patcher.locate(&descriptor.anchor) {
                Ok(class) => class,
                Err(e) if descriptor.required => {
                    tx.record_required_failure(anchor);
                    return Err(self.abort(tx, e));
                }
                Err(e) => {
                    self.skip(&mut skipped, &anchor, &e.to_string());
                    continue;
                }
            };
            tracing::debug!(target = %anchor, class = %class, "Target located");

            for interception in &entry.interceptions {
                match self.install_one(patcher, &mut tx, &gate, &class, interception, version) {
                    Ok(()) => {}
                    Err(e) if e.is_build_defect() || descriptor.required => {
                        tx.record_required_failure(format!("{}.{}", class, interception.operation));
                        return Err(self.abort(tx, e));
                    }
                    Err(e) => {
                        if !e.is_skippable() {
                            tracing::error!(error = %e, "Optional interception could not be spliced");
                        }
                        let target = format!("{}.{}", class, interception.operation);
                        self.skip(&mut skipped, &target, &e.to_string());
                    }
                }
            }
        }

        let installed = tx.installed_count();
        if installed < self.policy.min_installed_hooks {
            let e = HookError::ThresholdNotMet {
                installed,
                required: self.policy.min_installed_hooks,
            };
            return Err(self.abort(tx, e));
        }

        let summary = tx.commit();
        audit::emit(&*self.audit, audit::transaction_committed(summary.installed.len()));
        Ok(InstallReport {
            installed: summary.installed,
            skipped,
        })
    }

    fn install_one(
        &self,
        patcher: &dyn DispatchPatcher,
        tx: &mut HookTransaction<'_>,
        gate: &ActivationGate,
        class: &str,
        interception: &MethodInterception,
        version: RuntimeVersion,
    ) -> Result<(), HookError> {
        let variant = signature::resolve(&interception.operation, &interception.variants, version)?;
        let key = variant.key(&interception.operation);
        let target = MethodRef::new(class, key.clone());
        if tx.contains(&target) {
            tracing::debug!(target = %target, "Interception already installed");
            return Ok(());
        }

        let delegate = self.backup.capture(patcher, class, &key)?;
        let handler = gated(gate.clone(), delegate, interception.behavior.clone());
        patcher.install(class, &key, handler)?;

        tracing::debug!(target = %target, "Interception spliced");
        audit::emit(&*self.audit, audit::hook_installed(&target));
        tx.record_installed(target);
        Ok(())
    }

    fn skip(&self, skipped: &mut Vec<(String, String)>, target: &str, reason: &str) {
        tracing::warn!(target, reason, "Optional hook skipped");
        audit::emit(&*self.audit, audit::hook_skipped(target, reason));
        skipped.push((target.to_string(), reason.to_string()));
    }

    fn abort(&self, tx: HookTransaction<'_>, error: HookError) -> HookError {
        let summary = tx.rollback();
        // Originals are back in place; a retry must capture afresh
        self.backup.clear();
        let reverted = summary.installed.len() - summary.restore_failures.len();
        audit::emit(
            &*self.audit,
            audit::transaction_rolled_back(reverted, &error.to_string()),
        );
        error
    }

    fn lock_state(&self) -> MutexGuard<'_, InstallState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for TransactionalInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionalInstaller")
            .field("policy", &self.policy)
            .field("installed", &self.is_installed())
            .field("delegates", &self.backup.len())
            .finish()
    }
}

/// Wrap a behavior so it only runs once `gate` opens
fn gated(gate: ActivationGate, delegate: Delegate, behavior: Behavior) -> Handler {
    Arc::new(move |invocation: &Invocation| {
        if gate.is_active() {
            behavior(&delegate, invocation)
        } else {
            delegate.call(invocation)
        }
    })
}
