//! Native call backup
//!
//! Keeps one delegate per intercepted method, captured before anything is
//! spliced into that method's call path. Later captures of the same method
//! return the cached delegate, so the original stays reachable however many
//! times the live path is replaced. Delegates only outlive a committed
//! install; after a rollback the cache is cleared and the next attempt
//! captures again, checking for foreign instrumentation first.

use crate::dispatch::{Delegate, DispatchPatcher, MethodRef};
use crate::error::HookError;
use hideapp_api::MethodKey;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct NativeCallBackup {
    delegates: RwLock<HashMap<MethodRef, Delegate>>,
}

impl NativeCallBackup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture (or reuse) the delegate for `class.method`
    pub fn capture(
        &self,
        patcher: &dyn DispatchPatcher,
        class: &str,
        method: &MethodKey,
    ) -> Result<Delegate, HookError> {
        let target = MethodRef::new(class, method.clone());
        if let Some(delegate) = self.get(&target) {
            return Ok(delegate);
        }

        // Someone else's replacement already sits on this path
        if patcher.is_installed(class, method) {
            return Err(HookError::capture_failed(
                class,
                method,
                "already instrumented",
            ));
        }

        let delegate = patcher.capture(class, method)?;
        self.delegates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(target, delegate.clone());
        tracing::debug!(class, method = %method, "Original call captured");
        Ok(delegate)
    }

    pub fn get(&self, target: &MethodRef) -> Option<Delegate> {
        self.delegates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(target)
            .cloned()
    }

    /// Forget every captured delegate
    pub fn clear(&self) {
        self.delegates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.delegates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MemoryDispatchTable;
    use hideapp_api::{CallerId, Invocation, ParamShape, RuntimeVersion, Value};
    use std::sync::Arc;

    #[test]
    fn test_capture_is_cached() {
        let table = MemoryDispatchTable::new(RuntimeVersion(30));
        let key = MethodKey::new("count", ParamShape::Fixed);
        table.define("Svc", key.clone(), |_| Ok(Value::Int(1)));

        let backup = NativeCallBackup::new();
        backup.capture(&table, "Svc", &key).unwrap();
        table
            .install("Svc", &key, Arc::new(|_: &Invocation| Ok(Value::Int(2))))
            .unwrap();

        // Second capture after install returns the stored original
        let delegate = backup.capture(&table, "Svc", &key).unwrap();
        let inv = Invocation::new(CallerId(0), vec![]);
        assert_eq!(delegate.call(&inv).unwrap(), Value::Int(1));
        assert_eq!(backup.len(), 1);
    }

    #[test]
    fn test_foreign_instrumentation_rejected() {
        let table = MemoryDispatchTable::new(RuntimeVersion(30));
        let key = MethodKey::new("count", ParamShape::Fixed);
        table.define("Svc", key.clone(), |_| Ok(Value::Int(1)));
        table
            .install("Svc", &key, Arc::new(|_: &Invocation| Ok(Value::Int(9))))
            .unwrap();

        let backup = NativeCallBackup::new();
        assert!(matches!(
            backup.capture(&table, "Svc", &key),
            Err(HookError::CaptureFailed { .. })
        ));
        assert!(backup.is_empty());
    }

    #[test]
    fn test_cleared_backup_rechecks_instrumentation() {
        let table = MemoryDispatchTable::new(RuntimeVersion(30));
        let key = MethodKey::new("count", ParamShape::Fixed);
        table.define("Svc", key.clone(), |_| Ok(Value::Int(1)));

        let backup = NativeCallBackup::new();
        backup.capture(&table, "Svc", &key).unwrap();
        backup.clear();
        assert!(backup.is_empty());

        table
            .install("Svc", &key, Arc::new(|_: &Invocation| Ok(Value::Int(9))))
            .unwrap();
        assert!(matches!(
            backup.capture(&table, "Svc", &key),
            Err(HookError::CaptureFailed { .. })
        ));
    }
}
