//! Dispatch table seam
//!
//! The engine never touches a platform's method tables directly. It talks to
//! a [`DispatchPatcher`], which knows how to find a target class, hand out a
//! callable for the original implementation, and splice a replacement into
//! the live call path. [`MemoryDispatchTable`] is the in-process
//! implementation used to host and exercise interceptions.

use crate::error::HookError;
use hideapp_api::{CallError, CallResult, Invocation, MethodKey, RuntimeVersion};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Callable body of a dispatched method
pub type Handler = Arc<dyn Fn(&Invocation) -> CallResult + Send + Sync>;

/// How a target class is found in the running host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetAnchor {
    /// Fully qualified class name
    Class(String),
    /// Concrete type of a well-known live object
    ObjectType(String),
}

impl TargetAnchor {
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    pub fn object_type(object: impl Into<String>) -> Self {
        Self::ObjectType(object.into())
    }
}

impl fmt::Display for TargetAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(name) => f.write_str(name),
            Self::ObjectType(object) => write!(f, "typeof({})", object),
        }
    }
}

/// A concrete method in a concrete class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: String,
    pub method: MethodKey,
}

impl MethodRef {
    pub fn new(class: impl Into<String>, method: MethodKey) -> Self {
        Self {
            class: class.into(),
            method,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)
    }
}

/// Callable performing the original, pre-interception operation
#[derive(Clone)]
pub struct Delegate {
    target: MethodRef,
    call: Handler,
}

impl Delegate {
    pub fn new(target: MethodRef, call: Handler) -> Self {
        Self { target, call }
    }

    /// Invoke the original implementation
    pub fn call(&self, invocation: &Invocation) -> CallResult {
        (self.call)(invocation)
    }

    pub fn target(&self) -> &MethodRef {
        &self.target
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("target", &self.target)
            .finish()
    }
}

/// Platform strategy for splicing interceptions into a live dispatch path
///
/// Implemented once per target platform; the installer depends only on
/// this trait.
pub trait DispatchPatcher: Send + Sync {
    /// API level of the running host
    fn runtime_version(&self) -> RuntimeVersion;

    /// Resolve an anchor to the concrete class name it designates
    fn locate(&self, anchor: &TargetAnchor) -> Result<String, HookError>;

    /// Obtain a callable for the method's original implementation
    fn capture(&self, class: &str, method: &MethodKey) -> Result<Delegate, HookError>;

    /// Route calls of the method through `handler`
    fn install(&self, class: &str, method: &MethodKey, handler: Handler) -> Result<(), HookError>;

    /// Restore the method's original call path
    fn uninstall(&self, class: &str, method: &MethodKey) -> Result<(), HookError>;

    /// Whether a replacement currently sits on the method's call path
    fn is_installed(&self, class: &str, method: &MethodKey) -> bool;
}

// ============================================================================
// In-memory dispatch table
// ============================================================================

struct Slot {
    original: Handler,
    replacement: Option<Handler>,
}

/// Dispatch table held in process memory
///
/// Classes and their methods are defined up front; registry callers go
/// through [`MemoryDispatchTable::invoke`], which runs the replacement when
/// one is installed and the original otherwise.
pub struct MemoryDispatchTable {
    version: RuntimeVersion,
    classes: RwLock<HashMap<String, HashMap<MethodKey, Slot>>>,
    objects: RwLock<HashMap<String, String>>,
    refused: RwLock<HashSet<MethodRef>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MemoryDispatchTable {
    pub fn new(version: RuntimeVersion) -> Self {
        Self {
            version,
            classes: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            refused: RwLock::new(HashSet::new()),
        }
    }

    /// Define (or redefine) a method's original implementation
    pub fn define<F>(&self, class: &str, method: MethodKey, body: F) -> &Self
    where
        F: Fn(&Invocation) -> CallResult + Send + Sync + 'static,
    {
        write(&self.classes).entry(class.to_string()).or_default().insert(
            method,
            Slot {
                original: Arc::new(body),
                replacement: None,
            },
        );
        self
    }

    /// Make `object` resolvable through [`TargetAnchor::ObjectType`]
    pub fn bind_object(&self, object: &str, class: &str) -> &Self {
        write(&self.objects).insert(object.to_string(), class.to_string());
        self
    }

    /// Make every later `install` of this method fail
    pub fn refuse_patch(&self, class: &str, method: MethodKey) -> &Self {
        write(&self.refused).insert(MethodRef::new(class, method));
        self
    }

    /// Call a method through its live dispatch path
    pub fn invoke(&self, class: &str, method: &MethodKey, invocation: &Invocation) -> CallResult {
        let handler = {
            let classes = read(&self.classes);
            let slot = classes
                .get(class)
                .and_then(|methods| methods.get(method))
                .ok_or_else(|| CallError::Remote(format!("No method {}.{}", class, method)))?;
            slot.replacement
                .clone()
                .unwrap_or_else(|| slot.original.clone())
        };
        // Lock released before the body runs; bodies may re-enter the table
        handler(invocation)
    }

    /// Call whichever signature of `name` this runtime defines
    pub fn invoke_named(&self, class: &str, name: &str, invocation: &Invocation) -> CallResult {
        let key = read(&self.classes)
            .get(class)
            .and_then(|methods| methods.keys().find(|k| k.name == name).cloned())
            .ok_or_else(|| CallError::Remote(format!("No method {}.{}", class, name)))?;
        self.invoke(class, &key, invocation)
    }

    /// Number of methods currently routed through a replacement
    pub fn installed_count(&self) -> usize {
        read(&self.classes)
            .values()
            .flat_map(|methods| methods.values())
            .filter(|slot| slot.replacement.is_some())
            .count()
    }
}

impl DispatchPatcher for MemoryDispatchTable {
    fn runtime_version(&self) -> RuntimeVersion {
        self.version
    }

    fn locate(&self, anchor: &TargetAnchor) -> Result<String, HookError> {
        let class = match anchor {
            TargetAnchor::Class(name) => Some(name.clone()),
            TargetAnchor::ObjectType(object) => read(&self.objects).get(object).cloned(),
        };
        match class {
            Some(class) if read(&self.classes).contains_key(&class) => Ok(class),
            _ => Err(HookError::resolution(anchor.to_string())),
        }
    }

    fn capture(&self, class: &str, method: &MethodKey) -> Result<Delegate, HookError> {
        let classes = read(&self.classes);
        let slot = classes
            .get(class)
            .and_then(|methods| methods.get(method))
            .ok_or_else(|| HookError::capture_failed(class, method, "method not defined"))?;
        Ok(Delegate::new(
            MethodRef::new(class, method.clone()),
            slot.original.clone(),
        ))
    }

    fn install(&self, class: &str, method: &MethodKey, handler: Handler) -> Result<(), HookError> {
        if read(&self.refused).contains(&MethodRef::new(class, method.clone())) {
            return Err(HookError::patch(class, method, "patch refused by host"));
        }
        let mut classes = write(&self.classes);
        let slot = classes
            .get_mut(class)
            .and_then(|methods| methods.get_mut(method))
            .ok_or_else(|| HookError::patch(class, method, "method not defined"))?;
        slot.replacement = Some(handler);
        Ok(())
    }

    fn uninstall(&self, class: &str, method: &MethodKey) -> Result<(), HookError> {
        let mut classes = write(&self.classes);
        let slot = classes
            .get_mut(class)
            .and_then(|methods| methods.get_mut(method))
            .ok_or_else(|| HookError::patch(class, method, "method not defined"))?;
        slot.replacement = None;
        Ok(())
    }

    fn is_installed(&self, class: &str, method: &MethodKey) -> bool {
        read(&self.classes)
            .get(class)
            .and_then(|methods| methods.get(method))
            .is_some_and(|slot| slot.replacement.is_some())
    }
}

impl fmt::Debug for MemoryDispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes = read(&self.classes).len();
        f.debug_struct("MemoryDispatchTable")
            .field("version", &self.version)
            .field("classes", &classes)
            .field("installed", &self.installed_count())
            .finish()
    }
}
