//! Interception registry
//!
//! A build-time container mapping target descriptors to the interceptions
//! installed on them. Iteration follows insertion order, which is the order
//! the installer applies (and rolls back) interceptions.

use crate::dispatch::{Delegate, TargetAnchor};
use crate::signature::{SignatureVariant, VersionRange};
use hideapp_api::{CallResult, Invocation, RuntimeVersion};
use std::fmt;
use std::sync::Arc;

/// Replacement body of an interception
///
/// Receives the delegate for the original call (already bound to the
/// resolved signature) and the incoming invocation.
pub type Behavior = Arc<dyn Fn(&Delegate, &Invocation) -> CallResult + Send + Sync>;

/// A class (or structural anchor) in the host runtime to intercept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub anchor: TargetAnchor,
    /// A failed resolve aborts the install when set; otherwise the target is skipped
    pub required: bool,
    pub versions: VersionRange,
}

impl TargetDescriptor {
    /// Required target identified by class name
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            anchor: TargetAnchor::class(name),
            required: true,
            versions: VersionRange::ANY,
        }
    }

    /// Required target identified as the concrete type of a live object
    pub fn object_type(object: impl Into<String>) -> Self {
        Self {
            anchor: TargetAnchor::object_type(object),
            required: true,
            versions: VersionRange::ANY,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn versions(mut self, versions: VersionRange) -> Self {
        self.versions = versions;
        self
    }

    pub fn applies_to(&self, version: RuntimeVersion) -> bool {
        self.versions.contains(version)
    }
}

/// One intercepted operation on a target
#[derive(Clone)]
pub struct MethodInterception {
    pub operation: String,
    pub variants: Vec<SignatureVariant>,
    pub behavior: Behavior,
}

impl MethodInterception {
    pub fn new(
        operation: impl Into<String>,
        variants: &[SignatureVariant],
        behavior: Behavior,
    ) -> Self {
        Self {
            operation: operation.into(),
            variants: variants.to_vec(),
            behavior,
        }
    }
}

impl fmt::Debug for MethodInterception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInterception")
            .field("operation", &self.operation)
            .field("variants", &self.variants)
            .finish()
    }
}

/// Descriptor with its interceptions
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub descriptor: TargetDescriptor,
    pub interceptions: Vec<MethodInterception>,
}

/// Ordered descriptor → interception-set mapping
#[derive(Debug, Clone, Default)]
pub struct InterceptionRegistry {
    entries: Vec<RegistryEntry>,
}

impl InterceptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interceptions for a target
    ///
    /// Registering the same anchor again appends to its existing entry.
    pub fn register(
        &mut self,
        descriptor: TargetDescriptor,
        interceptions: impl IntoIterator<Item = MethodInterception>,
    ) -> &mut Self {
        match self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.anchor == descriptor.anchor)
        {
            Some(entry) => {
                // The stricter declaration wins
                entry.descriptor.required |= descriptor.required;
                entry.interceptions.extend(interceptions);
            }
            None => self.entries.push(RegistryEntry {
                descriptor,
                interceptions: interceptions.into_iter().collect(),
            }),
        }
        self
    }

    /// Targets in installation order
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    /// Number of registered targets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of interceptions across all targets
    pub fn interception_count(&self) -> usize {
        self.entries.iter().map(|e| e.interceptions.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::FIXED;

    fn passthrough(name: &str) -> MethodInterception {
        MethodInterception::new(name, FIXED, Arc::new(|d: &Delegate, inv: &Invocation| d.call(inv)))
    }

    #[test]
    fn test_registry_preserves_insertion_order() {
        let mut registry = InterceptionRegistry::new();
        registry
            .register(TargetDescriptor::class("B"), [passthrough("b1")])
            .register(TargetDescriptor::class("A").optional(), [passthrough("a1")])
            .register(TargetDescriptor::class("C"), [passthrough("c1")]);

        let anchors: Vec<String> = registry
            .iter()
            .map(|e| e.descriptor.anchor.to_string())
            .collect();
        assert_eq!(anchors, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_registry_merges_same_anchor() {
        let mut registry = InterceptionRegistry::new();
        registry
            .register(TargetDescriptor::class("A").optional(), [passthrough("a1")])
            .register(TargetDescriptor::class("A"), [passthrough("a2")]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.interception_count(), 2);
        let entry = registry.iter().next().unwrap();
        assert!(entry.descriptor.required);
    }

    #[test]
    fn test_descriptor_version_bounds() {
        let descriptor = TargetDescriptor::class("AppsFilterBase")
            .optional()
            .versions(VersionRange::from(33));
        assert!(!descriptor.applies_to(RuntimeVersion(32)));
        assert!(descriptor.applies_to(RuntimeVersion(34)));
        assert!(!descriptor.required);
    }
}
