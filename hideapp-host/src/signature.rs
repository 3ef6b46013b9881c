//! Version-aware signature resolution
//!
//! A logical operation carries a short ordered list of signature variants,
//! each bounded to a runtime version range. Exactly one variant exists in
//! any running instance, so resolution must pick exactly one.

use crate::error::HookError;
use hideapp_api::{MethodKey, ParamShape, RuntimeVersion};
use serde::{Deserialize, Serialize};

/// Inclusive runtime version bounds; an open side is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: Option<RuntimeVersion>,
    pub max: Option<RuntimeVersion>,
}

impl VersionRange {
    /// Matches every version
    pub const ANY: Self = Self {
        min: None,
        max: None,
    };

    pub const fn up_to(max: u32) -> Self {
        Self {
            min: None,
            max: Some(RuntimeVersion(max)),
        }
    }

    pub const fn from(min: u32) -> Self {
        Self {
            min: Some(RuntimeVersion(min)),
            max: None,
        }
    }

    pub const fn between(min: u32, max: u32) -> Self {
        Self {
            min: Some(RuntimeVersion(min)),
            max: Some(RuntimeVersion(max)),
        }
    }

    pub fn contains(&self, version: RuntimeVersion) -> bool {
        self.min.map_or(true, |min| version >= min) && self.max.map_or(true, |max| version <= max)
    }
}

/// One concrete signature of a logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureVariant {
    pub range: VersionRange,
    pub shape: ParamShape,
}

impl SignatureVariant {
    pub const fn new(range: VersionRange, shape: ParamShape) -> Self {
        Self { range, shape }
    }

    /// Method key of this variant for the given operation name
    pub fn key(&self, method: &str) -> MethodKey {
        MethodKey::new(method, self.shape)
    }
}

/// Narrow flags up to runtime 32, wide flags from runtime 33
pub const FLAGS_WIDENED: &[SignatureVariant] = &[
    SignatureVariant::new(VersionRange::up_to(32), ParamShape::NarrowFlags),
    SignatureVariant::new(VersionRange::from(33), ParamShape::WideFlags),
];

/// A signature that never changed
pub const FIXED: &[SignatureVariant] = &[SignatureVariant::new(VersionRange::ANY, ParamShape::Fixed)];

/// Select the single variant of `operation` whose bounds include `version`
pub fn resolve<'a>(
    operation: &str,
    candidates: &'a [SignatureVariant],
    version: RuntimeVersion,
) -> Result<&'a SignatureVariant, HookError> {
    let mut matching = candidates.iter().filter(|v| v.range.contains(version));

    let first = matching.next().ok_or_else(|| HookError::SignatureNotFound {
        operation: operation.to_string(),
        version,
    })?;

    let extra = matching.count();
    if extra > 0 {
        return Err(HookError::AmbiguousSignature {
            operation: operation.to_string(),
            version,
            count: extra + 1,
        });
    }

    tracing::trace!(operation, %version, shape = %first.shape, "Signature resolved");
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds_inclusive() {
        let range = VersionRange::between(28, 32);
        assert!(!range.contains(RuntimeVersion(27)));
        assert!(range.contains(RuntimeVersion(28)));
        assert!(range.contains(RuntimeVersion(32)));
        assert!(!range.contains(RuntimeVersion(33)));
        assert!(VersionRange::ANY.contains(RuntimeVersion(0)));
    }

    #[test]
    fn test_flags_widened_resolution() {
        let narrow = resolve("getPackageInfo", FLAGS_WIDENED, RuntimeVersion(32)).unwrap();
        assert_eq!(narrow.shape, ParamShape::NarrowFlags);

        let wide = resolve("getPackageInfo", FLAGS_WIDENED, RuntimeVersion(34)).unwrap();
        assert_eq!(wide.shape, ParamShape::WideFlags);
    }

    #[test]
    fn test_ambiguous_signature() {
        let overlapping = [
            SignatureVariant::new(VersionRange::up_to(32), ParamShape::NarrowFlags),
            SignatureVariant::new(VersionRange::from(32), ParamShape::WideFlags),
        ];
        match resolve("queryIntentActivities", &overlapping, RuntimeVersion(32)) {
            Err(HookError::AmbiguousSignature { count, .. }) => assert_eq!(count, 2),
            other => panic!("Expected AmbiguousSignature, got {:?}", other),
        }
        // Outside the overlap the set still resolves
        assert!(resolve("queryIntentActivities", &overlapping, RuntimeVersion(31)).is_ok());
    }

    #[test]
    fn test_signature_not_found() {
        let only_new = [SignatureVariant::new(VersionRange::from(33), ParamShape::WideFlags)];
        match resolve("getInstalledApplications", &only_new, RuntimeVersion(30)) {
            Err(HookError::SignatureNotFound { version, .. }) => {
                assert_eq!(version, RuntimeVersion(30))
            }
            other => panic!("Expected SignatureNotFound, got {:?}", other),
        }
    }
}
