//! In-process profile
//!
//! Hooks the binder proxy behind the process's own package manager. The
//! calls seen here are always the process's own, so the caller identity is
//! ambient and the rule table holds a single entry.

use super::{AbsenceSignal, CallerSource, OperationSpec, ResultShape};
use crate::filter::ResultFilter;
use crate::registry::{InterceptionRegistry, TargetDescriptor};
use crate::signature::{FIXED, FLAGS_WIDENED};

/// Live object whose concrete type is the package manager proxy
pub const PACKAGE_MANAGER_PROXY: &str = "ApplicationPackageManager.mPM";

const fn ambient(method: &'static str, shape: ResultShape, absence: AbsenceSignal) -> OperationSpec {
    OperationSpec {
        method,
        variants: FLAGS_WIDENED,
        caller: CallerSource::Ambient,
        shape,
        absence,
    }
}

pub const OPERATIONS: &[OperationSpec] = &[
    ambient("resolveIntent", ResultShape::Single, AbsenceSignal::Null),
    ambient("resolveService", ResultShape::Single, AbsenceSignal::Null),
    ambient("queryIntentActivities", ResultShape::Wrapped, AbsenceSignal::Null),
    ambient("queryIntentServices", ResultShape::Wrapped, AbsenceSignal::Null),
    ambient("queryIntentReceivers", ResultShape::Wrapped, AbsenceSignal::Null),
    ambient("queryIntentContentProviders", ResultShape::Wrapped, AbsenceSignal::Null),
    ambient("getPackageInfo", ResultShape::NameGuard { name_arg: 0 }, AbsenceSignal::NameNotFound),
    ambient("getInstalledPackages", ResultShape::Wrapped, AbsenceSignal::Null),
    ambient("getInstalledApplications", ResultShape::Wrapped, AbsenceSignal::Null),
    OperationSpec {
        method: "getInstallerPackageName",
        variants: FIXED,
        caller: CallerSource::Ambient,
        shape: ResultShape::NameGuard { name_arg: 0 },
        absence: AbsenceSignal::NameNotFound,
    },
];

/// Registry hooking every in-process operation on the proxy
pub fn registry(filter: &ResultFilter) -> InterceptionRegistry {
    let mut registry = InterceptionRegistry::new();
    registry.register(
        TargetDescriptor::object_type(PACKAGE_MANAGER_PROXY),
        OPERATIONS.iter().map(|op| op.interception(filter)),
    );
    registry
}
