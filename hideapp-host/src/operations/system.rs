//! System-service profile
//!
//! Hooks inside the registry service, where one process answers every
//! caller. Most internal entry points receive the querying caller as an
//! explicit argument; the rest run on the caller's binder thread and use
//! the ambient identity. Every target is optional because the service's
//! internal layout moves between releases; the installer's threshold keeps
//! a release where nothing matches from counting as installed.

use super::{AbsenceSignal, CallerSource, OperationSpec, ResultShape};
use crate::filter::ResultFilter;
use crate::registry::{InterceptionRegistry, TargetDescriptor};
use crate::signature::{VersionRange, FIXED, FLAGS_WIDENED};

pub const PACKAGE_MANAGER_SERVICE: &str = "com.android.server.pm.PackageManagerService";
pub const COMPUTER_ENGINE: &str = "com.android.server.pm.ComputerEngine";
pub const APPS_FILTER_BASE: &str = "com.android.server.pm.AppsFilterBase";

/// First runtime carrying the split-out apps filter
pub const APPS_FILTER_SINCE: u32 = 33;

const POST_RESOLUTION_FILTER: OperationSpec = OperationSpec {
    method: "applyPostResolutionFilter",
    variants: FIXED,
    caller: CallerSource::Arg(3),
    shape: ResultShape::List,
    absence: AbsenceSignal::Null,
};

pub const PACKAGE_MANAGER_SERVICE_OPERATIONS: &[OperationSpec] = &[
    POST_RESOLUTION_FILTER,
    OperationSpec {
        method: "filterAppAccess",
        variants: FIXED,
        caller: CallerSource::Arg(1),
        shape: ResultShape::AccessCheck {
            setting_arg: Some(0),
            component_arg: Some(2),
        },
        absence: AbsenceSignal::Null,
    },
    OperationSpec {
        method: "getInstalledApplicationsListInternal",
        variants: FIXED,
        caller: CallerSource::Arg(2),
        shape: ResultShape::List,
        absence: AbsenceSignal::Null,
    },
    OperationSpec {
        method: "getInstalledPackages",
        variants: FLAGS_WIDENED,
        caller: CallerSource::Ambient,
        shape: ResultShape::Wrapped,
        absence: AbsenceSignal::Null,
    },
];

pub const COMPUTER_ENGINE_OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        method: "getInstalledApplications",
        variants: FLAGS_WIDENED,
        caller: CallerSource::Arg(2),
        shape: ResultShape::List,
        absence: AbsenceSignal::Null,
    },
    POST_RESOLUTION_FILTER,
    OperationSpec {
        method: "getPackageInfoInternalBody",
        variants: FLAGS_WIDENED,
        caller: CallerSource::Arg(3),
        shape: ResultShape::Single,
        absence: AbsenceSignal::Null,
    },
];

pub const APPS_FILTER_OPERATIONS: &[OperationSpec] = &[OperationSpec {
    method: "shouldFilterApplication",
    variants: FIXED,
    caller: CallerSource::Arg(1),
    shape: ResultShape::AccessCheck {
        setting_arg: Some(3),
        component_arg: None,
    },
    absence: AbsenceSignal::Null,
}];

/// Registry hooking the registry service's internal entry points
pub fn registry(filter: &ResultFilter) -> InterceptionRegistry {
    let compile = |ops: &'static [OperationSpec]| {
        ops.iter()
            .map(|op| op.interception(filter))
            .collect::<Vec<_>>()
    };

    let mut registry = InterceptionRegistry::new();
    registry
        .register(
            TargetDescriptor::class(PACKAGE_MANAGER_SERVICE).optional(),
            compile(PACKAGE_MANAGER_SERVICE_OPERATIONS),
        )
        .register(
            TargetDescriptor::class(COMPUTER_ENGINE).optional(),
            compile(COMPUTER_ENGINE_OPERATIONS),
        )
        .register(
            TargetDescriptor::class(APPS_FILTER_BASE)
                .optional()
                .versions(VersionRange::from(APPS_FILTER_SINCE)),
            compile(APPS_FILTER_OPERATIONS),
        );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use hideapp_api::RuntimeVersion;

    #[test]
    fn test_all_targets_optional_in_order() {
        let registry = registry(&ResultFilter::default());
        let anchors: Vec<String> = registry
            .iter()
            .map(|e| e.descriptor.anchor.to_string())
            .collect();
        assert_eq!(
            anchors,
            vec![PACKAGE_MANAGER_SERVICE, COMPUTER_ENGINE, APPS_FILTER_BASE]
        );
        assert!(registry.iter().all(|e| !e.descriptor.required));
        assert_eq!(registry.interception_count(), 8);
    }

    #[test]
    fn test_apps_filter_bounded_to_new_runtimes() {
        let registry = registry(&ResultFilter::default());
        let apps_filter = registry
            .iter()
            .find(|e| e.descriptor.anchor.to_string() == APPS_FILTER_BASE)
            .unwrap();
        assert!(!apps_filter.descriptor.applies_to(RuntimeVersion(32)));
        assert!(apps_filter.descriptor.applies_to(RuntimeVersion(33)));
    }

    #[test]
    fn test_explicit_caller_arguments() {
        for op in PACKAGE_MANAGER_SERVICE_OPERATIONS
            .iter()
            .chain(COMPUTER_ENGINE_OPERATIONS)
            .chain(APPS_FILTER_OPERATIONS)
        {
            if op.method == "getInstalledPackages" {
                assert_eq!(op.caller, CallerSource::Ambient);
            } else {
                assert!(matches!(op.caller, CallerSource::Arg(_)), "{}", op.method);
            }
        }
    }
}
