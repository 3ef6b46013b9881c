//! Simulated registry services for integration tests

#![allow(dead_code)]

use hideapp_api::{
    ApplicationInfo, CallError, CallerId, Invocation, MethodKey, PackageInfo, ParamShape,
    ParceledListSlice, ResolveInfo, RuntimeVersion, Value, WIDE_FLAGS_SINCE,
};
use hideapp_host::operations::{app, system};
use hideapp_host::{DispatchPatcher, MemoryDispatchTable};
use std::collections::HashMap;

pub const INSTALLED: &[&str] = &["com.example.a", "com.example.b", "com.example.c"];

pub const TARGET: &str = "com.example.t1";
pub const TARGET_CALLER: CallerId = CallerId(10_001);
pub const OTHER_CALLER: CallerId = CallerId(10_002);

pub const PROXY_CLASS: &str = "android.content.pm.IPackageManager$Stub$Proxy";

pub fn flags_shape(version: RuntimeVersion) -> ParamShape {
    if version >= WIDE_FLAGS_SINCE {
        ParamShape::WideFlags
    } else {
        ParamShape::NarrowFlags
    }
}

pub fn identities() -> HashMap<String, CallerId> {
    HashMap::from([
        (TARGET.to_string(), TARGET_CALLER),
        ("com.example.t2".to_string(), OTHER_CALLER),
    ])
}

fn packages() -> Vec<PackageInfo> {
    INSTALLED.iter().map(|p| PackageInfo::new(*p)).collect()
}

fn applications() -> Vec<ApplicationInfo> {
    INSTALLED
        .iter()
        .enumerate()
        .map(|(i, p)| ApplicationInfo::new(*p, CallerId(10_100 + i as u32)))
        .collect()
}

fn activities() -> Vec<ResolveInfo> {
    INSTALLED
        .iter()
        .map(|p| ResolveInfo::activity(*p, "MainActivity"))
        .collect()
}

fn lookup(name: Option<&str>) -> Option<PackageInfo> {
    name.filter(|n| INSTALLED.contains(n)).map(PackageInfo::new)
}

/// Registry service internals, as laid out on `version`
pub fn system_service(version: RuntimeVersion) -> MemoryDispatchTable {
    let table = MemoryDispatchTable::new(version);
    define_system_service(&table);
    table
}

/// Define the registry service's internal classes on an existing table
pub fn define_system_service(table: &MemoryDispatchTable) {
    let version = table.runtime_version();
    let flags = flags_shape(version);
    let fixed = ParamShape::Fixed;

    table
        .define(
            system::PACKAGE_MANAGER_SERVICE,
            MethodKey::new("applyPostResolutionFilter", fixed),
            |_| Ok(Value::ResolveInfoList(activities())),
        )
        .define(
            system::PACKAGE_MANAGER_SERVICE,
            MethodKey::new("filterAppAccess", fixed),
            |_| Ok(Value::Bool(false)),
        )
        .define(
            system::PACKAGE_MANAGER_SERVICE,
            MethodKey::new("getInstalledApplicationsListInternal", fixed),
            |_| Ok(Value::ApplicationInfoList(applications())),
        )
        .define(
            system::PACKAGE_MANAGER_SERVICE,
            MethodKey::new("getInstalledPackages", flags),
            |_| Ok(Value::PackageInfoSlice(ParceledListSlice::new(packages()))),
        )
        .define(
            system::COMPUTER_ENGINE,
            MethodKey::new("getInstalledApplications", flags),
            |_| Ok(Value::ApplicationInfoList(applications())),
        )
        .define(
            system::COMPUTER_ENGINE,
            MethodKey::new("applyPostResolutionFilter", fixed),
            |_| Ok(Value::ResolveInfoList(activities())),
        )
        .define(
            system::COMPUTER_ENGINE,
            MethodKey::new("getPackageInfoInternalBody", flags),
            |inv: &Invocation| Ok(lookup(inv.arg(0).and_then(Value::as_str)).into()),
        );

    if version.0 >= system::APPS_FILTER_SINCE {
        table.define(
            system::APPS_FILTER_BASE,
            MethodKey::new("shouldFilterApplication", fixed),
            |_| Ok(Value::Bool(false)),
        );
    }
}

/// An app process's package manager proxy, as laid out on `version`
pub fn app_process(version: RuntimeVersion) -> MemoryDispatchTable {
    let table = MemoryDispatchTable::new(version);
    let flags = flags_shape(version);

    table.bind_object(app::PACKAGE_MANAGER_PROXY, PROXY_CLASS);
    for method in ["resolveIntent", "resolveService"] {
        table.define(PROXY_CLASS, MethodKey::new(method, flags), |inv: &Invocation| {
            let package = match inv.arg(0) {
                Some(Value::Intent(intent)) => intent.package.clone(),
                _ => None,
            };
            Ok(package
                .filter(|p| INSTALLED.contains(&p.as_str()))
                .map(|p| ResolveInfo::activity(p, "MainActivity"))
                .into())
        });
    }
    for method in [
        "queryIntentActivities",
        "queryIntentServices",
        "queryIntentReceivers",
        "queryIntentContentProviders",
    ] {
        table.define(PROXY_CLASS, MethodKey::new(method, flags), |_| {
            Ok(Value::ResolveInfoSlice(ParceledListSlice::new(activities())))
        });
    }
    table
        .define(
            PROXY_CLASS,
            MethodKey::new("getPackageInfo", flags),
            |inv: &Invocation| {
                let name = inv.arg(0).and_then(Value::as_str);
                lookup(name)
                    .map(Value::PackageInfo)
                    .ok_or_else(|| CallError::NameNotFound(name.unwrap_or_default().to_string()))
            },
        )
        .define(
            PROXY_CLASS,
            MethodKey::new("getInstalledPackages", flags),
            |_| Ok(Value::PackageInfoSlice(ParceledListSlice::new(packages()))),
        )
        .define(
            PROXY_CLASS,
            MethodKey::new("getInstalledApplications", flags),
            |_| Ok(Value::ApplicationInfoSlice(ParceledListSlice::new(applications()))),
        )
        .define(
            PROXY_CLASS,
            MethodKey::new("getInstallerPackageName", ParamShape::Fixed),
            |inv: &Invocation| {
                let name = inv.arg(0).and_then(Value::as_str).unwrap_or_default();
                if INSTALLED.contains(&name) {
                    Ok(Value::from("com.android.vending"))
                } else {
                    Err(CallError::NameNotFound(name.to_string()))
                }
            },
        );
    table
}

pub fn package_names(value: &Value) -> Vec<String> {
    match value {
        Value::ResolveInfoList(list) => list
            .iter()
            .filter_map(|r| r.package_name().map(str::to_string))
            .collect(),
        Value::ResolveInfoSlice(page) => page
            .list()
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.package_name().map(str::to_string))
            .collect(),
        Value::ApplicationInfoList(list) => list.iter().map(|a| a.package_name.clone()).collect(),
        Value::ApplicationInfoSlice(page) => page
            .list()
            .unwrap_or_default()
            .iter()
            .map(|a| a.package_name.clone())
            .collect(),
        Value::PackageInfoSlice(page) => page
            .list()
            .unwrap_or_default()
            .iter()
            .map(|p| p.package_name.clone())
            .collect(),
        other => panic!("Not a list result: {:?}", other),
    }
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
