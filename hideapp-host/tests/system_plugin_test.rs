//! Integration tests for the plugin loaded into the registry service

mod common;

use common::*;
use hideapp_api::{ComponentName, Intent, PackageSetting};
use hideapp_host::audit::AuditEventType;
use hideapp_host::operations::system;
use hideapp_host::{
    CallerId, HideAppPlugin, HostProcess, Invocation, MemoryDispatchTable,
    PluginConfig, ProcessInfo, RuntimeVersion, Value,
};
use std::sync::Arc;
use std::thread;

fn attach(table: Arc<MemoryDispatchTable>, rules: &str) -> HideAppPlugin {
    let plugin = HideAppPlugin::new(PluginConfig::default());
    assert!(plugin.initialize(Some(rules), 0));
    let host = HostProcess::new(
        table,
        Arc::new(identities()),
        ProcessInfo::new("android", CallerId(1000)),
    );
    plugin.on_attach(&host);
    plugin
}

fn installed_applications(table: &MemoryDispatchTable, caller: CallerId) -> Vec<String> {
    // The service calls in from its own identity and names the caller explicitly
    let inv = Invocation::new(
        CallerId(1000),
        vec![Value::Long(0), Value::Int(0), caller.into()],
    );
    let result = table
        .invoke_named(system::COMPUTER_ENGINE, "getInstalledApplications", &inv)
        .unwrap();
    package_names(&result)
}

fn package_info(table: &MemoryDispatchTable, caller: CallerId, name: &str) -> Value {
    let inv = Invocation::new(
        CallerId(1000),
        vec![
            Value::from(name),
            Value::Long(-1),
            Value::Long(0),
            caller.into(),
            Value::Int(0),
        ],
    );
    table
        .invoke_named(system::COMPUTER_ENGINE, "getPackageInfoInternalBody", &inv)
        .unwrap()
}

#[test]
fn test_end_to_end_list_filtering() {
    let table = Arc::new(system_service(RuntimeVersion(34)));
    let plugin = attach(table.clone(), "com.example.t1:com.example.a");
    assert!(plugin.installer().is_installed());

    assert_eq!(
        installed_applications(&table, TARGET_CALLER),
        names(&["com.example.b", "com.example.c"])
    );
    assert_eq!(installed_applications(&table, OTHER_CALLER), names(INSTALLED));
}

#[test]
fn test_hidden_record_matches_missing_record() {
    let table = Arc::new(system_service(RuntimeVersion(34)));
    let _plugin = attach(table.clone(), "com.example.t1:com.example.a");

    let hidden = package_info(&table, TARGET_CALLER, "com.example.a");
    let missing = package_info(&table, TARGET_CALLER, "com.example.missing");
    assert_eq!(hidden, Value::Null);
    assert_eq!(hidden, missing);

    match package_info(&table, OTHER_CALLER, "com.example.a") {
        Value::PackageInfo(info) => assert_eq!(info.package_name, "com.example.a"),
        other => panic!("Expected package info, got {:?}", other),
    }
}

#[test]
fn test_ambient_caller_and_access_checks() {
    let table = Arc::new(system_service(RuntimeVersion(34)));
    let _plugin = attach(table.clone(), "com.example.t1:com.example.a,com.example.c");

    let packages = table
        .invoke_named(
            system::PACKAGE_MANAGER_SERVICE,
            "getInstalledPackages",
            &Invocation::new(TARGET_CALLER, vec![Value::Long(0), Value::Int(0)]),
        )
        .unwrap();
    assert_eq!(package_names(&packages), names(&["com.example.b"]));

    let access = |component: &str, caller: CallerId| {
        table
            .invoke_named(
                system::PACKAGE_MANAGER_SERVICE,
                "filterAppAccess",
                &Invocation::new(
                    CallerId(1000),
                    vec![
                        Value::PackageSetting(PackageSetting::new(component)),
                        caller.into(),
                        Value::Component(ComponentName::new(component, "Main")),
                        Value::Int(0),
                        Value::Int(0),
                    ],
                ),
            )
            .unwrap()
    };
    assert_eq!(access("com.example.a", TARGET_CALLER), Value::Bool(true));
    assert_eq!(access("com.example.b", TARGET_CALLER), Value::Bool(false));
    assert_eq!(access("com.example.a", OTHER_CALLER), Value::Bool(false));

    let should_filter = table
        .invoke_named(
            system::APPS_FILTER_BASE,
            "shouldFilterApplication",
            &Invocation::new(
                CallerId(1000),
                vec![
                    Value::Null,
                    TARGET_CALLER.into(),
                    Value::Null,
                    Value::PackageSetting(PackageSetting::new("com.example.c")),
                    Value::Int(0),
                ],
            ),
        )
        .unwrap();
    assert_eq!(should_filter, Value::Bool(true));

    let resolved = table
        .invoke_named(
            system::PACKAGE_MANAGER_SERVICE,
            "applyPostResolutionFilter",
            &Invocation::new(
                CallerId(1000),
                vec![
                    Value::ResolveInfoList(vec![]),
                    Value::Null,
                    Value::Bool(false),
                    TARGET_CALLER.into(),
                    Value::Bool(true),
                    Value::Int(0),
                    Value::Intent(Intent::action("android.intent.action.MAIN")),
                ],
            ),
        )
        .unwrap();
    assert_eq!(package_names(&resolved), names(&["com.example.b"]));
}

#[test]
fn test_signature_binds_per_runtime() {
    for version in [RuntimeVersion(32), RuntimeVersion(34)] {
        let table = Arc::new(system_service(version));
        let plugin = attach(table.clone(), "com.example.t1:com.example.a");
        assert!(plugin.installer().is_installed(), "runtime {}", version);

        let report = plugin.installer().report().unwrap();
        let getter = report
            .installed
            .iter()
            .find(|m| m.class == system::COMPUTER_ENGINE && m.method.name == "getInstalledApplications")
            .unwrap();
        assert_eq!(getter.method.shape, flags_shape(version));

        let apps_filter_skipped = report
            .skipped
            .iter()
            .any(|(target, _)| target == system::APPS_FILTER_BASE);
        assert_eq!(apps_filter_skipped, version.0 < system::APPS_FILTER_SINCE);

        assert_eq!(
            installed_applications(&table, TARGET_CALLER),
            names(&["com.example.b", "com.example.c"])
        );
    }
}

#[test]
fn test_unrecognized_layout_stays_unfiltered() {
    let table = Arc::new(MemoryDispatchTable::new(RuntimeVersion(34)));
    table.define(
        system::COMPUTER_ENGINE,
        hideapp_api::MethodKey::new("getInstalledApplications", hideapp_api::ParamShape::WideFlags),
        |_| Ok(Value::ApplicationInfoList(vec![])),
    );
    let plugin = attach(table.clone(), "com.example.t1:com.example.a");

    // One hook alone does not meet the threshold
    assert!(!plugin.installer().is_installed());
    assert_eq!(table.installed_count(), 0);
    let trail = plugin.audit_trail();
    assert_eq!(trail.find_by_type(AuditEventType::TransactionRolledBack).len(), 1);
    assert!(trail.find_by_type(AuditEventType::TransactionCommitted).is_empty());
}

#[test]
fn test_config_change_swaps_rules_and_retries_install() {
    let table = Arc::new(MemoryDispatchTable::new(RuntimeVersion(34)));
    let plugin = attach(table.clone(), "com.example.t1:com.example.a");
    assert!(!plugin.installer().is_installed());

    // The service finishes booting; the next config change retries the install
    define_system_service(&table);
    plugin.on_config_change(Some("com.example.t1:com.example.a"), 0);
    assert!(plugin.installer().is_installed());
    assert_eq!(
        installed_applications(&table, TARGET_CALLER),
        names(&["com.example.b", "com.example.c"])
    );

    plugin.on_config_change(Some("com.example.t1:com.example.b|com.example.t2:com.example.c"), 0);
    assert_eq!(
        installed_applications(&table, TARGET_CALLER),
        names(&["com.example.a", "com.example.c"])
    );
    assert_eq!(
        installed_applications(&table, OTHER_CALLER),
        names(&["com.example.a", "com.example.b"])
    );
    assert_eq!(
        plugin.audit_trail().find_by_type(AuditEventType::RulesReplaced).len(),
        3
    );
}

#[test]
fn test_concurrent_queries_see_whole_rule_sets() {
    let table = Arc::new(system_service(RuntimeVersion(34)));
    let plugin = Arc::new(attach(table.clone(), "com.example.t1:com.example.a"));
    let old = names(&["com.example.b", "com.example.c"]);
    let new = names(&["com.example.a", "com.example.c"]);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let table = table.clone();
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                for _ in 0..200 {
                    let seen = installed_applications(&table, TARGET_CALLER);
                    assert!(seen == old || seen == new, "Mixed rule set: {:?}", seen);
                }
            })
        })
        .collect();

    for i in 0..100 {
        let rules = if i % 2 == 0 {
            "com.example.t1:com.example.b"
        } else {
            "com.example.t1:com.example.a"
        };
        plugin.on_config_change(Some(rules), 0);
    }
    for reader in readers {
        reader.join().unwrap();
    }
}
