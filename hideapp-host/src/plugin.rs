//! Plugin entry point
//!
//! The plugin host drives [`HideAppPlugin`] through three calls:
//! `initialize` with the rule string, `on_attach` once the registry service
//! (or app process) is up, and `on_config_change` whenever the rule editor
//! publishes a new string. Nothing here ever fails the host; a plugin that
//! cannot install simply leaves the registry unfiltered.

use crate::audit::{self, AuditSink, CompositeAuditSink, MemoryAuditSink, TracingAuditSink};
use crate::config::{PluginConfig, PluginMode};
use crate::dispatch::DispatchPatcher;
use crate::filter::ResultFilter;
use crate::installer::TransactionalInstaller;
use crate::operations::{app, system};
use crate::registry::InterceptionRegistry;
use crate::rules::{parse_app_list, parse_rules, IdentityResolver, PolicyProvider, RuleTable};
use hideapp_api::CallerId;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

/// Identity of the process the plugin is loaded into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub package: String,
    pub caller: CallerId,
}

impl ProcessInfo {
    pub fn new(package: impl Into<String>, caller: CallerId) -> Self {
        Self {
            package: package.into(),
            caller,
        }
    }
}

/// Facilities the host hands over on attach
#[derive(Clone)]
pub struct HostProcess {
    pub patcher: Arc<dyn DispatchPatcher>,
    pub identities: Arc<dyn IdentityResolver>,
    pub process: ProcessInfo,
}

impl HostProcess {
    pub fn new(
        patcher: Arc<dyn DispatchPatcher>,
        identities: Arc<dyn IdentityResolver>,
        process: ProcessInfo,
    ) -> Self {
        Self {
            patcher,
            identities,
            process,
        }
    }
}

impl fmt::Debug for HostProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostProcess")
            .field("runtime", &self.patcher.runtime_version())
            .field("process", &self.process)
            .finish()
    }
}

pub struct HideAppPlugin {
    config: PluginConfig,
    policy: PolicyProvider,
    filter: ResultFilter,
    installer: TransactionalInstaller,
    audit: Arc<dyn AuditSink>,
    trail: Arc<MemoryAuditSink>,
    host: OnceLock<HostProcess>,
    /// Last rule string received, applied again on attach
    args: Mutex<Option<String>>,
}

impl HideAppPlugin {
    pub fn new(config: PluginConfig) -> Self {
        let trail = Arc::new(MemoryAuditSink::with_capacity(config.audit_capacity));
        let audit: Arc<dyn AuditSink> = Arc::new(
            CompositeAuditSink::new()
                .with_shared(trail.clone())
                .with_sink(TracingAuditSink::new()),
        );
        let policy = PolicyProvider::default();
        Self {
            filter: ResultFilter::new(policy.clone()),
            installer: TransactionalInstaller::with_audit(config.install_policy(), audit.clone()),
            config,
            policy,
            audit,
            trail,
            host: OnceLock::new(),
            args: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn policy(&self) -> &PolicyProvider {
        &self.policy
    }

    pub fn filter(&self) -> &ResultFilter {
        &self.filter
    }

    pub fn installer(&self) -> &TransactionalInstaller {
        &self.installer
    }

    /// In-memory audit trail of this plugin instance
    pub fn audit_trail(&self) -> &MemoryAuditSink {
        &self.trail
    }

    pub fn is_attached(&self) -> bool {
        self.host.get().is_some()
    }

    /// Accept the initial rule string
    ///
    /// Rules are resolved against the host's identities, so before attach
    /// the string is only kept.
    pub fn initialize(&self, args: Option<&str>, flags: u32) -> bool {
        tracing::info!(mode = ?self.config.mode, flags, "Hide-app plugin initialized");
        self.store_args(args);
        if let Some(host) = self.host.get() {
            self.apply_rules(host, args);
        }
        true
    }

    /// Bind to the host process, publish the rules and install interceptions
    pub fn on_attach(&self, host: &HostProcess) -> bool {
        if self.host.set(host.clone()).is_err() {
            tracing::warn!("Plugin already attached");
            return self.installer.is_installed();
        }
        let Some(host) = self.host.get() else {
            return false;
        };
        tracing::info!(
            package = %host.process.package,
            caller = %host.process.caller,
            runtime = %host.patcher.runtime_version(),
            "Attaching to host process"
        );

        let args = self.current_args();
        self.apply_rules(host, args.as_deref());
        self.install(host)
    }

    /// Swap in a new rule string; retries a failed install
    pub fn on_config_change(&self, args: Option<&str>, flags: u32) {
        tracing::info!(flags, "Rule configuration changed");
        self.store_args(args);
        let Some(host) = self.host.get() else {
            return;
        };
        self.apply_rules(host, args);
        if self.installer.retry() {
            tracing::info!("Retrying interception install");
            self.install(host);
        }
    }

    /// Registry of the configured profile
    pub fn build_registry(&self) -> InterceptionRegistry {
        match self.config.mode {
            PluginMode::System => system::registry(&self.filter),
            PluginMode::InProcess => app::registry(&self.filter),
        }
    }

    fn install(&self, host: &HostProcess) -> bool {
        let registry = self.build_registry();
        let installed = self.installer.install_all(&*host.patcher, &registry);
        if !installed {
            tracing::warn!(mode = ?self.config.mode, "Registry left unfiltered");
        }
        installed
    }

    fn apply_rules(&self, host: &HostProcess, args: Option<&str>) {
        let table = match self.config.mode {
            PluginMode::System => {
                let parsed = parse_rules(args, &*host.identities);
                for skipped in &parsed.skipped {
                    audit::emit(&*self.audit, audit::rule_entry_skipped(&skipped.to_string()));
                }
                parsed.table
            }
            PluginMode::InProcess => {
                parse_app_list(args, &host.process.package, host.process.caller)
            }
        };
        self.publish(table);
    }

    fn publish(&self, table: RuleTable) {
        audit::emit(&*self.audit, audit::rules_replaced(&table));
        tracing::info!(callers = table.len(), "Hide rules replaced");
        self.policy.set_rules(table);
    }

    fn store_args(&self, args: Option<&str>) {
        *self.args.lock().unwrap_or_else(|e| e.into_inner()) = args.map(str::to_string);
    }

    fn current_args(&self) -> Option<String> {
        self.args.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl fmt::Debug for HideAppPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HideAppPlugin")
            .field("config", &self.config)
            .field("attached", &self.is_attached())
            .field("installer", &self.installer)
            .finish()
    }
}
