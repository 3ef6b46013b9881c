//! hideapp-host: per-caller visibility filtering for a package registry
//!
//! This crate installs interceptions on the registry service's entry points
//! in a single transaction and filters every result they return through the
//! caller's hidden set.

pub mod audit;
pub mod backup;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod installer;
pub mod operations;
pub mod plugin;
pub mod registry;
pub mod rules;
pub mod signature;
pub mod transaction;
#[cfg(feature = "subscriber")]
pub mod tracing_support;

pub use config::{PluginConfig, PluginMode};
pub use dispatch::{Delegate, DispatchPatcher, Handler, MemoryDispatchTable, MethodRef, TargetAnchor};
pub use error::{ConfigError, HookError};
pub use filter::ResultFilter;
pub use installer::{InstallPolicy, InstallReport, TransactionalInstaller};
pub use plugin::{HideAppPlugin, HostProcess, ProcessInfo};
pub use registry::{InterceptionRegistry, MethodInterception, TargetDescriptor};
pub use rules::{IdentityResolver, PolicyProvider, RuleTable};
pub use hideapp_api::{CallError, CallResult, CallerId, Invocation, RuntimeVersion, Value};
