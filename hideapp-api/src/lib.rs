//! hideapp-api: Shared types for the hideapp interception engine
//!
//! This crate defines the vocabulary between the engine and the host runtime:
//! caller identities, the runtime version, the registry records returned by
//! package queries, and the dynamically typed [`Value`] that travels through
//! an intercepted dispatch path.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// First runtime version whose registry operations take wide (64-bit) flags
pub const WIDE_FLAGS_SINCE: RuntimeVersion = RuntimeVersion(33);

/// Stable identity of the process making a registry query
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CallerId(pub u32);

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// API level reported by the host runtime
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RuntimeVersion(pub u32);

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameter shape of one concrete method signature
///
/// The registry service widened its flags parameter between releases
/// without changing what the operation does, so a logical operation may
/// exist under either flags shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamShape {
    /// Signature never varied
    Fixed,
    /// 32-bit flags parameter
    NarrowFlags,
    /// 64-bit flags parameter
    WideFlags,
}

impl fmt::Display for ParamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fixed => "fixed",
            Self::NarrowFlags => "int flags",
            Self::WideFlags => "long flags",
        };
        f.write_str(s)
    }
}

/// Key of a concrete method in a class's dispatch table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodKey {
    pub name: String,
    pub shape: ParamShape,
}

impl MethodKey {
    pub fn new(name: impl Into<String>, shape: ParamShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.shape)
    }
}

// ============================================================================
// Registry records
// ============================================================================

/// Package-qualified component reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentName {
    pub package_name: String,
    pub class_name: String,
}

impl ComponentName {
    pub fn new(package_name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            class_name: class_name.into(),
        }
    }
}

/// Declared component of an installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub package_name: String,
    pub name: String,
}

impl ComponentInfo {
    pub fn new(package_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            name: name.into(),
        }
    }
}

/// Result of resolving an intent to a component
///
/// Exactly one of the component slots is normally populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveInfo {
    #[serde(default)]
    pub activity_info: Option<ComponentInfo>,
    #[serde(default)]
    pub service_info: Option<ComponentInfo>,
    #[serde(default)]
    pub provider_info: Option<ComponentInfo>,
}

impl ResolveInfo {
    pub fn activity(package_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            activity_info: Some(ComponentInfo::new(package_name, name)),
            ..Default::default()
        }
    }

    pub fn service(package_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            service_info: Some(ComponentInfo::new(package_name, name)),
            ..Default::default()
        }
    }

    pub fn provider(package_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider_info: Some(ComponentInfo::new(package_name, name)),
            ..Default::default()
        }
    }

    /// The populated component, checked in activity, service, provider order
    pub fn component_info(&self) -> Option<&ComponentInfo> {
        self.activity_info
            .as_ref()
            .or(self.service_info.as_ref())
            .or(self.provider_info.as_ref())
    }

    /// Package owning the resolved component
    pub fn package_name(&self) -> Option<&str> {
        self.component_info().map(|c| c.package_name.as_str())
    }
}

/// Application-level record of an installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub package_name: String,
    pub uid: CallerId,
}

impl ApplicationInfo {
    pub fn new(package_name: impl Into<String>, uid: CallerId) -> Self {
        Self {
            package_name: package_name.into(),
            uid,
        }
    }
}

/// Package-level record of an installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub package_name: String,
    #[serde(default)]
    pub version_name: Option<String>,
    #[serde(default)]
    pub application_info: Option<ApplicationInfo>,
}

impl PackageInfo {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            version_name: None,
            application_info: None,
        }
    }

    pub fn with_uid(mut self, uid: CallerId) -> Self {
        self.application_info = Some(ApplicationInfo::new(self.package_name.clone(), uid));
        self
    }
}

/// Service-internal state of an installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSetting {
    pub name: String,
}

impl PackageSetting {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Query intent; only the fields the registry matches on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
}

impl Intent {
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            package: None,
        }
    }
}

/// Paged list container returned by list queries
///
/// The inner list may be absent; filtering an absent list is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParceledListSlice<T> {
    list: Option<Vec<T>>,
}

impl<T> ParceledListSlice<T> {
    pub fn new(list: Vec<T>) -> Self {
        Self { list: Some(list) }
    }

    /// A container whose inner list is absent
    pub fn absent() -> Self {
        Self { list: None }
    }

    pub fn list(&self) -> Option<&[T]> {
        self.list.as_deref()
    }

    pub fn list_mut(&mut self) -> Option<&mut Vec<T>> {
        self.list.as_mut()
    }

    pub fn into_list(self) -> Vec<T> {
        self.list.unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.list.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Dispatch values
// ============================================================================

/// Argument or return value of a dispatched registry call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Str(String),
    Intent(Intent),
    Component(ComponentName),
    PackageSetting(PackageSetting),
    ResolveInfo(ResolveInfo),
    ResolveInfoList(Vec<ResolveInfo>),
    ResolveInfoSlice(ParceledListSlice<ResolveInfo>),
    PackageInfo(PackageInfo),
    PackageInfoSlice(ParceledListSlice<PackageInfo>),
    ApplicationInfoList(Vec<ApplicationInfo>),
    ApplicationInfoSlice(ParceledListSlice<ApplicationInfo>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interpret an integer argument as a caller identity
    pub fn as_caller(&self) -> Option<CallerId> {
        match self {
            Self::Int(v) => u32::try_from(*v).ok().map(CallerId),
            Self::Long(v) => u32::try_from(*v).ok().map(CallerId),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentName> {
        match self {
            Self::Component(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_package_setting(&self) -> Option<&PackageSetting> {
        match self {
            Self::PackageSetting(p) => Some(p),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<CallerId> for Value {
    fn from(v: CallerId) -> Self {
        // Identities past the signed int range travel as longs
        match i32::try_from(v.0) {
            Ok(id) => Self::Int(id),
            Err(_) => Self::Long(i64::from(v.0)),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<ResolveInfo> for Value {
    fn from(v: ResolveInfo) -> Self {
        Self::ResolveInfo(v)
    }
}

impl From<PackageInfo> for Value {
    fn from(v: PackageInfo) -> Self {
        Self::PackageInfo(v)
    }
}

/// One call arriving at a dispatched method
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Identity of the process that issued the call into the service
    pub caller: CallerId,
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn new(caller: CallerId, args: Vec<Value>) -> Self {
        Self { caller, args }
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

/// Failure raised by a dispatched registry call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The registry's "no such package" condition
    #[error("Name not found: {0}")]
    NameNotFound(String),

    #[error("Remote call failed: {0}")]
    Remote(String),
}

/// Outcome of a dispatched registry call
pub type CallResult = Result<Value, CallError>;
