//! Intercepted registry operations
//!
//! Each profile is a table of [`OperationSpec`] rows. A row says where the
//! caller identity comes from, what shape the result has, and how "hidden"
//! must surface to the caller. One behavior builder turns every row into an
//! interception, so the filtering logic exists once whatever the signature.
//!
//! - `app`: the in-process profile, hooking the process's package manager proxy
//! - `system`: the system-service profile, hooking the registry service itself

pub mod app;
pub mod system;

use crate::dispatch::Delegate;
use crate::filter::ResultFilter;
use crate::registry::{Behavior, MethodInterception};
use crate::signature::SignatureVariant;
use hideapp_api::{
    ApplicationInfo, CallError, CallResult, CallerId, Invocation, PackageInfo, ResolveInfo, Value,
};
use std::sync::Arc;

/// Where the querying caller's identity is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerSource {
    /// Identity of the process that issued the call
    Ambient,
    /// An integer argument the service passes explicitly
    Arg(usize),
}

/// Result shape of an operation, and so the filter applied to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Nullable single record
    Single,
    /// Flat list
    List,
    /// List inside a page container
    Wrapped,
    /// Answered by name; a hidden name is rejected before delegating
    NameGuard { name_arg: usize },
    /// Boolean "filter this" check on a setting and/or a component argument
    AccessCheck {
        setting_arg: Option<usize>,
        component_arg: Option<usize>,
    },
}

/// How an operation reports that its subject does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceSignal {
    /// Returns null
    Null,
    /// Raises the registry's name-not-found condition
    NameNotFound,
}

impl AbsenceSignal {
    /// The result a caller sees for a hidden `name`
    pub fn signal(self, name: &str) -> CallResult {
        match self {
            Self::Null => Ok(Value::Null),
            Self::NameNotFound => Err(CallError::NameNotFound(name.to_string())),
        }
    }
}

/// One row of an operation table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    pub method: &'static str,
    pub variants: &'static [SignatureVariant],
    pub caller: CallerSource,
    pub shape: ResultShape,
    pub absence: AbsenceSignal,
}

impl OperationSpec {
    /// Caller identity of an invocation; `None` leaves the call unfiltered
    pub fn caller_of(&self, invocation: &Invocation) -> Option<CallerId> {
        match self.caller {
            CallerSource::Ambient => Some(invocation.caller),
            CallerSource::Arg(index) => invocation.arg(index).and_then(Value::as_caller),
        }
    }

    /// Compile this row into an interception filtering through `filter`
    pub fn interception(&self, filter: &ResultFilter) -> MethodInterception {
        MethodInterception::new(self.method, self.variants, behavior(*self, filter.clone()))
    }
}

fn resolve_info_package(info: &ResolveInfo) -> Option<&str> {
    info.package_name()
}

fn package_info_package(info: &PackageInfo) -> Option<&str> {
    Some(info.package_name.as_str())
}

fn application_package(info: &ApplicationInfo) -> Option<&str> {
    Some(info.package_name.as_str())
}

/// Shared replacement body for every operation row
pub fn behavior(op: OperationSpec, filter: ResultFilter) -> Behavior {
    Arc::new(move |delegate: &Delegate, invocation: &Invocation| -> CallResult {
        let Some(caller) = op.caller_of(invocation) else {
            tracing::debug!(method = op.method, "No caller identity in arguments, passing through");
            return delegate.call(invocation);
        };

        match op.shape {
            ResultShape::NameGuard { name_arg } => {
                if let Some(name) = invocation.arg(name_arg).and_then(Value::as_str) {
                    if filter.is_hidden(caller, name) {
                        tracing::trace!(method = op.method, caller = %caller, name, "Hidden name rejected");
                        return op.absence.signal(name);
                    }
                }
                delegate.call(invocation)
            }
            ResultShape::AccessCheck {
                setting_arg,
                component_arg,
            } => {
                let component = component_arg
                    .and_then(|i| invocation.arg(i))
                    .and_then(Value::as_component)
                    .map(|c| c.package_name.as_str());
                let setting = setting_arg
                    .and_then(|i| invocation.arg(i))
                    .and_then(Value::as_package_setting)
                    .map(|s| s.name.as_str());
                filter
                    .filter_boolean(caller, component.or(setting), || {
                        delegate
                            .call(invocation)
                            .map(|v| v.as_bool().unwrap_or(false))
                    })
                    .map(Value::Bool)
            }
            ResultShape::Single => {
                let raw = delegate.call(invocation)?;
                filter_single(&filter, op, raw, caller)
            }
            ResultShape::List | ResultShape::Wrapped => {
                let raw = delegate.call(invocation)?;
                Ok(filter_many(&filter, raw, caller))
            }
        }
    })
}

fn filter_single(
    filter: &ResultFilter,
    op: OperationSpec,
    raw: Value,
    caller: CallerId,
) -> CallResult {
    match raw {
        Value::ResolveInfo(info) => {
            let name = info.package_name().unwrap_or_default().to_string();
            match filter.filter_single(Some(info), caller, resolve_info_package) {
                Some(info) => Ok(Value::ResolveInfo(info)),
                None => op.absence.signal(&name),
            }
        }
        Value::PackageInfo(info) => {
            let name = info.package_name.clone();
            match filter.filter_single(Some(info), caller, package_info_package) {
                Some(info) => Ok(Value::PackageInfo(info)),
                None => op.absence.signal(&name),
            }
        }
        // Genuine absence and unexpected kinds pass through untouched
        other => Ok(other),
    }
}

fn filter_many(filter: &ResultFilter, raw: Value, caller: CallerId) -> Value {
    match raw {
        Value::ResolveInfoList(list) => {
            Value::ResolveInfoList(filter.filter_list(list, caller, resolve_info_package))
        }
        Value::ApplicationInfoList(list) => {
            Value::ApplicationInfoList(filter.filter_list(list, caller, application_package))
        }
        Value::ResolveInfoSlice(page) => {
            Value::ResolveInfoSlice(filter.filter_wrapped(page, caller, resolve_info_package))
        }
        Value::PackageInfoSlice(page) => {
            Value::PackageInfoSlice(filter.filter_wrapped(page, caller, package_info_package))
        }
        Value::ApplicationInfoSlice(page) => {
            Value::ApplicationInfoSlice(filter.filter_wrapped(page, caller, application_package))
        }
        other => other,
    }
}
