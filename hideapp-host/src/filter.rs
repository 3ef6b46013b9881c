//! Result filtering
//!
//! Every call site hands the filter the raw result of the original call, the
//! caller identity, and an extractor yielding an element's target identifier.
//! One rule snapshot is taken per call. A caller with no rules gets the raw
//! result back untouched, without the result ever being walked.

use crate::rules::PolicyProvider;
use hideapp_api::{CallerId, ParceledListSlice};
use std::collections::HashSet;

/// Remove elements whose identifier is in `hidden`, keeping survivor order
///
/// Single pass over the list. Elements the extractor cannot classify are kept.
pub fn retain_visible<T, F>(list: &mut Vec<T>, hidden: &HashSet<String>, extract: F) -> usize
where
    F: Fn(&T) -> Option<&str>,
{
    let before = list.len();
    list.retain(|entry| !extract(entry).is_some_and(|id| hidden.contains(id)));
    before - list.len()
}

/// Post-call filter bound to a policy provider
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    policy: PolicyProvider,
}

impl ResultFilter {
    pub fn new(policy: PolicyProvider) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyProvider {
        &self.policy
    }

    pub fn is_hidden(&self, caller: CallerId, target: &str) -> bool {
        self.policy.is_hidden(caller, target)
    }

    /// Filter a flat list in place, returning how many entries were removed
    pub fn filter_in_place<T, F>(&self, list: &mut Vec<T>, caller: CallerId, extract: F) -> usize
    where
        F: Fn(&T) -> Option<&str>,
    {
        if list.is_empty() {
            return 0;
        }
        let snapshot = self.policy.snapshot();
        let Some(hidden) = snapshot.hidden_set_for(caller) else {
            return 0;
        };
        let removed = retain_visible(list, hidden, extract);
        if removed > 0 {
            tracing::trace!(caller = %caller, removed, "Hidden entries removed");
        }
        removed
    }

    /// Filter a flat list, returning the same (possibly shorter) list
    pub fn filter_list<T, F>(&self, mut raw: Vec<T>, caller: CallerId, extract: F) -> Vec<T>
    where
        F: Fn(&T) -> Option<&str>,
    {
        self.filter_in_place(&mut raw, caller, extract);
        raw
    }

    /// Drop a single record if its identifier is hidden
    ///
    /// Hidden and absent both come back as `None`.
    pub fn filter_single<T, F>(&self, raw: Option<T>, caller: CallerId, extract: F) -> Option<T>
    where
        F: Fn(&T) -> Option<&str>,
    {
        let record = raw?;
        match extract(&record) {
            Some(id) if self.is_hidden(caller, id) => {
                tracing::trace!(caller = %caller, target = id, "Hidden record suppressed");
                None
            }
            _ => Some(record),
        }
    }

    /// Filter the list inside a page container, returning the container
    pub fn filter_wrapped<T, F>(
        &self,
        mut container: ParceledListSlice<T>,
        caller: CallerId,
        extract: F,
    ) -> ParceledListSlice<T>
    where
        F: Fn(&T) -> Option<&str>,
    {
        if let Some(list) = container.list_mut() {
            self.filter_in_place(list, caller, extract);
        }
        container
    }

    /// Access check that answers "filtered" without delegating when the
    /// checked target is hidden
    pub fn filter_boolean<E, D>(
        &self,
        caller: CallerId,
        target: Option<&str>,
        delegate: D,
    ) -> Result<bool, E>
    where
        D: FnOnce() -> Result<bool, E>,
    {
        match target {
            Some(id) if self.is_hidden(caller, id) => Ok(true),
            _ => delegate(),
        }
    }
}
