//! Rule configuration strings
//!
//! System mode: `entry ("|" entry)*` with `entry = target ":" hidden ("," hidden)*`.
//! In-process mode: a bare `hidden ("," hidden)*` list for the current process.
//!
//! A bad entry never fails the whole reload; it is logged, kept in
//! [`ParsedRules::skipped`], and the rest of the string still applies.

use super::RuleTable;
use crate::error::ConfigError;
use hideapp_api::CallerId;
use std::collections::HashMap;

const ENTRY_SEPARATOR: &str = "|";
const TARGET_SEPARATOR: &str = ":";
const HIDDEN_SEPARATOR: &str = ",";

/// Host facility mapping a package name to the caller identity it runs as
pub trait IdentityResolver: Send + Sync {
    fn caller_for_package(&self, package: &str) -> Option<CallerId>;
}

impl IdentityResolver for HashMap<String, CallerId> {
    fn caller_for_package(&self, package: &str) -> Option<CallerId> {
        self.get(package).copied()
    }
}

/// Outcome of parsing a rule string
#[derive(Debug, Clone, Default)]
pub struct ParsedRules {
    pub table: RuleTable,
    /// Entries dropped during parsing
    pub skipped: Vec<ConfigError>,
}

fn hidden_names(list: &str) -> impl Iterator<Item = &str> {
    list.split(HIDDEN_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse a system-mode rule string
pub fn parse_rules(config: Option<&str>, resolver: &dyn IdentityResolver) -> ParsedRules {
    let mut parsed = ParsedRules::default();
    let Some(config) = config.map(str::trim).filter(|s| !s.is_empty()) else {
        return parsed;
    };
    tracing::debug!(config, "Parsing hide rules");

    for entry in config.split(ENTRY_SEPARATOR).filter(|e| !e.trim().is_empty()) {
        let parts: Vec<&str> = entry.split(TARGET_SEPARATOR).collect();
        let &[target, hidden] = parts.as_slice() else {
            tracing::warn!(entry, "Invalid rule entry");
            parsed
                .skipped
                .push(ConfigError::MalformedEntry(entry.to_string()));
            continue;
        };
        let target = target.trim();

        let names: Vec<&str> = hidden_names(hidden).collect();
        if names.is_empty() {
            tracing::warn!(target, "Rule hides nothing");
            parsed.skipped.push(ConfigError::EmptyRule(target.to_string()));
            continue;
        }

        let Some(caller) = resolver.caller_for_package(target) else {
            tracing::warn!(target, "Target package not found");
            parsed
                .skipped
                .push(ConfigError::UnknownTarget(target.to_string()));
            continue;
        };

        tracing::info!(target, caller = %caller, hidden = ?names, "Rule added");
        parsed.table.insert(caller, names);
    }
    parsed
}

/// Parse an in-process hidden list for the process running as `own_caller`
///
/// The process's own package is never hidden from itself.
pub fn parse_app_list(config: Option<&str>, own_package: &str, own_caller: CallerId) -> RuleTable {
    let mut table = RuleTable::new();
    if let Some(config) = config {
        table.insert(own_caller, hidden_names(config));
        table.unhide(own_caller, own_package);
    }
    table
}

/// Encode `(target, hidden)` pairs in the system-mode grammar
///
/// Targets with nothing to hide are left out.
pub fn encode_rules<'a, I, H>(rules: I) -> String
where
    I: IntoIterator<Item = (&'a str, H)>,
    H: IntoIterator<Item = &'a str>,
{
    let mut entries = Vec::new();
    for (target, hidden) in rules {
        let hidden: Vec<&str> = hidden.into_iter().filter(|h| !h.is_empty()).collect();
        if target.is_empty() || hidden.is_empty() {
            continue;
        }
        entries.push(format!(
            "{}{}{}",
            target,
            TARGET_SEPARATOR,
            hidden.join(HIDDEN_SEPARATOR)
        ));
    }
    entries.join(ENTRY_SEPARATOR)
}
