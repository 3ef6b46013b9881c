//! Engine error types
//!
//! None of these are ever surfaced to a registry caller. Install errors end
//! in a rolled-back transaction, config errors in a skipped rule entry.

use hideapp_api::{MethodKey, RuntimeVersion};
use thiserror::Error;

/// Errors raised while resolving, capturing or splicing interceptions
#[derive(Debug, Error)]
pub enum HookError {
    /// Target class (or structural anchor) absent in the running version
    #[error("Target not found: {target}")]
    ResolutionFailure { target: String },

    /// No signature variant covers the running version
    #[error("No signature of {operation} matches runtime {version}")]
    SignatureNotFound {
        operation: String,
        version: RuntimeVersion,
    },

    /// More than one signature variant covers the running version
    #[error("{count} signatures of {operation} match runtime {version}")]
    AmbiguousSignature {
        operation: String,
        version: RuntimeVersion,
        count: usize,
    },

    /// Original call path unreachable
    #[error("Cannot capture {class}.{method}: {reason}")]
    CaptureFailed {
        class: String,
        method: MethodKey,
        reason: String,
    },

    /// Dispatch table refused a splice or restore
    #[error("Dispatch patch failed on {class}.{method}: {reason}")]
    Patch {
        class: String,
        method: MethodKey,
        reason: String,
    },

    /// Too few interceptions took effect for the install to be meaningful
    #[error("Only {installed} interceptions installed, at least {required} required")]
    ThresholdNotMet { installed: usize, required: usize },
}

impl HookError {
    pub fn resolution(target: impl Into<String>) -> Self {
        Self::ResolutionFailure {
            target: target.into(),
        }
    }

    pub fn capture_failed(
        class: impl Into<String>,
        method: &MethodKey,
        reason: impl Into<String>,
    ) -> Self {
        Self::CaptureFailed {
            class: class.into(),
            method: method.clone(),
            reason: reason.into(),
        }
    }

    pub fn patch(class: impl Into<String>, method: &MethodKey, reason: impl Into<String>) -> Self {
        Self::Patch {
            class: class.into(),
            method: method.clone(),
            reason: reason.into(),
        }
    }

    /// A defect in the authored interception set rather than in the runtime
    pub fn is_build_defect(&self) -> bool {
        matches!(self, Self::AmbiguousSignature { .. })
    }

    /// Failures a missing optional target may recover from by skipping
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::ResolutionFailure { .. }
                | Self::SignatureNotFound { .. }
                | Self::CaptureFailed { .. }
        )
    }
}

/// Errors raised while parsing a rule configuration string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Entry does not split into exactly `target:hidden,...`
    #[error("Invalid rule entry: '{0}'")]
    MalformedEntry(String),

    /// Named target has no caller identity on this host
    #[error("Unknown target package: {0}")]
    UnknownTarget(String),

    /// Entry names a target but hides nothing
    #[error("Rule for {0} hides no packages")]
    EmptyRule(String),

    #[error("Invalid plugin configuration: {0}")]
    InvalidPluginConfig(String),
}
