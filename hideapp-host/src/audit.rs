//! Audit trail for install and rule lifecycle events
//!
//! Sinks are pluggable; the engine records one event per hook installed or
//! skipped, per transaction outcome, and per rule reload. Everything stays
//! in memory.

use crate::dispatch::MethodRef;
use crate::rules::RuleTable;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// RFC 3339 timestamp
pub type Timestamp = String;

fn now_rfc3339() -> Timestamp {
    chrono::Utc::now().to_rfc3339()
}

/// Audit event
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: Timestamp,
    pub event_type: AuditEventType,
    pub details: AuditDetails,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, details: AuditDetails) -> Self {
        Self {
            timestamp: now_rfc3339(),
            event_type,
            details,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    HookInstalled,
    HookSkipped,
    TransactionCommitted,
    TransactionRolledBack,
    RulesReplaced,
    RuleEntrySkipped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AuditDetails {
    /// A single interception point
    Hook {
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Outcome of a hook transaction
    Transaction {
        installed: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// A newly published rule table
    Rules { rules_hash: String, callers: usize },
    /// A rule entry dropped while parsing
    RuleEntry { reason: String },
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to serialize audit event: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;

    fn flush(&self) -> Result<(), AuditError>;

    fn is_healthy(&self) -> bool {
        true
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Bounded in-memory sink; the oldest event is evicted first
pub struct MemoryAuditSink {
    events: RwLock<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.events.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn find_by_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        if self.max_events == 0 {
            return Ok(());
        }
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        while events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

impl fmt::Debug for MemoryAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAuditSink")
            .field("count", &self.count())
            .field("max_events", &self.max_events)
            .finish()
    }
}

/// Discards all events
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl NullAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Emits each event as a structured `tracing` record
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let details = serde_json::to_string(&event.details)?;
        tracing::info!(
            target: "hideapp::audit",
            event = ?event.event_type,
            timestamp = %event.timestamp,
            details = %details,
            "Audit"
        );
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Fans each event out to several sinks
pub struct CompositeAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl CompositeAuditSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Add a sink the caller keeps a handle to
    pub fn with_shared(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Default for CompositeAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for CompositeAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        for sink in &self.sinks {
            sink.record(event.clone())?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        for sink in &self.sinks {
            sink.flush()?;
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.sinks.iter().all(|s| s.is_healthy())
    }
}

impl fmt::Debug for CompositeAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeAuditSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

/// Record an event, logging rather than propagating a sink failure
pub fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    if let Err(e) = sink.record(event) {
        tracing::warn!(error = %e, "Audit sink rejected event");
    }
}

// ============================================================================
// Event constructors
// ============================================================================

pub fn hook_installed(target: &MethodRef) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::HookInstalled,
        AuditDetails::Hook {
            target: target.to_string(),
            reason: None,
        },
    )
}

pub fn hook_skipped(target: &str, reason: &str) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::HookSkipped,
        AuditDetails::Hook {
            target: target.to_string(),
            reason: Some(reason.to_string()),
        },
    )
}

pub fn transaction_committed(installed: usize) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::TransactionCommitted,
        AuditDetails::Transaction {
            installed,
            reason: None,
        },
    )
}

pub fn transaction_rolled_back(reverted: usize, reason: &str) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::TransactionRolledBack,
        AuditDetails::Transaction {
            installed: reverted,
            reason: Some(reason.to_string()),
        },
    )
}

pub fn rules_replaced(table: &RuleTable) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::RulesReplaced,
        AuditDetails::Rules {
            rules_hash: table.compute_hash(),
            callers: table.len(),
        },
    )
}

pub fn rule_entry_skipped(reason: &str) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::RuleEntrySkipped,
        AuditDetails::RuleEntry {
            reason: reason.to_string(),
        },
    )
}
