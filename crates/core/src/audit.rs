//! Audit records — an append-only trail of every state transition.
//!
//! The executor, the meta-cognition stage and the reasoning loop are handed
//! an [`AuditSink`] at construction instead of reaching for a global logger.
//! Tests substitute a [`MemoryAuditSink`]; deployments typically use
//! [`TracingAuditSink`] or fan out to several sinks.

use crate::message::CorrelationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Which part of the engine emitted a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSource {
    Pipeline,
    Validation,
    Refinement,
    Reasoning,
}

/// Transition status carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Started,
    Succeeded,
    Failed,
    Skipped,
}

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub correlation_id: CorrelationId,
    pub source: AuditSource,
    /// Stage name, validator name, or loop phase
    pub subject: String,
    pub status: AuditStatus,
    pub duration_ms: u64,
    pub details: Option<String>,
}

impl AuditRecord {
    pub fn new(
        correlation_id: &CorrelationId,
        source: AuditSource,
        subject: impl Into<String>,
        status: AuditStatus,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            correlation_id: correlation_id.clone(),
            source,
            subject: subject.into(),
            status,
            duration_ms,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Where audit records go. Sinks only ever append.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// In-memory sink that stores records in a vector.
/// Useful for testing and for short-lived inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl std::fmt::Debug for MemoryAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAuditSink")
            .field("record_count", &self.count())
            .finish()
    }
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All records, in emission order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().clone()
    }

    pub fn records_with_status(&self, status: AuditStatus) -> Vec<AuditRecord> {
        self.lock()
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    pub fn records_for(&self, subject: &str) -> Vec<AuditRecord> {
        self.lock()
            .iter()
            .filter(|r| r.subject == subject)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        self.lock().push(record.clone());
    }
}

/// A tracing-based sink that logs records via `tracing::info!`.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        tracing::info!(
            correlation_id = %record.correlation_id,
            source = ?record.source,
            subject = %record.subject,
            status = ?record.status,
            duration_ms = record.duration_ms,
            details = ?record.details,
            "AUDIT"
        );
    }
}

/// A sink that drops every record.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}

/// Forwards every record to each inner sink, in order.
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, record: &AuditRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str, status: AuditStatus) -> AuditRecord {
        AuditRecord::new(
            &CorrelationId::from("run-1"),
            AuditSource::Pipeline,
            subject,
            status,
            12,
        )
    }

    #[test]
    fn memory_sink_keeps_emission_order() {
        let sink = MemoryAuditSink::new();
        sink.record(&record("context", AuditStatus::Started));
        sink.record(&record("context", AuditStatus::Succeeded));
        sink.record(&record("generation", AuditStatus::Started));

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].status, AuditStatus::Succeeded);
        assert_eq!(records[2].subject, "generation");
        assert_eq!(sink.records_for("context").len(), 2);
        assert_eq!(sink.records_with_status(AuditStatus::Started).len(), 2);
    }

    #[test]
    fn fanout_forwards_to_every_sink() {
        let a = Arc::new(MemoryAuditSink::new());
        let b = Arc::new(MemoryAuditSink::new());
        let fanout = FanoutAuditSink::new(vec![a.clone(), b.clone(), Arc::new(NullAuditSink)]);
        fanout.record(&record("stage", AuditStatus::Failed));
        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 1);
    }

    #[test]
    fn record_serialization() {
        let r = record("meta", AuditStatus::Skipped).with_details("disabled by mode");
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"skipped\""));
        assert!(json.contains("disabled by mode"));
    }

    #[test]
    fn debug_format() {
        let sink = MemoryAuditSink::new();
        let debug_str = format!("{sink:?}");
        assert!(debug_str.contains("record_count"));
    }
}
