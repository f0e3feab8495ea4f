//! The stage abstraction.
//!
//! A stage is a unit of work with three optional hooks: `validate_input`,
//! `process` and `finalize`. The executor drives the hooks; a stage never
//! sees other stages, only the value handed to it and a read-only
//! [`StageContext`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratum_core::{CorrelationId, StageError};

/// Per-run context shared by every stage. Built once by the caller and
/// never mutated by the executor or a stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageContext {
    /// The configuration mode this run was resolved for
    pub mode: String,

    pub correlation_id: CorrelationId,

    /// Outputs of earlier runs or upstream systems, in arrival order
    #[serde(default)]
    pub upstream_outputs: Vec<(String, serde_json::Value)>,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl StageContext {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            correlation_id: CorrelationId::new(),
            upstream_outputs: vec![],
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = id;
        self
    }

    pub fn with_upstream(mut self, source: impl Into<String>, output: serde_json::Value) -> Self {
        self.upstream_outputs.push((source.into(), output));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The most recent upstream output from `source`.
    pub fn upstream(&self, source: &str) -> Option<&serde_json::Value> {
        self.upstream_outputs
            .iter()
            .rev()
            .find(|(s, _)| s == source)
            .map(|(_, v)| v)
    }
}

/// A composable pipeline unit over payload type `T`.
///
/// Every hook has a default: input is accepted, `process` passes the input
/// through unchanged, and `finalize` does nothing.
#[async_trait]
pub trait Stage<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Stable stage name. Used for enablement, audit records and results.
    fn name(&self) -> &str;

    /// Precondition check. An error here means `process` never runs.
    fn validate_input(&self, _input: &T, _ctx: &StageContext) -> Result<(), String> {
        Ok(())
    }

    async fn process(&self, input: T, _ctx: &StageContext) -> Result<T, StageError> {
        Ok(input)
    }

    /// Cleanup hook. Runs after `process` whatever its outcome; errors are
    /// logged and never change the stage's status.
    async fn finalize(&self, _ctx: &StageContext) -> Result<(), StageError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// One entry in a run's ordered log.
#[derive(Debug, Clone)]
pub struct StageResult<T> {
    pub stage_name: String,
    pub status: StageStatus,

    /// The stage's output; `None` when it failed
    pub output: Option<T>,

    pub duration_ms: u64,
    pub error: Option<StageError>,
}

impl<T> StageResult<T> {
    pub fn succeeded(stage_name: impl Into<String>, output: T, duration_ms: u64) -> Self {
        Self {
            stage_name: stage_name.into(),
            status: StageStatus::Succeeded,
            output: Some(output),
            duration_ms,
            error: None,
        }
    }

    pub fn failed(stage_name: impl Into<String>, error: StageError, duration_ms: u64) -> Self {
        Self {
            stage_name: stage_name.into(),
            status: StageStatus::Failed,
            output: None,
            duration_ms,
            error: Some(error),
        }
    }

    /// A disabled stage: the input passes through as the output.
    pub fn skipped(stage_name: impl Into<String>, passthrough: T) -> Self {
        Self {
            stage_name: stage_name.into(),
            status: StageStatus::Skipped,
            output: Some(passthrough),
            duration_ms: 0,
            error: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().is_some_and(StageError::is_timeout)
    }
}
