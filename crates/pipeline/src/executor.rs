//! Pipeline executor — runs ordered stages under timeouts and an error policy.
//!
//! The executor never returns an error and never unwinds: every failure,
//! including a panicking stage, becomes a [`StageResult`] in the run log and
//! `succeeded == false` on the [`PipelineResult`].

use crate::stage::{Stage, StageContext, StageResult, StageStatus};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stratum_config::{ConfigError, ErrorPolicy, PipelineSettings, ResolvedConfig};
use stratum_core::{AuditRecord, AuditSink, AuditSource, AuditStatus, StageError};
use tracing::{debug, info, warn};

/// The outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult<T> {
    /// Output of the last stage that succeeded (or the initial input)
    pub final_output: T,

    /// One entry per stage that was reached, in declaration order
    pub stage_results: Vec<StageResult<T>>,

    pub succeeded: bool,
    pub total_duration_ms: u64,
}

impl<T> PipelineResult<T> {
    /// Results for stages that actually ran.
    pub fn executed(&self) -> impl Iterator<Item = &StageResult<T>> {
        self.stage_results
            .iter()
            .filter(|r| r.status != StageStatus::Skipped)
    }

    pub fn first_failure(&self) -> Option<&StageResult<T>> {
        self.stage_results
            .iter()
            .find(|r| r.status == StageStatus::Failed)
    }

    pub fn result_for(&self, stage: &str) -> Option<&StageResult<T>> {
        self.stage_results.iter().find(|r| r.stage_name == stage)
    }
}

/// Runs stages against an immutable settings snapshot.
pub struct PipelineExecutor {
    settings: PipelineSettings,
    audit: Arc<dyn AuditSink>,
}

impl PipelineExecutor {
    pub fn new(settings: PipelineSettings, audit: Arc<dyn AuditSink>) -> Self {
        Self { settings, audit }
    }

    pub fn from_config(config: &ResolvedConfig, audit: Arc<dyn AuditSink>) -> Self {
        Self::new(config.pipeline.clone(), audit)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn emit(&self, ctx: &StageContext, stage: &str, status: AuditStatus, duration_ms: u64, details: Option<String>) {
        let mut record = AuditRecord::new(
            &ctx.correlation_id,
            AuditSource::Pipeline,
            stage,
            status,
            duration_ms,
        );
        if let Some(details) = details {
            record = record.with_details(details);
        }
        self.audit.record(&record);
    }

    /// Run `stages` in order, starting from `input`.
    pub async fn run<T>(
        &self,
        stages: &[Arc<dyn Stage<T>>],
        input: T,
        ctx: &StageContext,
    ) -> PipelineResult<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let started = Instant::now();
        let deadline = self.settings.pipeline_timeout.map(|t| started + t);
        let mut current = input;
        let mut stage_results = Vec::with_capacity(stages.len());
        let mut succeeded = true;

        info!(
            correlation_id = %ctx.correlation_id,
            mode = %ctx.mode,
            stages = stages.len(),
            "Pipeline run started"
        );

        for stage in stages {
            let name = stage.name().to_string();

            if !self.settings.is_enabled(&name) {
                debug!(stage = %name, "Stage disabled, passing input through");
                self.emit(ctx, &name, AuditStatus::Skipped, 0, Some("disabled".into()));
                stage_results.push(StageResult::skipped(name, current.clone()));
                continue;
            }

            self.emit(ctx, &name, AuditStatus::Started, 0, None);
            let stage_started = Instant::now();
            let outcome = self.run_stage(stage.as_ref(), &current, ctx, deadline).await;
            let duration_ms = stage_started.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => {
                    debug!(stage = %name, duration_ms, "Stage succeeded");
                    self.emit(ctx, &name, AuditStatus::Succeeded, duration_ms, None);
                    stage_results.push(StageResult::succeeded(name, output.clone(), duration_ms));
                    current = output;
                }
                Err(error) => {
                    warn!(stage = %name, duration_ms, error = %error, "Stage failed");
                    self.emit(ctx, &name, AuditStatus::Failed, duration_ms, Some(error.to_string()));
                    stage_results.push(StageResult::failed(name, error, duration_ms));
                    succeeded = false;
                    if self.settings.error_policy == ErrorPolicy::FailFast {
                        break;
                    }
                }
            }
        }

        let total_duration_ms = started.elapsed().as_millis() as u64;
        info!(
            correlation_id = %ctx.correlation_id,
            succeeded,
            total_duration_ms,
            "Pipeline run finished"
        );

        PipelineResult {
            final_output: current,
            stage_results,
            succeeded,
            total_duration_ms,
        }
    }

    /// Drive one stage's hooks. Always runs `finalize` once `process` was attempted.
    async fn run_stage<T>(
        &self,
        stage: &dyn Stage<T>,
        input: &T,
        ctx: &StageContext,
        deadline: Option<Instant>,
    ) -> Result<T, StageError>
    where
        T: Clone + Send + Sync + 'static,
    {
        stage
            .validate_input(input, ctx)
            .map_err(StageError::Validation)?;

        let budget = self.budget(deadline);
        if budget.is_zero() {
            return Err(StageError::timeout(self.deadline_ms()));
        }

        let processed = AssertUnwindSafe(stage.process(input.clone(), ctx)).catch_unwind();
        let result = match tokio::time::timeout(budget, processed).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(StageError::exception(panic_message(panic.as_ref()))),
            Err(_) => Err(StageError::timeout(budget.as_millis() as u64)),
        };

        let finalize_budget = self.budget(deadline).max(Duration::from_millis(1));
        let finalized = AssertUnwindSafe(stage.finalize(ctx)).catch_unwind();
        match tokio::time::timeout(finalize_budget, finalized).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(stage = stage.name(), error = %e, "Stage finalize failed"),
            Ok(Err(panic)) => warn!(
                stage = stage.name(),
                panic = %panic_message(panic.as_ref()),
                "Stage finalize panicked"
            ),
            Err(_) => warn!(stage = stage.name(), "Stage finalize timed out"),
        }

        result
    }

    /// Time available to the next stage: the stage timeout, capped by
    /// whatever remains of the pipeline deadline.
    fn budget(&self, deadline: Option<Instant>) -> Duration {
        match deadline {
            Some(deadline) => self
                .settings
                .stage_timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.settings.stage_timeout,
        }
    }

    fn deadline_ms(&self) -> u64 {
        self.settings
            .pipeline_timeout
            .map(|t| t.as_millis() as u64)
            .unwrap_or(0)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("stage panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("stage panicked: {s}")
    } else {
        "stage panicked".into()
    }
}

/// An ordered, validated list of stages bound to an executor.
pub struct Pipeline<T> {
    stages: Vec<Arc<dyn Stage<T>>>,
    executor: PipelineExecutor,
}

impl<T> Pipeline<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Build a pipeline. Stage names must be non-empty and unique.
    pub fn new(executor: PipelineExecutor, stages: Vec<Arc<dyn Stage<T>>>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for stage in &stages {
            let name = stage.name();
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError("stage name cannot be empty".into()));
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate stage name '{name}'"
                )));
            }
        }
        for disabled in &executor.settings.disabled_stages {
            if !seen.contains(disabled) {
                warn!(stage = %disabled, "Disabled stage is not part of this pipeline");
            }
        }
        Ok(Self { stages, executor })
    }

    pub async fn run(&self, input: T, ctx: &StageContext) -> PipelineResult<T> {
        self.executor.run(&self.stages, input, ctx).await
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Number of stages the current settings will actually run.
    pub fn enabled_stage_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| self.executor.settings.is_enabled(s.name()))
            .count()
    }
}
