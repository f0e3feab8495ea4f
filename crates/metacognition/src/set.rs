//! Validator set — level-based selection and concurrent fan-out/fan-in.

use crate::alignment::AlignmentValidator;
use crate::consistency::{ConsistencyValidator, HeuristicConsistencyValidator};
use crate::safety::{SafetyScanner, SafetyValidator};
use crate::validator::Validator;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stratum_config::{Thresholds, ValidationLevel};
use stratum_core::{
    AuditRecord, AuditSink, AuditSource, AuditStatus, CorrelationId, ModelCaller, Persona,
    ValidationReport, ValidatorKind, ValidatorOutcome,
};
use tracing::{debug, warn};

/// The validators active for one validation level.
pub struct ValidatorSet {
    validators: Vec<Arc<dyn Validator>>,
    thresholds: Thresholds,
    timeout: Duration,
    audit: Arc<dyn AuditSink>,
}

impl ValidatorSet {
    pub fn new(thresholds: Thresholds, timeout: Duration, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            validators: vec![],
            thresholds,
            timeout,
            audit,
        }
    }

    /// Add a validator. A later validator of the same kind replaces an
    /// earlier one.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.retain(|v| v.kind() != validator.kind());
        self.validators.push(validator);
        self
    }

    /// The standard selection for `level`:
    /// - `full`: safety, alignment, consistency
    /// - `safety_only`: safety
    /// - `quick`: safety and heuristic consistency
    /// - `none`: nothing
    pub fn for_level(
        level: ValidationLevel,
        caller: Arc<dyn ModelCaller>,
        persona: &Persona,
        scanner: SafetyScanner,
        thresholds: Thresholds,
        timeout: Duration,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let set = Self::new(thresholds, timeout, audit);
        match level {
            ValidationLevel::None => set,
            ValidationLevel::SafetyOnly => set.with_validator(Arc::new(SafetyValidator::new(scanner))),
            ValidationLevel::Quick => set
                .with_validator(Arc::new(SafetyValidator::new(scanner)))
                .with_validator(Arc::new(HeuristicConsistencyValidator::new(persona.clone()))),
            ValidationLevel::Full => set
                .with_validator(Arc::new(SafetyValidator::new(scanner)))
                .with_validator(Arc::new(AlignmentValidator::new(
                    caller.clone(),
                    persona.core_values.clone(),
                    timeout,
                )))
                .with_validator(Arc::new(ConsistencyValidator::new(
                    caller,
                    persona.clone(),
                    timeout,
                ))),
        }
    }

    pub fn kinds(&self) -> Vec<ValidatorKind> {
        let mut kinds: Vec<_> = self.validators.iter().map(|v| v.kind()).collect();
        kinds.sort();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every validator concurrently and join the outcomes.
    ///
    /// A validator that errors or exceeds the timeout is scored
    /// failed-closed; it never aborts the report.
    pub async fn run(
        &self,
        response: &str,
        prompt: Option<&str>,
        correlation_id: &CorrelationId,
    ) -> ValidationReport {
        let runs = self.validators.iter().map(|validator| async move {
            let kind = validator.kind();
            let threshold = self.thresholds.for_kind(kind);
            let started = Instant::now();
            let outcome =
                match tokio::time::timeout(self.timeout, validator.validate(response, prompt)).await {
                    Ok(Ok(assessment)) => {
                        let mut outcome =
                            ValidatorOutcome::scored(assessment.score, threshold, assessment.issues);
                        if let Some(range) = assessment.score_range {
                            outcome = outcome.with_range(range);
                        }
                        outcome
                    }
                    Ok(Err(e)) => {
                        warn!(validator = validator.name(), error = %e, "Validator failed, scoring failed-closed");
                        ValidatorOutcome::failed_closed(kind, threshold, e.to_string())
                    }
                    Err(_) => {
                        warn!(validator = validator.name(), "Validator timed out, scoring failed-closed");
                        ValidatorOutcome::failed_closed(
                            kind,
                            threshold,
                            format!("timed out after {}ms", self.timeout.as_millis()),
                        )
                    }
                };
            let duration_ms = started.elapsed().as_millis() as u64;
            (kind, validator.name().to_string(), outcome, duration_ms)
        });

        let mut per_validator = BTreeMap::new();
        for (kind, name, outcome, duration_ms) in join_all(runs).await {
            debug!(
                validator = %name,
                score = outcome.score,
                threshold = outcome.threshold,
                passed = outcome.passed,
                issues = outcome.issues.len(),
                "Validator finished"
            );
            let status = if outcome.passed {
                AuditStatus::Succeeded
            } else {
                AuditStatus::Failed
            };
            self.audit.record(
                &AuditRecord::new(correlation_id, AuditSource::Validation, name, status, duration_ms)
                    .with_details(format!("score={:.2} threshold={:.2}", outcome.score, outcome.threshold)),
            );
            per_validator.insert(kind, outcome);
        }

        ValidationReport::from_outcomes(per_validator)
    }
}
