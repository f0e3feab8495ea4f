//! The meta-cognition stage: validator set + refinement behind one policy.

use crate::refinement::RefinementEngine;
use crate::safety::SafetyScanner;
use crate::set::ValidatorSet;
use async_trait::async_trait;
use std::sync::Arc;
use stratum_config::{ConfigError, ResolvedConfig, ValidationLevel, ValidationSettings};
use stratum_core::{
    AuditSink, ModelCaller, Persona, RefinementResult, StageError, ValidationReport,
    ValidatorKind,
};
use stratum_pipeline::{Stage, StageContext, Turn};
use tracing::{debug, info};

pub const METACOGNITION_STAGE: &str = "metacognition";

/// What the stage concluded about one candidate response.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaCognitionOutput {
    /// The text to surface downstream
    pub response: String,
    pub report: ValidationReport,
    /// Present only when validation failed and refinement ran
    pub refinement: Option<RefinementResult>,
}

pub struct MetaCognitionStage {
    settings: ValidationSettings,
    validators: ValidatorSet,
    refiner: RefinementEngine,
}

impl MetaCognitionStage {
    /// Build the stage from a resolved validation snapshot.
    pub fn new(
        settings: ValidationSettings,
        persona: Persona,
        caller: Arc<dyn ModelCaller>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        for kind in ValidatorKind::ALL {
            let threshold = settings.thresholds.for_kind(kind);
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::ValidationError(format!(
                    "{kind} threshold {threshold} is outside [0, 1]"
                )));
            }
        }
        if settings.validator_timeout.is_zero() || settings.refinement_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "validation timeouts must be greater than zero".into(),
            ));
        }

        let scanner = SafetyScanner::builtin();
        let validators = ValidatorSet::for_level(
            settings.level,
            caller.clone(),
            &persona,
            scanner.clone(),
            settings.thresholds,
            settings.validator_timeout,
            audit.clone(),
        );
        let refiner = RefinementEngine::new(caller, persona, scanner, settings.refinement_timeout, audit);
        Ok(Self {
            settings,
            validators,
            refiner,
        })
    }

    pub fn from_config(
        config: &ResolvedConfig,
        caller: Arc<dyn ModelCaller>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        Self::new(config.validation.clone(), config.persona.clone(), caller, audit)
    }

    pub fn level(&self) -> ValidationLevel {
        self.settings.level
    }

    /// Validate `candidate` and, when it fails, refine it once.
    pub async fn review(
        &self,
        candidate: &str,
        prompt: Option<&str>,
        ctx: &StageContext,
    ) -> MetaCognitionOutput {
        if self.settings.level == ValidationLevel::None {
            debug!("Validation level is none, passing response through");
            return MetaCognitionOutput {
                response: candidate.to_string(),
                report: ValidationReport::passthrough(),
                refinement: None,
            };
        }

        let report = self.validators.run(candidate, prompt, &ctx.correlation_id).await;
        info!(
            correlation_id = %ctx.correlation_id,
            level = ?self.settings.level,
            passed = report.overall_passed,
            failed = ?report.failed_validators(),
            "Validation finished"
        );

        if report.overall_passed || self.settings.allow_unsafe || !self.settings.refinement_enabled {
            if !report.overall_passed {
                debug!(
                    allow_unsafe = self.settings.allow_unsafe,
                    refinement_enabled = self.settings.refinement_enabled,
                    "Refinement bypassed"
                );
            }
            return MetaCognitionOutput {
                response: candidate.to_string(),
                report,
                refinement: None,
            };
        }

        let refinement = self
            .refiner
            .refine(candidate, &report, &ctx.correlation_id)
            .await;
        let response = match &refinement {
            Some(r) if self.settings.surface_refined => r.refined_text.clone(),
            _ => candidate.to_string(),
        };
        MetaCognitionOutput {
            response,
            report,
            refinement,
        }
    }
}

#[async_trait]
impl Stage<Turn> for MetaCognitionStage {
    fn name(&self) -> &str {
        METACOGNITION_STAGE
    }

    fn validate_input(&self, input: &Turn, _ctx: &StageContext) -> Result<(), String> {
        match input.response.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(()),
            _ => Err("turn has no candidate response".into()),
        }
    }

    async fn process(&self, mut turn: Turn, ctx: &StageContext) -> Result<Turn, StageError> {
        let candidate = turn.response_text().to_string();
        let output = self.review(&candidate, Some(&turn.message), ctx).await;
        turn.response = Some(output.response);
        turn.report = Some(output.report);
        turn.refinement = output.refinement;
        Ok(turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stratum_core::test_helpers::ScriptedModelCaller;
    use stratum_core::{MemoryAuditSink, ModelRole, NullAuditSink};

    fn persona() -> Persona {
        Persona {
            name: "Ada".into(),
            core_values: vec!["honesty".into()],
            ..Persona::default()
        }
    }

    fn settings(level: ValidationLevel) -> ValidationSettings {
        ValidationSettings::default()
            .with_level(level)
            .with_validator_timeout(Duration::from_millis(500))
            .with_refinement_timeout(Duration::from_millis(500))
    }

    fn stage(settings: ValidationSettings, caller: Arc<ScriptedModelCaller>) -> MetaCognitionStage {
        MetaCognitionStage::new(settings, persona(), caller, Arc::new(NullAuditSink)).unwrap()
    }

    #[tokio::test]
    async fn level_none_is_pure_passthrough() {
        let caller = Arc::new(ScriptedModelCaller::new());
        let s = stage(settings(ValidationLevel::None), caller.clone());
        let out = s
            .review("key sk-ABCDEFG123", None, &StageContext::new("emulation"))
            .await;
        assert_eq!(out.response, "key sk-ABCDEFG123");
        assert!(out.report.overall_passed);
        assert!(out.refinement.is_none());
        assert_eq!(caller.call_count(), 0);
    }

    #[tokio::test]
    async fn safety_only_redacts_key() {
        let s = stage(settings(ValidationLevel::SafetyOnly), Arc::new(ScriptedModelCaller::new()));
        let out = s
            .review("Here's my key: sk-ABCDEFG123", None, &StageContext::new("standard"))
            .await;
        assert!(!out.report.overall_passed);
        let refinement = out.refinement.unwrap();
        assert!(refinement.changed);
        assert_eq!(out.response, refinement.refined_text);
        assert!(!out.response.contains("sk-ABCDEFG123"));
    }

    #[tokio::test]
    async fn allow_unsafe_bypasses_refinement() {
        let mut s = settings(ValidationLevel::SafetyOnly);
        s.allow_unsafe = true;
        let stage = stage(s, Arc::new(ScriptedModelCaller::new()));
        let out = stage
            .review("Here's my key: sk-ABCDEFG123", None, &StageContext::new("standard"))
            .await;
        assert!(!out.report.overall_passed);
        assert!(out.refinement.is_none());
        assert_eq!(out.response, "Here's my key: sk-ABCDEFG123");
    }

    #[tokio::test]
    async fn surface_original_keeps_candidate_but_records_refinement() {
        let mut s = settings(ValidationLevel::SafetyOnly);
        s.surface_refined = false;
        let stage = stage(s, Arc::new(ScriptedModelCaller::new()));
        let out = stage
            .review("Here's my key: sk-ABCDEFG123", None, &StageContext::new("standard"))
            .await;
        assert_eq!(out.response, "Here's my key: sk-ABCDEFG123");
        assert!(out.refinement.unwrap().changed);
    }

    #[tokio::test]
    async fn full_level_alignment_failure_only_rewrites() {
        let caller = Arc::new(
            ScriptedModelCaller::new()
                .respond_when(
                    ModelRole::Curator,
                    "Core values",
                    r#"{"judgments": [{"value": "honesty", "violated": true, "explanation": "Overclaims", "suggestion": "Hedge"}]}"#,
                )
                .respond_when(ModelRole::Curator, "Persona profile", r#"{"score_min": 0.9, "score_max": 1.0}"#)
                .respond(ModelRole::Persona, "It will probably rain."),
        );
        let sink = Arc::new(MemoryAuditSink::new());
        let stage =
            MetaCognitionStage::new(settings(ValidationLevel::Full), persona(), caller, sink.clone()).unwrap();
        let out = stage
            .review("It will rain.", Some("Will it rain?"), &StageContext::new("standard"))
            .await;

        assert!(!out.report.overall_passed);
        assert_eq!(out.report.outcome(ValidatorKind::Safety).unwrap().score, 1.0);
        assert_eq!(out.report.outcome(ValidatorKind::Alignment).unwrap().score, 0.0);
        let refinement = out.refinement.unwrap();
        assert!(refinement.applied_changes.iter().all(|c| c.driver == ValidatorKind::Alignment));
        assert!(!refinement.refined_text.contains("[REDACTED"));
        assert_eq!(out.response, "It will probably rain.");
        assert_eq!(sink.count(), 4);
    }

    #[tokio::test]
    async fn stage_requires_candidate_response() {
        let s = stage(settings(ValidationLevel::Quick), Arc::new(ScriptedModelCaller::new()));
        let ctx = StageContext::new("standard");
        assert!(s.validate_input(&Turn::new("hello"), &ctx).is_err());
        assert!(s.validate_input(&Turn::new("hello").with_response("hi"), &ctx).is_ok());
    }

    #[tokio::test]
    async fn stage_process_fills_turn() {
        let s = stage(settings(ValidationLevel::Quick), Arc::new(ScriptedModelCaller::new()));
        let turn = s
            .process(
                Turn::new("hello").with_response("Hi, I'm Ada."),
                &StageContext::new("lightweight"),
            )
            .await
            .unwrap();
        assert!(turn.report.unwrap().overall_passed);
        assert!(turn.refinement.is_none());
        assert_eq!(turn.response.as_deref(), Some("Hi, I'm Ada."));
    }

    #[test]
    fn invalid_threshold_is_a_config_error() {
        let s = settings(ValidationLevel::Full).with_thresholds(stratum_config::Thresholds {
            safety: 2.0,
            alignment: 0.7,
            consistency: 0.6,
        });
        let result = MetaCognitionStage::new(
            s,
            persona(),
            Arc::new(ScriptedModelCaller::new()),
            Arc::new(NullAuditSink),
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
