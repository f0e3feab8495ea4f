//! Mode overrides and the resolved configuration snapshot.

use crate::{
    ConfigError, EngineConfig, ErrorPolicy, PipelineConfig, ReasoningConfig, Thresholds,
    ValidationConfig, ValidationLevel,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use stratum_core::Persona;

/// Names of the modes that exist without any configuration.
pub const BUILTIN_MODES: [&str; 4] = ["standard", "lightweight", "emulation", "agent"];

/// Per-mode overrides. Every field left unset inherits the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_policy: Option<ErrorPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_timeout_ms: Option<u64>,

    /// Replaces the base list when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_stages: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_level: Option<ValidationLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdOverrides>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_unsafe: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_refined: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_max_chars: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<f64>,
}

impl ThresholdOverrides {
    fn apply(&self, base: Thresholds) -> Thresholds {
        Thresholds {
            safety: self.safety.unwrap_or(base.safety),
            alignment: self.alignment.unwrap_or(base.alignment),
            consistency: self.consistency.unwrap_or(base.consistency),
        }
    }
}

/// Overrides for a built-in mode, if `name` is one.
pub fn builtin_mode(name: &str) -> Option<ModeOverrides> {
    match name {
        "standard" => Some(ModeOverrides::default()),
        "lightweight" => Some(ModeOverrides {
            validation_level: Some(ValidationLevel::Quick),
            disabled_stages: Some(vec!["context".into()]),
            ..Default::default()
        }),
        "emulation" => Some(ModeOverrides {
            validation_level: Some(ValidationLevel::None),
            ..Default::default()
        }),
        "agent" => Some(ModeOverrides {
            validation_level: Some(ValidationLevel::Full),
            max_iterations: Some(15),
            ..Default::default()
        }),
        _ => None,
    }
}

/// Executor settings for one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub error_policy: ErrorPolicy,
    pub stage_timeout: Duration,
    pub pipeline_timeout: Option<Duration>,
    pub disabled_stages: BTreeSet<String>,
}

impl PipelineSettings {
    pub fn is_enabled(&self, stage: &str) -> bool {
        !self.disabled_stages.contains(stage)
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_timeout = Some(timeout);
        self
    }

    pub fn with_disabled_stage(mut self, stage: impl Into<String>) -> Self {
        self.disabled_stages.insert(stage.into());
        self
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let base = PipelineConfig::default();
        Self {
            error_policy: base.error_policy,
            stage_timeout: Duration::from_millis(base.stage_timeout_ms),
            pipeline_timeout: base.pipeline_timeout_ms.map(Duration::from_millis),
            disabled_stages: base.disabled_stages.into_iter().collect(),
        }
    }
}

/// Meta-cognition settings for one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSettings {
    pub level: ValidationLevel,
    pub thresholds: Thresholds,
    pub refinement_enabled: bool,
    pub allow_unsafe: bool,
    pub surface_refined: bool,
    pub validator_timeout: Duration,
    pub refinement_timeout: Duration,
}

impl ValidationSettings {
    pub fn with_level(mut self, level: ValidationLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_validator_timeout(mut self, timeout: Duration) -> Self {
        self.validator_timeout = timeout;
        self
    }

    pub fn with_refinement_timeout(mut self, timeout: Duration) -> Self {
        self.refinement_timeout = timeout;
        self
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        let base = ValidationConfig::default();
        Self {
            level: base.level,
            thresholds: base.thresholds,
            refinement_enabled: base.refinement_enabled,
            allow_unsafe: base.allow_unsafe,
            surface_refined: base.surface_refined,
            validator_timeout: Duration::from_millis(base.validator_timeout_ms),
            refinement_timeout: Duration::from_millis(base.refinement_timeout_ms),
        }
    }
}

/// ReAct loop settings for one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningSettings {
    pub max_iterations: u32,
    pub observation_max_chars: usize,
    pub observation_list_preview: usize,
    pub planning_retries: u32,
    pub iteration_timeout: Duration,
    pub model_timeout: Duration,
    pub skill_timeout: Duration,
    pub skill_domain: Option<String>,
}

impl ReasoningSettings {
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_iteration_timeout(mut self, timeout: Duration) -> Self {
        self.iteration_timeout = timeout;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_skill_timeout(mut self, timeout: Duration) -> Self {
        self.skill_timeout = timeout;
        self
    }
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        let base = ReasoningConfig::default();
        Self {
            max_iterations: base.max_iterations,
            observation_max_chars: base.observation_max_chars,
            observation_list_preview: base.observation_list_preview,
            planning_retries: base.planning_retries,
            iteration_timeout: Duration::from_millis(base.iteration_timeout_ms),
            model_timeout: Duration::from_millis(base.model_timeout_ms),
            skill_timeout: Duration::from_millis(base.skill_timeout_ms),
            skill_domain: base.skill_domain,
        }
    }
}

/// Immutable configuration for one mode, with overrides applied.
///
/// Built once per session and shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub mode: String,
    pub persona: Persona,
    pub pipeline: PipelineSettings,
    pub validation: ValidationSettings,
    pub reasoning: ReasoningSettings,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            mode: "standard".into(),
            persona: Persona::default(),
            pipeline: PipelineSettings::default(),
            validation: ValidationSettings::default(),
            reasoning: ReasoningSettings::default(),
        }
    }
}

impl ResolvedConfig {
    /// The snapshot as JSON, durations in milliseconds.
    pub fn snapshot(&self) -> serde_json::Value {
        let ms = |d: Duration| d.as_millis() as u64;
        serde_json::json!({
            "mode": self.mode,
            "persona": self.persona,
            "pipeline": {
                "error_policy": self.pipeline.error_policy,
                "stage_timeout_ms": ms(self.pipeline.stage_timeout),
                "pipeline_timeout_ms": self.pipeline.pipeline_timeout.map(ms),
                "disabled_stages": self.pipeline.disabled_stages,
            },
            "validation": {
                "level": self.validation.level,
                "thresholds": self.validation.thresholds,
                "refinement_enabled": self.validation.refinement_enabled,
                "allow_unsafe": self.validation.allow_unsafe,
                "surface_refined": self.validation.surface_refined,
                "validator_timeout_ms": ms(self.validation.validator_timeout),
                "refinement_timeout_ms": ms(self.validation.refinement_timeout),
            },
            "reasoning": {
                "max_iterations": self.reasoning.max_iterations,
                "observation_max_chars": self.reasoning.observation_max_chars,
                "observation_list_preview": self.reasoning.observation_list_preview,
                "planning_retries": self.reasoning.planning_retries,
                "iteration_timeout_ms": ms(self.reasoning.iteration_timeout),
                "model_timeout_ms": ms(self.reasoning.model_timeout),
                "skill_timeout_ms": ms(self.reasoning.skill_timeout),
                "skill_domain": self.reasoning.skill_domain,
            },
        })
    }
}

impl EngineConfig {
    /// Apply a mode's overrides to the base values and validate the result.
    ///
    /// User-defined modes take precedence over built-ins of the same name.
    pub fn resolve(&self, mode: &str) -> Result<ResolvedConfig, ConfigError> {
        let overrides = self
            .modes
            .get(mode)
            .cloned()
            .or_else(|| builtin_mode(mode))
            .ok_or_else(|| ConfigError::UnknownMode(mode.to_string()))?;

        let p = &self.pipeline;
        let v = &self.validation;
        let r = &self.reasoning;

        let stage_timeout_ms = overrides.stage_timeout_ms.unwrap_or(p.stage_timeout_ms);
        let pipeline_timeout_ms = overrides.pipeline_timeout_ms.or(p.pipeline_timeout_ms);
        let thresholds = overrides
            .thresholds
            .map(|t| t.apply(v.thresholds))
            .unwrap_or(v.thresholds);
        let max_iterations = overrides.max_iterations.unwrap_or(r.max_iterations);
        let observation_max_chars = overrides
            .observation_max_chars
            .unwrap_or(r.observation_max_chars);

        for (name, value) in [
            ("safety", thresholds.safety),
            ("alignment", thresholds.alignment),
            ("consistency", thresholds.consistency),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "mode '{mode}': {name} threshold {value} is outside [0, 1]"
                )));
            }
        }

        for (name, value) in [
            ("stage_timeout_ms", Some(stage_timeout_ms)),
            ("pipeline_timeout_ms", pipeline_timeout_ms),
            ("validator_timeout_ms", Some(v.validator_timeout_ms)),
            ("refinement_timeout_ms", Some(v.refinement_timeout_ms)),
            ("iteration_timeout_ms", Some(r.iteration_timeout_ms)),
            ("model_timeout_ms", Some(r.model_timeout_ms)),
            ("skill_timeout_ms", Some(r.skill_timeout_ms)),
        ] {
            if value == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "mode '{mode}': {name} must be greater than zero"
                )));
            }
        }

        if !(1..=100).contains(&max_iterations) {
            return Err(ConfigError::ValidationError(format!(
                "mode '{mode}': max_iterations must be between 1 and 100, got {max_iterations}"
            )));
        }

        if observation_max_chars < 32 {
            return Err(ConfigError::ValidationError(format!(
                "mode '{mode}': observation_max_chars must be at least 32, got {observation_max_chars}"
            )));
        }

        let disabled_stages = overrides
            .disabled_stages
            .unwrap_or_else(|| p.disabled_stages.clone())
            .into_iter()
            .collect();

        Ok(ResolvedConfig {
            mode: mode.to_string(),
            persona: self.persona.clone(),
            pipeline: PipelineSettings {
                error_policy: overrides.error_policy.unwrap_or(p.error_policy),
                stage_timeout: Duration::from_millis(stage_timeout_ms),
                pipeline_timeout: pipeline_timeout_ms.map(Duration::from_millis),
                disabled_stages,
            },
            validation: ValidationSettings {
                level: overrides.validation_level.unwrap_or(v.level),
                thresholds,
                refinement_enabled: overrides.refinement_enabled.unwrap_or(v.refinement_enabled),
                allow_unsafe: overrides.allow_unsafe.unwrap_or(v.allow_unsafe),
                surface_refined: overrides.surface_refined.unwrap_or(v.surface_refined),
                validator_timeout: Duration::from_millis(v.validator_timeout_ms),
                refinement_timeout: Duration::from_millis(v.refinement_timeout_ms),
            },
            reasoning: ReasoningSettings {
                max_iterations,
                observation_max_chars,
                observation_list_preview: r.observation_list_preview,
                planning_retries: r.planning_retries,
                iteration_timeout: Duration::from_millis(r.iteration_timeout_ms),
                model_timeout: Duration::from_millis(r.model_timeout_ms),
                skill_timeout: Duration::from_millis(r.skill_timeout_ms),
                skill_domain: r.skill_domain.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_modes_resolve() {
        let config = EngineConfig::default();
        for mode in BUILTIN_MODES {
            let resolved = config.resolve(mode).unwrap();
            assert_eq!(resolved.mode, mode);
        }
    }

    #[test]
    fn lightweight_disables_context_and_uses_quick_validation() {
        let resolved = EngineConfig::default().resolve("lightweight").unwrap();
        assert_eq!(resolved.validation.level, ValidationLevel::Quick);
        assert!(!resolved.pipeline.is_enabled("context"));
        assert!(resolved.pipeline.is_enabled("generation"));
    }

    #[test]
    fn agent_mode_raises_iteration_budget() {
        let resolved = EngineConfig::default().resolve("agent").unwrap();
        assert_eq!(resolved.reasoning.max_iterations, 15);
        assert_eq!(resolved.validation.level, ValidationLevel::Full);
    }

    #[test]
    fn emulation_skips_validation() {
        let resolved = EngineConfig::default().resolve("emulation").unwrap();
        assert_eq!(resolved.validation.level, ValidationLevel::None);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = EngineConfig::default().resolve("turbo").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMode(_)));
    }

    #[test]
    fn user_mode_overrides_builtin_of_same_name() {
        let mut config = EngineConfig::default();
        config.modes.insert(
            "agent".into(),
            ModeOverrides {
                max_iterations: Some(3),
                ..Default::default()
            },
        );
        let resolved = config.resolve("agent").unwrap();
        assert_eq!(resolved.reasoning.max_iterations, 3);
    }

    #[test]
    fn partial_threshold_override_keeps_other_values() {
        let mut config = EngineConfig::default();
        config.modes.insert(
            "strict".into(),
            ModeOverrides {
                thresholds: Some(ThresholdOverrides {
                    safety: Some(0.95),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let resolved = config.resolve("strict").unwrap();
        assert_eq!(resolved.validation.thresholds.safety, 0.95);
        assert_eq!(resolved.validation.thresholds.consistency, 0.6);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = EngineConfig::default();
        config.modes.insert(
            "broken".into(),
            ModeOverrides {
                stage_timeout_ms: Some(0),
                ..Default::default()
            },
        );
        assert!(matches!(
            config.resolve("broken"),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn iteration_budget_is_bounded() {
        let mut config = EngineConfig::default();
        config.reasoning.max_iterations = 0;
        assert!(config.resolve("standard").is_err());
        config.reasoning.max_iterations = 101;
        assert!(config.resolve("standard").is_err());
    }

    #[test]
    fn tiny_observation_cap_is_rejected() {
        let mut config = EngineConfig::default();
        config.reasoning.observation_max_chars = 8;
        assert!(config.resolve("standard").is_err());
    }

    #[test]
    fn defaults_match_base_config() {
        let resolved = EngineConfig::default().resolve("standard").unwrap();
        assert_eq!(resolved.pipeline, PipelineSettings::default());
        assert_eq!(resolved.validation, ValidationSettings::default());
        assert_eq!(resolved.reasoning, ReasoningSettings::default());
    }

    #[test]
    fn snapshot_reports_durations_in_millis() {
        let snapshot = EngineConfig::default().resolve("lightweight").unwrap().snapshot();
        assert_eq!(snapshot["mode"], "lightweight");
        assert_eq!(snapshot["validation"]["level"], "quick");
        assert_eq!(snapshot["pipeline"]["disabled_stages"], serde_json::json!(["context"]));
        assert!(snapshot["reasoning"]["model_timeout_ms"].as_u64().unwrap() > 0);
    }
}
