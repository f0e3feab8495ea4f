//! Configuration loading, validation, and mode resolution for Stratum.
//!
//! Loads configuration from `~/.stratum/config.toml` with environment
//! variable overrides. The file is a flat [`EngineConfig`]; per-mode
//! overrides are folded in exactly once by [`EngineConfig::resolve`], which
//! returns an immutable [`ResolvedConfig`] snapshot. Stages and loops are
//! built from the snapshot and never look configuration up at call time.

mod resolved;

pub use resolved::{
    ModeOverrides, PipelineSettings, ReasoningSettings, ResolvedConfig, ThresholdOverrides,
    ValidationSettings, builtin_mode, BUILTIN_MODES,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use stratum_core::Persona;

/// The root configuration structure.
///
/// Maps directly to `~/.stratum/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Mode used when the caller does not name one
    #[serde(default = "default_mode")]
    pub default_mode: String,

    /// Who the agent is; feeds generation, alignment and consistency
    #[serde(default)]
    pub persona: Persona,

    /// Pipeline executor settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Meta-cognition settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// ReAct loop settings
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Per-mode overrides, keyed by mode name
    #[serde(default)]
    pub modes: HashMap<String, ModeOverrides>,
}

fn default_mode() -> String {
    "standard".into()
}

/// What the executor does after a stage fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Abort the remaining stages.
    #[default]
    FailFast,
    /// Record the failure and pass the pre-failure output forward.
    ContinueOnError,
}

/// Which validators the meta-cognition stage runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    /// Safety, alignment and consistency.
    #[default]
    Full,
    /// Safety only.
    #[serde(alias = "safety-only")]
    SafetyOnly,
    /// Cheap deterministic checks only.
    Quick,
    /// Pass-through.
    None,
}

impl std::str::FromStr for ValidationLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "full" => Ok(Self::Full),
            "safety_only" => Ok(Self::SafetyOnly),
            "quick" => Ok(Self::Quick),
            "none" => Ok(Self::None),
            other => Err(ConfigError::ValidationError(format!(
                "unknown validation level '{other}' (expected full, safety_only, quick or none)"
            ))),
        }
    }
}

/// Pass thresholds per validator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_safety_threshold")]
    pub safety: f64,

    #[serde(default = "default_alignment_threshold")]
    pub alignment: f64,

    #[serde(default = "default_consistency_threshold")]
    pub consistency: f64,
}

fn default_safety_threshold() -> f64 {
    0.7
}
fn default_alignment_threshold() -> f64 {
    0.7
}
fn default_consistency_threshold() -> f64 {
    0.6
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            safety: default_safety_threshold(),
            alignment: default_alignment_threshold(),
            consistency: default_consistency_threshold(),
        }
    }
}

impl Thresholds {
    pub fn for_kind(&self, kind: stratum_core::ValidatorKind) -> f64 {
        match kind {
            stratum_core::ValidatorKind::Safety => self.safety,
            stratum_core::ValidatorKind::Alignment => self.alignment,
            stratum_core::ValidatorKind::Consistency => self.consistency,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub error_policy: ErrorPolicy,

    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,

    /// Deadline for the whole run; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_timeout_ms: Option<u64>,

    /// Stages skipped as pure pass-through
    #[serde(default)]
    pub disabled_stages: Vec<String>,
}

fn default_stage_timeout_ms() -> u64 {
    60_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            stage_timeout_ms: default_stage_timeout_ms(),
            pipeline_timeout_ms: None,
            disabled_stages: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub level: ValidationLevel,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default = "default_true")]
    pub refinement_enabled: bool,

    /// Skip refinement and blocking entirely
    #[serde(default)]
    pub allow_unsafe: bool,

    /// Surface refined text downstream (original text otherwise)
    #[serde(default = "default_true")]
    pub surface_refined: bool,

    #[serde(default = "default_validator_timeout_ms")]
    pub validator_timeout_ms: u64,

    #[serde(default = "default_refinement_timeout_ms")]
    pub refinement_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_validator_timeout_ms() -> u64 {
    30_000
}
fn default_refinement_timeout_ms() -> u64 {
    45_000
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            level: ValidationLevel::default(),
            thresholds: Thresholds::default(),
            refinement_enabled: true,
            allow_unsafe: false,
            surface_refined: true,
            validator_timeout_ms: default_validator_timeout_ms(),
            refinement_timeout_ms: default_refinement_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Cap on a single observation summary, in characters
    #[serde(default = "default_observation_max_chars")]
    pub observation_max_chars: usize,

    /// How many list entries an observation names before eliding
    #[serde(default = "default_observation_list_preview")]
    pub observation_list_preview: usize,

    /// Extra planning attempts after an unparseable plan
    #[serde(default = "default_planning_retries")]
    pub planning_retries: u32,

    #[serde(default = "default_iteration_timeout_ms")]
    pub iteration_timeout_ms: u64,

    #[serde(default = "default_model_timeout_ms")]
    pub model_timeout_ms: u64,

    #[serde(default = "default_skill_timeout_ms")]
    pub skill_timeout_ms: u64,

    /// Restrict the action menu to one skill domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_domain: Option<String>,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_observation_max_chars() -> usize {
    500
}
fn default_observation_list_preview() -> usize {
    10
}
fn default_planning_retries() -> u32 {
    2
}
fn default_iteration_timeout_ms() -> u64 {
    120_000
}
fn default_model_timeout_ms() -> u64 {
    60_000
}
fn default_skill_timeout_ms() -> u64 {
    30_000
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            observation_max_chars: default_observation_max_chars(),
            observation_list_preview: default_observation_list_preview(),
            planning_retries: default_planning_retries(),
            iteration_timeout_ms: default_iteration_timeout_ms(),
            model_timeout_ms: default_model_timeout_ms(),
            skill_timeout_ms: default_skill_timeout_ms(),
            skill_domain: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            persona: Persona::default(),
            pipeline: PipelineConfig::default(),
            validation: ValidationConfig::default(),
            reasoning: ReasoningConfig::default(),
            modes: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default path (~/.stratum/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `STRATUM_MODE` — replaces `default_mode`
    /// - `STRATUM_VALIDATION_LEVEL` — replaces `validation.level`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(mode) = std::env::var("STRATUM_MODE") {
            config.default_mode = mode;
        }

        if let Ok(level) = std::env::var("STRATUM_VALIDATION_LEVEL") {
            config.validation.level = level.parse()?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stratum")
    }

    /// Resolve the default mode.
    pub fn resolve_default(&self) -> Result<ResolvedConfig, ConfigError> {
        self.resolve(&self.default_mode)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Validate the base configuration (every mode is validated on resolve).
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_mode.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_mode cannot be empty".into(),
            ));
        }
        self.resolve_default().map(|_| ())
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
///
/// These are the only errors the engine raises synchronously: they surface
/// while loading or resolving, before any stage or loop runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown mode '{0}'")]
    UnknownMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.default_mode, "standard");
        assert_eq!(config.pipeline.error_policy, ErrorPolicy::FailFast);
        assert_eq!(config.pipeline.stage_timeout_ms, 60_000);
        assert_eq!(config.reasoning.max_iterations, 10);
        assert_eq!(config.reasoning.observation_max_chars, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.safety, 0.7);
        assert_eq!(t.alignment, 0.7);
        assert_eq!(t.consistency, 0.6);
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = EngineConfig::default_toml();
        let parsed = EngineConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.default_mode, "standard");
        assert_eq!(parsed.validation.level, ValidationLevel::Full);
    }

    #[test]
    fn parse_modes_and_persona() {
        let config = EngineConfig::from_toml(
            r#"
default_mode = "night"

[persona]
name = "Ada"
tone = "calm"
core_values = ["honesty", "privacy"]

[validation]
level = "safety-only"

[modes.night]
validation_level = "quick"
max_iterations = 4
disabled_stages = ["context"]
"#,
        )
        .unwrap();
        assert_eq!(config.persona.name, "Ada");
        assert_eq!(config.persona.core_values.len(), 2);
        assert_eq!(config.validation.level, ValidationLevel::SafetyOnly);
        let night = &config.modes["night"];
        assert_eq!(night.validation_level, Some(ValidationLevel::Quick));
        assert_eq!(night.max_iterations, Some(4));
    }

    #[test]
    fn invalid_threshold_rejected() {
        let err = EngineConfig::from_toml(
            r#"
[validation.thresholds]
safety = 1.5
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unknown_default_mode_rejected() {
        let err = EngineConfig::from_toml(r#"default_mode = "warp""#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMode(ref m) if m == "warp"));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = EngineConfig::from_toml("default_mode = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = EngineConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_mode, "standard");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reasoning]\nmax_iterations = 3").unwrap();
        let config = EngineConfig::load_from(file.path()).unwrap();
        assert_eq!(config.reasoning.max_iterations, 3);
    }

    #[test]
    fn validation_level_from_str() {
        assert_eq!("safety-only".parse::<ValidationLevel>().unwrap(), ValidationLevel::SafetyOnly);
        assert_eq!("NONE".parse::<ValidationLevel>().unwrap(), ValidationLevel::None);
        assert!("strict".parse::<ValidationLevel>().is_err());
    }
}
