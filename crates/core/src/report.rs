//! Validation and refinement data model.
//!
//! Validators produce [`ValidationIssue`]s; the validator set folds them
//! into a [`ValidationReport`]; refinement consumes the report and produces
//! at most one [`RefinementResult`] per response. None of these values are
//! mutated after construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Issue severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Score penalty contributed by one issue of this severity.
    pub fn weight(self) -> f64 {
        match self {
            Self::Low => 0.05,
            Self::Medium => 0.15,
            Self::High => 0.35,
            Self::Critical => 0.6,
        }
    }

    /// Lenient parse used for model-produced severities.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" | "major" => Some(Self::High),
            "critical" | "severe" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// The validation axes. Declaration order is refinement priority:
/// safety first, then alignment, then consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    Safety,
    Alignment,
    Consistency,
}

impl ValidatorKind {
    pub const ALL: [ValidatorKind; 3] = [Self::Safety, Self::Alignment, Self::Consistency];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safety => "safety",
            Self::Alignment => "alignment",
            Self::Consistency => "consistency",
        }
    }
}

impl std::fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single problem found in a candidate response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Which validator raised it
    pub validator: ValidatorKind,

    pub severity: Severity,

    /// Issue type within the axis (e.g., "sensitive_data", "honesty", "tone")
    pub category: String,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// The offending excerpt, when one can be pointed at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// A bounded score estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    /// Build a range, clamping to [0, 1] and ordering the bounds.
    pub fn new(a: f64, b: f64) -> Self {
        let (a, b) = (a.clamp(0.0, 1.0), b.clamp(0.0, 1.0));
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// One validator's verdict inside a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorOutcome {
    /// Score in [0, 1]
    pub score: f64,

    /// Range estimate, for validators that produce one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_range: Option<ScoreRange>,

    pub threshold: f64,

    /// `score >= threshold`
    pub passed: bool,

    /// Issues in the order the validator raised them
    pub issues: Vec<ValidationIssue>,

    /// Set when the validator could not run and was scored failed-closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidatorOutcome {
    pub fn scored(score: f64, threshold: f64, issues: Vec<ValidationIssue>) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            score,
            score_range: None,
            threshold,
            passed: score >= threshold,
            issues,
            error: None,
        }
    }

    pub fn with_range(mut self, range: ScoreRange) -> Self {
        self.score_range = Some(range);
        self
    }

    /// Outcome for a validator that could not run.
    pub fn failed_closed(kind: ValidatorKind, threshold: f64, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            score: 0.0,
            score_range: None,
            threshold,
            passed: false,
            issues: vec![ValidationIssue {
                validator: kind,
                severity: Severity::High,
                category: "validator_unavailable".into(),
                description: format!("{kind} validator could not run: {reason}"),
                suggestion: None,
                evidence: None,
            }],
            error: Some(reason),
        }
    }
}

/// The joined verdict of every validator that ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub per_validator: BTreeMap<ValidatorKind, ValidatorOutcome>,

    /// True iff every validator that ran passed its threshold
    pub overall_passed: bool,
}

impl ValidationReport {
    pub fn from_outcomes(per_validator: BTreeMap<ValidatorKind, ValidatorOutcome>) -> Self {
        let overall_passed = per_validator.values().all(|o| o.passed);
        Self {
            per_validator,
            overall_passed,
        }
    }

    /// Report for a response that was not validated at all.
    pub fn passthrough() -> Self {
        Self::from_outcomes(BTreeMap::new())
    }

    pub fn outcome(&self, kind: ValidatorKind) -> Option<&ValidatorOutcome> {
        self.per_validator.get(&kind)
    }

    /// Whether `kind` ran and failed.
    pub fn failed(&self, kind: ValidatorKind) -> bool {
        self.outcome(kind).is_some_and(|o| !o.passed)
    }

    pub fn issues_for(&self, kind: ValidatorKind) -> &[ValidationIssue] {
        self.outcome(kind).map(|o| o.issues.as_slice()).unwrap_or(&[])
    }

    /// All issues, in refinement priority order.
    pub fn all_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.per_validator.values().flat_map(|o| o.issues.iter())
    }

    pub fn failed_validators(&self) -> Vec<ValidatorKind> {
        self.per_validator
            .iter()
            .filter(|(_, o)| !o.passed)
            .map(|(k, _)| *k)
            .collect()
    }
}

/// Points at one issue inside a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub validator: ValidatorKind,
    /// Index into that validator's issue list
    pub index: usize,
}

/// One recorded edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedChange {
    /// The validator whose failure drove this edit
    pub driver: ValidatorKind,

    /// The issues the edit addresses
    pub issue_refs: Vec<IssueRef>,

    pub before: String,
    pub after: String,
}

/// The outcome of the single refinement pass over a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementResult {
    pub original_text: String,
    pub refined_text: String,
    pub changed: bool,

    /// Edits in the order they were applied
    pub applied_changes: Vec<AppliedChange>,

    /// Set when the generative rewrite failed and sanitized text was kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}
