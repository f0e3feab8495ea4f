//! The validator abstraction.

use async_trait::async_trait;
use stratum_core::{ModelError, ScoreRange, ValidationIssue, ValidatorKind};

/// Why a validator produced no assessment. The validator set scores these
/// failed-closed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidatorError {
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    #[error("unusable validator output: {0}")]
    InvalidOutput(String),
}

/// What one validator concluded about a candidate response.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Score in [0, 1]
    pub score: f64,
    pub score_range: Option<ScoreRange>,
    pub issues: Vec<ValidationIssue>,
}

impl Assessment {
    pub fn new(score: f64, issues: Vec<ValidationIssue>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            score_range: None,
            issues,
        }
    }

    /// Score a range by its lower bound.
    pub fn from_range(range: ScoreRange, issues: Vec<ValidationIssue>) -> Self {
        Self {
            score: range.min,
            score_range: Some(range),
            issues,
        }
    }

    /// `1 - Σ severity weights`, clamped to [0, 1].
    pub fn from_weighted_issues(issues: Vec<ValidationIssue>) -> Self {
        let penalty: f64 = issues.iter().map(|i| i.severity.weight()).sum();
        Self::new(1.0 - penalty, issues)
    }
}

/// One independent check along a single axis.
#[async_trait]
pub trait Validator: Send + Sync {
    fn kind(&self) -> ValidatorKind;

    /// Short implementation name used in logs and audit records.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Assess `response`; `prompt` is the user message it answers, when known.
    async fn validate(&self, response: &str, prompt: Option<&str>)
    -> Result<Assessment, ValidatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::Severity;

    fn issue(severity: Severity) -> ValidationIssue {
        ValidationIssue {
            validator: ValidatorKind::Safety,
            severity,
            category: "sensitive_data".into(),
            description: "x".into(),
            suggestion: None,
            evidence: None,
        }
    }

    #[test]
    fn weighted_score_clamps_at_zero() {
        let a = Assessment::from_weighted_issues(vec![issue(Severity::Critical), issue(Severity::Critical)]);
        assert_eq!(a.score, 0.0);
        let b = Assessment::from_weighted_issues(vec![issue(Severity::Medium)]);
        assert!((b.score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn range_scores_by_lower_bound() {
        let a = Assessment::from_range(ScoreRange::new(0.9, 0.5), vec![]);
        assert_eq!(a.score, 0.5);
    }
}
