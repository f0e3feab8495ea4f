//! Consistency validators — does the response sound like the persona?
//!
//! [`ConsistencyValidator`] asks the curator model for a score range against
//! the persona profile and reference facts. [`HeuristicConsistencyValidator`]
//! is the cheap deterministic variant used at the `quick` level.

use crate::validator::{Assessment, Validator, ValidatorError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use stratum_core::{
    CallOptions, Message, ModelCaller, ModelRole, Persona, ScoreRange, Severity, ValidationIssue,
    ValidatorKind, call_with_timeout, parse_embedded,
};

const INSTRUCTIONS: &str = "You check whether an assistant's response is consistent with its persona: \
identity, tone, style, voice, and the reference facts. \
Give a score range from 0 (inconsistent) to 1 (fully consistent). \
Respond with JSON only, in this shape:\n\
{\"score_min\": 0.0, \"score_max\": 1.0, \"issues\": [{\"aspect\": \"identity|tone|style|voice|facts\", \
\"severity\": \"low|medium|high|critical\", \"description\": \"...\", \"suggestion\": \"...\"}]}";

#[derive(Debug, Deserialize)]
struct ConsistencyVerdict {
    #[serde(default)]
    score_min: Option<f64>,
    #[serde(default)]
    score_max: Option<f64>,
    /// Some models answer with a point estimate
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(default)]
    aspect: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    suggestion: Option<String>,
}

impl ConsistencyVerdict {
    fn range(&self) -> Option<ScoreRange> {
        match (self.score_min, self.score_max, self.score) {
            (Some(min), Some(max), _) => Some(ScoreRange::new(min, max)),
            (Some(bound), None, _) | (None, Some(bound), _) | (None, None, Some(bound)) => {
                Some(ScoreRange::new(bound, bound))
            }
            (None, None, None) => None,
        }
    }
}

pub struct ConsistencyValidator {
    caller: Arc<dyn ModelCaller>,
    persona: Persona,
    timeout: Duration,
}

impl ConsistencyValidator {
    pub fn new(caller: Arc<dyn ModelCaller>, persona: Persona, timeout: Duration) -> Self {
        Self {
            caller,
            persona,
            timeout,
        }
    }

    fn build_messages(&self, response: &str, prompt: Option<&str>) -> Vec<Message> {
        let mut review = format!("## Persona profile\n{}\n\n", self.persona.render_profile());
        if !self.persona.reference_facts.is_empty() {
            review.push_str("## Reference facts\n");
            for fact in &self.persona.reference_facts {
                review.push_str(&format!("- {fact}\n"));
            }
            review.push('\n');
        }
        if let Some(prompt) = prompt {
            review.push_str(&format!("## User message\n{prompt}\n\n"));
        }
        review.push_str(&format!("## Response\n{response}"));
        vec![Message::system(INSTRUCTIONS), Message::user(review)]
    }
}

#[async_trait]
impl Validator for ConsistencyValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Consistency
    }

    async fn validate(&self, response: &str, prompt: Option<&str>) -> Result<Assessment, ValidatorError> {
        let reply = call_with_timeout(
            self.caller.as_ref(),
            &ModelRole::Curator,
            self.build_messages(response, prompt),
            &CallOptions::json(),
            self.timeout,
        )
        .await?;

        let verdict: ConsistencyVerdict =
            parse_embedded(&reply.content).map_err(ValidatorError::InvalidOutput)?;
        let range = verdict
            .range()
            .ok_or_else(|| ValidatorError::InvalidOutput("no score in consistency verdict".into()))?;

        let issues = verdict
            .issues
            .into_iter()
            .filter(|i| !i.description.trim().is_empty())
            .map(|i| ValidationIssue {
                validator: ValidatorKind::Consistency,
                severity: i
                    .severity
                    .as_deref()
                    .and_then(Severity::parse)
                    .unwrap_or(Severity::Low),
                category: i.aspect.unwrap_or_else(|| "persona".into()),
                description: i.description,
                suggestion: i.suggestion,
                evidence: None,
            })
            .collect();

        Ok(Assessment::from_range(range, issues))
    }
}

/// Phrases that break character for a named persona.
const PERSONA_BREAKS: &[&str] = &[
    "as an ai language model",
    "as a large language model",
    "i am just an ai",
    "i'm just an ai",
    "i don't have a name",
    "i do not have a name",
];

const MAX_REASONABLE_CHARS: usize = 6_000;

/// Deterministic persona checks, no model call.
pub struct HeuristicConsistencyValidator {
    persona: Persona,
}

impl HeuristicConsistencyValidator {
    pub fn new(persona: Persona) -> Self {
        Self { persona }
    }

    pub fn assess(&self, response: &str) -> Assessment {
        let mut issues = Vec::new();
        let mut push = |severity: Severity, category: &str, description: String, suggestion: &str| {
            issues.push(ValidationIssue {
                validator: ValidatorKind::Consistency,
                severity,
                category: category.into(),
                description,
                suggestion: Some(suggestion.into()),
                evidence: None,
            });
        };

        let trimmed = response.trim();
        if trimmed.is_empty() {
            push(
                Severity::Critical,
                "empty",
                "Response is empty".into(),
                "Answer the user's message",
            );
            return Assessment::from_weighted_issues(issues);
        }

        let lower = trimmed.to_lowercase();
        if let Some(phrase) = PERSONA_BREAKS.iter().find(|p| lower.contains(*p)) {
            push(
                Severity::High,
                "identity",
                format!("Response breaks persona with \"{phrase}\""),
                "Speak as the persona instead of as a generic model",
            );
        }

        if let Some(claimed) = claimed_name(trimmed) {
            if !claimed.eq_ignore_ascii_case(&self.persona.name) {
                push(
                    Severity::High,
                    "identity",
                    format!("Response claims the name '{claimed}' instead of '{}'", self.persona.name),
                    "Use the persona's own name",
                );
            }
        }

        let mut seen = std::collections::HashMap::new();
        for line in trimmed.lines().map(str::trim).filter(|l| l.len() > 10) {
            *seen.entry(line).or_insert(0usize) += 1;
        }
        if seen.values().any(|&count| count >= 3) {
            push(
                Severity::Low,
                "style",
                "Response repeats the same line three or more times".into(),
                "Remove repeated lines",
            );
        }

        if trimmed.chars().count() > MAX_REASONABLE_CHARS {
            push(
                Severity::Low,
                "style",
                format!("Response is longer than {MAX_REASONABLE_CHARS} characters"),
                "Shorten the response",
            );
        }

        Assessment::from_weighted_issues(issues)
    }
}

/// The name in "my name is X" / "I am called X", if present.
fn claimed_name(text: &str) -> Option<&str> {
    // ASCII-only lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    for marker in ["my name is ", "i am called ", "i'm called "] {
        if let Some(pos) = lower.find(marker) {
            let rest = &text[pos + marker.len()..];
            let name = rest
                .split(|c: char| !c.is_alphanumeric() && c != '-')
                .next()
                .filter(|n| !n.is_empty())?;
            return Some(name);
        }
    }
    None
}

#[async_trait]
impl Validator for HeuristicConsistencyValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Consistency
    }

    fn name(&self) -> &str {
        "consistency_heuristic"
    }

    async fn validate(&self, response: &str, _prompt: Option<&str>) -> Result<Assessment, ValidatorError> {
        Ok(self.assess(response))
    }
}
