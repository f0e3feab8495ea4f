//! Reasoning trace — the ordered, append-only history of one loop run.
//!
//! Every planning, reflection and synthesis call sees the whole trace, not
//! just the last step, so later steps can cite earlier observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Data Structures ───────────────────────────────────────────────────────

/// One think–act–observe cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 1-based
    pub iteration: u32,
    pub thought: String,
    pub action: String,
    pub action_input: serde_json::Value,

    /// Bounded, human-readable summary of the tool result
    pub observation: String,

    /// What the skill actually returned, when it returned data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_tool_result: Option<serde_json::Value>,

    pub success: bool,

    /// Concrete values in `action_input` that no earlier observation or the
    /// goal contains
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ungrounded_inputs: Vec<String>,

    pub timestamp: DateTime<Utc>,
}

/// The trace of one loop invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub goal: String,
    pub steps: Vec<ReasoningStep>,
    /// The reflector judged the goal satisfied. Synthesis can still fail
    /// afterwards, so this does not mean the loop succeeded.
    pub completed: bool,
    pub iterations_used: u32,
    pub max_iterations: u32,
}

/// Returned when a step would push the trace past its iteration budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceFull {
    pub max_iterations: u32,
}

// ── Implementation ────────────────────────────────────────────────────────

impl ReasoningTrace {
    pub fn new(goal: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            goal: goal.into(),
            steps: Vec::new(),
            completed: false,
            iterations_used: 0,
            max_iterations,
        }
    }

    /// Append a step. Refuses to grow beyond `max_iterations`.
    pub fn push(&mut self, step: ReasoningStep) -> Result<(), TraceFull> {
        if self.steps.len() as u32 >= self.max_iterations {
            return Err(TraceFull {
                max_iterations: self.max_iterations,
            });
        }
        self.iterations_used = self.iterations_used.max(step.iteration);
        self.steps.push(step);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn last(&self) -> Option<&ReasoningStep> {
        self.steps.last()
    }

    /// Every observation, in order.
    pub fn observations(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.observation.as_str())
    }

    /// The text a cited fact may legitimately come from: the goal plus
    /// every observation and raw tool result so far.
    pub fn evidence_corpus(&self) -> String {
        let mut corpus = self.goal.clone();
        for step in &self.steps {
            corpus.push('\n');
            corpus.push_str(&step.observation);
            if let Some(raw) = &step.raw_tool_result {
                corpus.push('\n');
                corpus.push_str(&raw.to_string());
            }
        }
        corpus
    }

    // ── Rendering ──

    /// Render the trace for a planning, reflection or synthesis prompt.
    pub fn render(&self) -> String {
        if self.steps.is_empty() {
            return "No steps taken yet.\n".into();
        }

        let mut out = String::new();
        for step in &self.steps {
            let status = if step.success { "✓" } else { "✗" };
            out.push_str(&format!("### Step {}\n", step.iteration));
            out.push_str(&format!("Thought: {}\n", step.thought));
            out.push_str(&format!("Action: {} {}\n", step.action, step.action_input));
            out.push_str(&format!("Observation [{}]: {}\n\n", status, step.observation));
        }
        out
    }

    /// One-line summary for logs and audit records.
    pub fn summarize(&self) -> String {
        let failed = self.steps.iter().filter(|s| !s.success).count();
        format!(
            "{} steps ({} failed), {}/{} iterations, completed={}",
            self.steps.len(),
            failed,
            self.iterations_used,
            self.max_iterations,
            self.completed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(iteration: u32, observation: &str) -> ReasoningStep {
        ReasoningStep {
            iteration,
            thought: "look around".into(),
            action: "list_files".into(),
            action_input: serde_json::json!({"dir": "docs"}),
            observation: observation.into(),
            raw_tool_result: None,
            success: true,
            ungrounded_inputs: vec![],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn trace_never_exceeds_budget() {
        let mut trace = ReasoningTrace::new("goal", 2);
        assert!(trace.push(step(1, "one")).is_ok());
        assert!(trace.push(step(2, "two")).is_ok());
        assert_eq!(trace.push(step(3, "three")), Err(TraceFull { max_iterations: 2 }));
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.iterations_used, 2);
    }

    #[test]
    fn render_includes_every_observation() {
        let mut trace = ReasoningTrace::new("list docs", 5);
        trace.push(step(1, "2 items: a.md, b.md")).unwrap();
        let mut failed = step(2, "FAILED: permission denied");
        failed.success = false;
        trace.push(failed).unwrap();

        let rendered = trace.render();
        assert!(rendered.contains("### Step 1"));
        assert!(rendered.contains("a.md, b.md"));
        assert!(rendered.contains("Observation [✗]: FAILED: permission denied"));
        assert!(rendered.contains(r#"list_files {"dir":"docs"}"#));
    }

    #[test]
    fn empty_trace_renders_placeholder() {
        assert_eq!(ReasoningTrace::new("g", 3).render(), "No steps taken yet.\n");
    }

    #[test]
    fn corpus_contains_goal_and_raw_results() {
        let mut trace = ReasoningTrace::new("find the config", 3);
        let mut s = step(1, "1 item: app.toml");
        s.raw_tool_result = Some(serde_json::json!(["app.toml"]));
        trace.push(s).unwrap();
        let corpus = trace.evidence_corpus();
        assert!(corpus.starts_with("find the config"));
        assert!(corpus.contains(r#"["app.toml"]"#));
    }

    #[test]
    fn trace_serialization_roundtrip() {
        let mut trace = ReasoningTrace::new("g", 3);
        trace.push(step(1, "obs")).unwrap();
        let json = serde_json::to_string(&trace).unwrap();
        let parsed: ReasoningTrace = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, trace);
    }
}
