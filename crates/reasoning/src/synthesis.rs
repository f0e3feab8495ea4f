//! Synthesis — one summarizer call over the goal and the whole trace.

use crate::trace::ReasoningTrace;
use std::sync::Arc;
use std::time::Duration;
use stratum_core::{CallOptions, Message, ModelCaller, ModelRole, ReasoningError, call_with_timeout};

const INSTRUCTIONS: &str = "Write the final answer to the goal using the observations in the \
reasoning trace. Use the full history, not just the last step. \
Only state facts that appear in an observation or in the goal. Do not invent file names, \
numbers, or values. If the observations are insufficient, say what is missing.";

pub struct Synthesizer {
    caller: Arc<dyn ModelCaller>,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(caller: Arc<dyn ModelCaller>, timeout: Duration) -> Self {
        Self { caller, timeout }
    }

    pub async fn synthesize(&self, trace: &ReasoningTrace) -> Result<String, ReasoningError> {
        let mut history = String::new();
        for step in &trace.steps {
            history.push_str(&format!("- Step {} ({}): {}\n", step.iteration, step.action, step.observation));
        }
        let messages = vec![
            Message::system(INSTRUCTIONS),
            Message::user(format!(
                "## Goal\n{}\n\n## Reasoning Trace\n{}\n## Observations\n{}",
                trace.goal,
                trace.render(),
                history
            )),
        ];
        let reply = call_with_timeout(
            self.caller.as_ref(),
            &ModelRole::Summarizer,
            messages,
            &CallOptions::default().with_temperature(0.2),
            self.timeout,
        )
        .await?;

        let answer = reply.content.trim();
        if answer.is_empty() {
            return Err(ReasoningError::Model("synthesis returned an empty answer".into()));
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::ReasoningStep;
    use chrono::Utc;

    use stratum_core::test_helpers::ScriptedModelCaller;

    fn trace() -> ReasoningTrace {
        let mut trace = ReasoningTrace::new("list docs", 5);
        for (i, obs) in ["FAILED: no such dir", "2 items: a.md, b.md"].iter().enumerate() {
            trace
                .push(ReasoningStep {
                    iteration: i as u32 + 1,
                    thought: String::new(),
                    action: "list_files".into(),
                    action_input: serde_json::json!({}),
                    observation: obs.to_string(),
                    raw_tool_result: None,
                    success: i == 1,
                    ungrounded_inputs: vec![],
                    timestamp: Utc::now(),
                })
                .unwrap();
        }
        trace
    }

    #[tokio::test]
    async fn prompt_carries_every_observation() {
        let caller = Arc::new(ScriptedModelCaller::new().respond(ModelRole::Summarizer, "  docs has a.md and b.md.  "));
        let answer = Synthesizer::new(caller.clone(), Duration::from_secs(1))
            .synthesize(&trace())
            .await
            .unwrap();
        assert_eq!(answer, "docs has a.md and b.md.");

        let prompt = &caller.calls_for(&ModelRole::Summarizer)[0][1].content;
        assert!(prompt.contains("- Step 1 (list_files): FAILED: no such dir"));
        assert!(prompt.contains("- Step 2 (list_files): 2 items: a.md, b.md"));
    }

    #[tokio::test]
    async fn empty_answer_is_an_error() {
        let caller = Arc::new(ScriptedModelCaller::new().respond(ModelRole::Summarizer, "   "));
        let err = Synthesizer::new(caller, Duration::from_secs(1))
            .synthesize(&trace())
            .await
            .unwrap_err();
        assert!(matches!(err, ReasoningError::Model(_)));
    }
}
