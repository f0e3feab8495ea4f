//! Reflector — is the goal satisfied yet?

use crate::trace::ReasoningTrace;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use stratum_core::{
    CallOptions, Message, ModelCaller, ModelRole, ReasoningError, call_with_timeout,
    parse_embedded,
};
use tracing::warn;

const INSTRUCTIONS: &str = "You judge whether a goal has been satisfied by the observations in a \
reasoning trace. Only observations count: a plan or an intention is not a result. \
Reply with JSON only: {\"complete\": true|false, \"reason\": \"...\"}";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reflection {
    pub complete: bool,
    #[serde(default)]
    pub reason: String,
}

pub struct Reflector {
    caller: Arc<dyn ModelCaller>,
    timeout: Duration,
}

impl Reflector {
    pub fn new(caller: Arc<dyn ModelCaller>, timeout: Duration) -> Self {
        Self { caller, timeout }
    }

    /// Reflect over the full trace. A reply that cannot be parsed counts as
    /// "not complete" so the loop keeps planning.
    pub async fn reflect(&self, trace: &ReasoningTrace) -> Result<Reflection, ReasoningError> {
        let messages = vec![
            Message::system(INSTRUCTIONS),
            Message::user(format!(
                "## Goal\n{}\n\n## Reasoning Trace\n{}",
                trace.goal,
                trace.render()
            )),
        ];
        let reply = call_with_timeout(
            self.caller.as_ref(),
            &ModelRole::Planner,
            messages,
            &CallOptions::json(),
            self.timeout,
        )
        .await?;

        Ok(parse_embedded::<Reflection>(&reply.content).unwrap_or_else(|e| {
            warn!(error = %e, "Reflection unparseable, treating goal as incomplete");
            Reflection {
                complete: false,
                reason: format!("reflection unparseable: {e}"),
            }
        }))
    }
}
