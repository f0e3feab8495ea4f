//! Planner — asks the planner role for exactly one next step.

use crate::trace::ReasoningTrace;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use stratum_core::{
    CallOptions, Message, ModelCaller, ModelRole, ReasoningError, SkillDescriptor,
    call_with_timeout, parse_embedded,
};
use tracing::{debug, warn};

/// Reserved action: the observations already satisfy the goal.
pub const FINISH_ACTION: &str = "finish";

const CORRECTION: &str = "Your previous reply was not valid. Reply with JSON only, exactly one object \
with the keys \"thought\", \"action\" and \"actionInput\". No prose, no code fences.";

/// One planned step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannedStep {
    #[serde(default)]
    pub thought: String,
    pub action: String,
    #[serde(default, rename = "actionInput", alias = "action_input")]
    pub action_input: serde_json::Value,
}

impl PlannedStep {
    pub fn is_finish(&self) -> bool {
        self.action.eq_ignore_ascii_case(FINISH_ACTION)
    }
}

pub struct Planner {
    caller: Arc<dyn ModelCaller>,
    timeout: Duration,
    retries: u32,
}

impl Planner {
    pub fn new(caller: Arc<dyn ModelCaller>, timeout: Duration, retries: u32) -> Self {
        Self {
            caller,
            timeout,
            retries,
        }
    }

    /// The planning prompt for `trace` and the current action menu.
    pub fn build_messages(&self, trace: &ReasoningTrace, menu: &[SkillDescriptor]) -> Vec<Message> {
        let mut system = String::from(
            "You are the planner of a reasoning loop. Choose exactly ONE next step toward the goal.\n\n\
             ## Available actions\n",
        );
        for skill in menu {
            system.push_str(&format!(
                "- {}: {} Input schema: {}\n",
                skill.name, skill.description, skill.input_schema
            ));
        }
        system.push_str(&format!(
            "- {FINISH_ACTION}: The observations already satisfy the goal. Input: {{}}\n\n"
        ));
        system.push_str(
            "## Rules\n\
             - Never invent data. Every file name, number or fact you use must appear in the goal \
             or in an observation below.\n\
             - If a step failed, change strategy instead of repeating it.\n\
             - Reply with JSON only: {\"thought\": \"...\", \"action\": \"...\", \"actionInput\": {...}}\n",
        );

        let user = format!(
            "## Goal\n{}\n\n## Reasoning Trace\n{}\nWhat is the single next step?",
            trace.goal,
            trace.render()
        );
        vec![Message::system(system), Message::user(user)]
    }

    /// Plan the next step. An unparseable reply is retried with an explicit
    /// JSON-only correction, `retries` times at most.
    pub async fn plan(
        &self,
        trace: &ReasoningTrace,
        menu: &[SkillDescriptor],
    ) -> Result<PlannedStep, ReasoningError> {
        let mut messages = self.build_messages(trace, menu);
        let attempts = self.retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let reply = call_with_timeout(
                self.caller.as_ref(),
                &ModelRole::Planner,
                messages.clone(),
                &CallOptions::json(),
                self.timeout,
            )
            .await?;

            match parse_step(&reply.content) {
                Ok(step) => {
                    debug!(attempt, action = %step.action, "Planned step");
                    return Ok(step);
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Planner output unparseable");
                    last_error = e;
                    messages.push(Message::assistant(reply.content));
                    messages.push(Message::user(CORRECTION));
                }
            }
        }

        Err(ReasoningError::PlanningParse {
            attempts,
            detail: last_error,
        })
    }
}

fn parse_step(text: &str) -> Result<PlannedStep, String> {
    let step: PlannedStep = parse_embedded(text)?;
    if step.action.trim().is_empty() {
        return Err("planned step has an empty action".into());
    }
    Ok(PlannedStep {
        action: step.action.trim().to_string(),
        ..step
    })
}
