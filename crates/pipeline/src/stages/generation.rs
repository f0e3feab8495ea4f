//! Stage 2 — response generation under the persona role.

use crate::stage::{Stage, StageContext};
use crate::turn::Turn;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use stratum_core::{
    CallOptions, Message, ModelCaller, ModelRole, Persona, StageError, call_with_timeout,
};
use tracing::debug;

pub const GENERATION_STAGE: &str = "generation";

pub struct GenerationStage {
    caller: Arc<dyn ModelCaller>,
    persona: Persona,
    timeout: Duration,
    options: CallOptions,
}

impl GenerationStage {
    pub fn new(caller: Arc<dyn ModelCaller>, persona: Persona, timeout: Duration) -> Self {
        Self {
            caller,
            persona,
            timeout,
            options: CallOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    fn build_messages(&self, turn: &Turn) -> Vec<Message> {
        let mut system = self.persona.system_prompt();
        if let Some(package) = turn.context.as_ref().filter(|p| !p.is_empty()) {
            system.push_str("\n## Relevant Context\n");
            system.push_str(&package.render());
        }
        vec![Message::system(system), Message::user(turn.message.clone())]
    }
}

#[async_trait]
impl Stage<Turn> for GenerationStage {
    fn name(&self) -> &str {
        GENERATION_STAGE
    }

    fn validate_input(&self, input: &Turn, _ctx: &StageContext) -> Result<(), String> {
        if input.message.trim().is_empty() {
            return Err("turn has an empty message".into());
        }
        Ok(())
    }

    async fn process(&self, mut turn: Turn, ctx: &StageContext) -> Result<Turn, StageError> {
        let messages = self.build_messages(&turn);
        let response = call_with_timeout(
            self.caller.as_ref(),
            &ModelRole::Persona,
            messages,
            &self.options,
            self.timeout,
        )
        .await?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(StageError::exception("model returned an empty response"));
        }
        debug!(
            correlation_id = %ctx.correlation_id,
            chars = text.len(),
            "Response generated"
        );
        turn.response = Some(text.to_string());
        Ok(turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::test_helpers::ScriptedModelCaller;
    use stratum_core::{ContextItem, ContextPackage};

    #[tokio::test]
    async fn generates_with_persona_and_context() {
        let caller = Arc::new(ScriptedModelCaller::new().respond(ModelRole::Persona, "  Hi there!  "));
        let persona = Persona {
            name: "Ada".into(),
            ..Persona::default()
        };
        let stage = GenerationStage::new(caller.clone(), persona, Duration::from_secs(1));
        let mut turn = Turn::new("hello");
        turn.context = Some(ContextPackage {
            key: "hello".into(),
            items: vec![ContextItem {
                content: "User's name is Sam".into(),
                source: None,
                score: 1.0,
            }],
            metadata: Default::default(),
        });

        let out = stage.process(turn, &StageContext::new("standard")).await.unwrap();
        assert_eq!(out.response.as_deref(), Some("Hi there!"));

        let calls = caller.calls_for(&ModelRole::Persona);
        assert_eq!(calls.len(), 1);
        assert!(calls[0][0].content.starts_with("You are Ada."));
        assert!(calls[0][0].content.contains("User's name is Sam"));
        assert_eq!(calls[0][1].content, "hello");
    }

    #[tokio::test]
    async fn slow_model_maps_to_stage_timeout() {
        let caller = Arc::new(ScriptedModelCaller::new().respond_after(
            ModelRole::Persona,
            Duration::from_secs(5),
            "late",
        ));
        let stage = GenerationStage::new(caller, Persona::default(), Duration::from_millis(20));
        let err = stage
            .process(Turn::new("hello"), &StageContext::new("standard"))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn empty_model_output_is_an_exception() {
        let caller = Arc::new(ScriptedModelCaller::new().respond(ModelRole::Persona, "   "));
        let stage = GenerationStage::new(caller, Persona::default(), Duration::from_secs(1));
        let err = stage
            .process(Turn::new("hello"), &StageContext::new("standard"))
            .await
            .unwrap_err();
        assert!(!err.is_timeout());
    }
}
