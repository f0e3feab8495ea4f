//! Shared test helpers for crates that drive a [`ModelCaller`].

use crate::error::ModelError;
use crate::message::Message;
use crate::model::{CallOptions, ModelCaller, ModelResponse, ModelRole};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

struct Scripted {
    /// Only answer calls whose messages contain this text
    needle: Option<String>,
    reply: Result<String, ModelError>,
    delay: Option<Duration>,
    /// Stays in the queue after answering
    sticky: bool,
}

/// A mock caller that returns scripted responses per role.
///
/// Each role has its own queue. A call takes the first queued entry whose
/// needle (if any) occurs in one of the call's messages. Calls with no
/// matching entry fail with [`ModelError::Backend`].
#[derive(Default)]
pub struct ScriptedModelCaller {
    scripts: Mutex<HashMap<ModelRole, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(ModelRole, Vec<Message>)>>,
}

impl ScriptedModelCaller {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, role: ModelRole, entry: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(role)
            .or_default()
            .push_back(entry);
        self
    }

    /// Queue one response for `role`.
    pub fn respond(self, role: ModelRole, text: impl Into<String>) -> Self {
        self.push(
            role,
            Scripted {
                needle: None,
                reply: Ok(text.into()),
                delay: None,
                sticky: false,
            },
        )
    }

    /// Queue one response for `role`, used only when a message contains `needle`.
    pub fn respond_when(
        self,
        role: ModelRole,
        needle: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.push(
            role,
            Scripted {
                needle: Some(needle.into()),
                reply: Ok(text.into()),
                delay: None,
                sticky: false,
            },
        )
    }

    /// Answer every call for `role` with the same text.
    pub fn respond_always(self, role: ModelRole, text: impl Into<String>) -> Self {
        self.push(
            role,
            Scripted {
                needle: None,
                reply: Ok(text.into()),
                delay: None,
                sticky: true,
            },
        )
    }

    /// Answer every call for `role` whose messages contain `needle`.
    pub fn respond_always_when(
        self,
        role: ModelRole,
        needle: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.push(
            role,
            Scripted {
                needle: Some(needle.into()),
                reply: Ok(text.into()),
                delay: None,
                sticky: true,
            },
        )
    }

    /// Queue one failure for `role`.
    pub fn fail(self, role: ModelRole, error: ModelError) -> Self {
        self.push(
            role,
            Scripted {
                needle: None,
                reply: Err(error),
                delay: None,
                sticky: false,
            },
        )
    }

    /// Queue one response that only arrives after `delay`.
    pub fn respond_after(self, role: ModelRole, delay: Duration, text: impl Into<String>) -> Self {
        self.push(
            role,
            Scripted {
                needle: None,
                reply: Ok(text.into()),
                delay: Some(delay),
                sticky: false,
            },
        )
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(ModelRole, Vec<Message>)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Calls made under `role`, in order.
    pub fn calls_for(&self, role: &ModelRole) -> Vec<Vec<Message>> {
        self.calls()
            .into_iter()
            .filter(|(r, _)| r == role)
            .map(|(_, m)| m)
            .collect()
    }

    fn next(&self, role: &ModelRole, messages: &[Message]) -> Option<(Result<String, ModelError>, Option<Duration>)> {
        let mut scripts = self.scripts.lock().unwrap_or_else(|p| p.into_inner());
        let queue = scripts.get_mut(role)?;
        let index = queue.iter().position(|s| match &s.needle {
            Some(needle) => messages.iter().any(|m| m.content.contains(needle.as_str())),
            None => true,
        })?;
        if queue[index].sticky {
            let entry = &queue[index];
            return Some((entry.reply.clone(), entry.delay));
        }
        queue.remove(index).map(|entry| (entry.reply, entry.delay))
    }
}

#[async_trait]
impl ModelCaller for ScriptedModelCaller {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn call(
        &self,
        role: &ModelRole,
        messages: Vec<Message>,
        _options: &CallOptions,
    ) -> Result<ModelResponse, ModelError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((role.clone(), messages.clone()));

        let Some((reply, delay)) = self.next(role, &messages) else {
            return Err(ModelError::Backend {
                role: role.to_string(),
                message: "no scripted response".into(),
            });
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply.map(ModelResponse::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queues_are_per_role_and_ordered() {
        let caller = ScriptedModelCaller::new()
            .respond(ModelRole::Planner, "first")
            .respond(ModelRole::Planner, "second")
            .respond(ModelRole::Persona, "hello");
        let opts = CallOptions::default();

        let a = caller.call(&ModelRole::Planner, vec![], &opts).await.unwrap();
        let b = caller.call(&ModelRole::Persona, vec![], &opts).await.unwrap();
        let c = caller.call(&ModelRole::Planner, vec![], &opts).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "hello");
        assert_eq!(c.content, "second");
        assert!(caller.call(&ModelRole::Planner, vec![], &opts).await.is_err());
        assert_eq!(caller.call_count(), 4);
    }

    #[tokio::test]
    async fn needle_selects_matching_entry() {
        let caller = ScriptedModelCaller::new()
            .respond_when(ModelRole::Curator, "core values", "alignment")
            .respond_when(ModelRole::Curator, "persona profile", "consistency");
        let opts = CallOptions::default();

        let r = caller
            .call(&ModelRole::Curator, vec![Message::user("check the persona profile")], &opts)
            .await
            .unwrap();
        assert_eq!(r.content, "consistency");
    }

    #[tokio::test]
    async fn sticky_entries_repeat() {
        let caller = ScriptedModelCaller::new().respond_always(ModelRole::Summarizer, "done");
        let opts = CallOptions::default();
        for _ in 0..3 {
            let r = caller.call(&ModelRole::Summarizer, vec![], &opts).await.unwrap();
            assert_eq!(r.content, "done");
        }
    }
}
