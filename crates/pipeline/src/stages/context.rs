//! Stage 1 — context preparation.

use crate::stage::{Stage, StageContext};
use crate::turn::Turn;
use async_trait::async_trait;
use std::sync::Arc;
use stratum_core::{ContextPackage, ContextStore, StageError};
use tracing::{debug, warn};

pub const CONTEXT_STAGE: &str = "context";

/// Attaches a context package for the turn's message.
///
/// A failing store degrades to an empty package; context is advisory and
/// never fails the run.
pub struct ContextStage {
    store: Arc<dyn ContextStore>,
}

impl ContextStage {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage<Turn> for ContextStage {
    fn name(&self) -> &str {
        CONTEXT_STAGE
    }

    fn validate_input(&self, input: &Turn, _ctx: &StageContext) -> Result<(), String> {
        if input.message.trim().is_empty() {
            return Err("turn has an empty message".into());
        }
        Ok(())
    }

    async fn process(&self, mut turn: Turn, ctx: &StageContext) -> Result<Turn, StageError> {
        let package = match self.store.context_for(&turn.message).await {
            Ok(package) => {
                debug!(
                    store = self.store.name(),
                    items = package.items.len(),
                    correlation_id = %ctx.correlation_id,
                    "Context retrieved"
                );
                package
            }
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "Context store failed, continuing without context");
                ContextPackage::empty(&turn.message)
            }
        };
        turn.context = Some(package);
        Ok(turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::{ContextError, ContextItem, StaticContextStore};

    struct BrokenStore;

    #[async_trait]
    impl ContextStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn context_for(&self, _key: &str) -> Result<ContextPackage, ContextError> {
            Err(ContextError::Unavailable("index offline".into()))
        }
    }

    #[tokio::test]
    async fn attaches_store_package() {
        let store = StaticContextStore::new(vec![ContextItem {
            content: "User prefers short answers".into(),
            source: Some("profile".into()),
            score: 0.9,
        }]);
        let stage = ContextStage::new(Arc::new(store));
        let turn = stage
            .process(Turn::new("hello"), &StageContext::new("standard"))
            .await
            .unwrap();
        let package = turn.context.unwrap();
        assert_eq!(package.items.len(), 1);
        assert!(package.render().contains("[profile]"));
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty_package() {
        let stage = ContextStage::new(Arc::new(BrokenStore));
        let turn = stage
            .process(Turn::new("hello"), &StageContext::new("standard"))
            .await
            .unwrap();
        let package = turn.context.unwrap();
        assert!(package.is_empty());
        assert_eq!(package.key, "hello");
    }

    #[test]
    fn empty_message_fails_precondition() {
        let stage = ContextStage::new(Arc::new(BrokenStore));
        assert!(stage.validate_input(&Turn::new("  "), &StageContext::new("standard")).is_err());
    }
}
