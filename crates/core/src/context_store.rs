//! Context Store trait — the memory/vector-search collaborator.
//!
//! The store is consumed only upstream of response generation: the context
//! stage asks it for an opaque package keyed by the incoming message (or a
//! reasoning goal) and forwards that package to generation untouched.

use crate::error::ContextError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single retrieved item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// The retrieved text
    pub content: String,

    /// Where it came from (episode id, document path, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Relevance score assigned by the store
    #[serde(default)]
    pub score: f32,
}

/// An opaque context package returned by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextPackage {
    /// The key this package was built for
    pub key: String,

    /// Retrieved items, most relevant first
    #[serde(default)]
    pub items: Vec<ContextItem>,

    /// Store-specific metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ContextPackage {
    /// An empty package for `key`.
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render the package as a prompt section.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            match &item.source {
                Some(source) => out.push_str(&format!("- [{}] {}\n", source, item.content)),
                None => out.push_str(&format!("- {}\n", item.content)),
            }
        }
        out
    }
}

/// The Context Store trait.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// A human-readable name for this store.
    fn name(&self) -> &str;

    /// Build a context package for a goal or message.
    async fn context_for(&self, key: &str) -> std::result::Result<ContextPackage, ContextError>;
}

/// A store that never returns anything.
pub struct NoopContextStore;

#[async_trait]
impl ContextStore for NoopContextStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn context_for(&self, key: &str) -> std::result::Result<ContextPackage, ContextError> {
        Ok(ContextPackage::empty(key))
    }
}

/// A store that returns the same items for every key.
///
/// Handy for fixed reference material and for tests.
pub struct StaticContextStore {
    items: Vec<ContextItem>,
}

impl StaticContextStore {
    pub fn new(items: Vec<ContextItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl ContextStore for StaticContextStore {
    fn name(&self) -> &str {
        "static"
    }

    async fn context_for(&self, key: &str) -> std::result::Result<ContextPackage, ContextError> {
        Ok(ContextPackage {
            key: key.to_string(),
            items: self.items.clone(),
            metadata: serde_json::Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_store_returns_empty_package() {
        let package = NoopContextStore.context_for("hello").await.unwrap();
        assert_eq!(package.key, "hello");
        assert!(package.is_empty());
    }

    #[tokio::test]
    async fn static_store_renders_sources() {
        let store = StaticContextStore::new(vec![ContextItem {
            content: "User prefers Celsius".into(),
            source: Some("episode-7".into()),
            score: 0.9,
        }]);
        let package = store.context_for("weather").await.unwrap();
        assert_eq!(package.render(), "- [episode-7] User prefers Celsius\n");
    }
}
