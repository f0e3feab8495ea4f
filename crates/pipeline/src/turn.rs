//! The conversational turn payload that flows through the response pipeline.

use serde::{Deserialize, Serialize};
use stratum_core::{ContextPackage, RefinementResult, ValidationReport};

/// One user message and everything the stages attach to it.
///
/// Each stage fills in one field: context → `context`, generation →
/// `response`, meta-cognition → `report` and `refinement`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextPackage>,

    /// The response to surface downstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement: Option<RefinementResult>,
}

impl Turn {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// A turn whose response was produced elsewhere (e.g. a reasoning loop).
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn response_text(&self) -> &str {
        self.response.as_deref().unwrap_or_default()
    }
}
