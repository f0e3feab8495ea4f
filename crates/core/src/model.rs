//! Model Caller trait — the abstraction over language-model invocation.
//!
//! The engine never talks to a model backend directly. Every generative
//! step (planning, reflection, synthesis, alignment and consistency checks,
//! rewriting) goes through a [`ModelCaller`] under a logical [`ModelRole`].
//! Deployments map roles to concrete backends; [`RoleRouter`] is the
//! in-process version of that mapping.
//!
//! Every call is a suspension point and must be bounded: use
//! [`call_with_timeout`] rather than awaiting `call` directly.

use crate::error::ModelError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Logical role a model call is made under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Plans the next ReAct step and judges completion.
    Planner,
    /// Speaks as the agent; generates and rewrites user-facing responses.
    Persona,
    /// Reviews responses against values and persona.
    Curator,
    /// Compresses traces into final answers.
    Summarizer,
    /// Deployment-specific role.
    Custom(String),
}

impl ModelRole {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Planner => "planner",
            Self::Persona => "persona",
            Self::Curator => "curator",
            Self::Summarizer => "summarizer",
            Self::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for ModelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOptions {
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Ask the backend for a bare JSON object
    #[serde(default)]
    pub json_output: bool,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: None,
            json_output: false,
        }
    }
}

impl CallOptions {
    /// Low-temperature options for structured JSON output.
    pub fn json() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: None,
            json_output: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

/// A complete response from the Model Caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated text
    pub content: String,

    /// Backend-specific payload, kept opaque
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl ModelResponse {
    /// A response with text content and no raw payload.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            raw: serde_json::Value::Null,
        }
    }
}

/// The core Model Caller trait.
///
/// Implementations must be safe for concurrent use by many sessions; the
/// engine shares one caller across every pipeline run and reasoning loop.
#[async_trait]
pub trait ModelCaller: Send + Sync {
    /// A human-readable name for this caller (e.g., "router", "ollama").
    fn name(&self) -> &str;

    /// Send messages under a logical role and get the full response.
    async fn call(
        &self,
        role: &ModelRole,
        messages: Vec<Message>,
        options: &CallOptions,
    ) -> std::result::Result<ModelResponse, ModelError>;
}

/// Call a model with a hard deadline.
///
/// An elapsed deadline becomes [`ModelError::Timeout`]; the in-flight call
/// is dropped.
pub async fn call_with_timeout(
    caller: &dyn ModelCaller,
    role: &ModelRole,
    messages: Vec<Message>,
    options: &CallOptions,
    timeout: Duration,
) -> std::result::Result<ModelResponse, ModelError> {
    match tokio::time::timeout(timeout, caller.call(role, messages, options)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                caller = caller.name(),
                role = %role,
                timeout_ms = timeout.as_millis() as u64,
                "Model call timed out"
            );
            Err(ModelError::Timeout {
                role: role.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

/// Routes each logical role to the backend that serves it.
pub struct RoleRouter {
    routes: HashMap<ModelRole, Arc<dyn ModelCaller>>,
    fallback: Option<Arc<dyn ModelCaller>>,
}

impl RoleRouter {
    /// Create a router with no routes and no fallback.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: None,
        }
    }

    /// Create a router whose unmapped roles go to `fallback`.
    pub fn with_fallback(fallback: Arc<dyn ModelCaller>) -> Self {
        Self {
            routes: HashMap::new(),
            fallback: Some(fallback),
        }
    }

    /// Map a role to a backend. Replaces any existing mapping.
    pub fn route(mut self, role: ModelRole, caller: Arc<dyn ModelCaller>) -> Self {
        self.routes.insert(role, caller);
        self
    }

    /// Resolve the backend serving `role`.
    pub fn resolve(&self, role: &ModelRole) -> Option<Arc<dyn ModelCaller>> {
        self.routes
            .get(role)
            .or(self.fallback.as_ref())
            .cloned()
    }

    /// Roles with an explicit mapping.
    pub fn roles(&self) -> Vec<&ModelRole> {
        self.routes.keys().collect()
    }
}

impl Default for RoleRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelCaller for RoleRouter {
    fn name(&self) -> &str {
        "role_router"
    }

    async fn call(
        &self,
        role: &ModelRole,
        messages: Vec<Message>,
        options: &CallOptions,
    ) -> std::result::Result<ModelResponse, ModelError> {
        let backend = self
            .resolve(role)
            .ok_or_else(|| ModelError::RoleNotMapped(role.to_string()))?;
        debug!(role = %role, backend = backend.name(), "Routing model call");
        backend.call(role, messages, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCaller {
        name: &'static str,
    }

    #[async_trait]
    impl ModelCaller for FixedCaller {
        fn name(&self) -> &str {
            self.name
        }

        async fn call(
            &self,
            role: &ModelRole,
            _messages: Vec<Message>,
            _options: &CallOptions,
        ) -> std::result::Result<ModelResponse, ModelError> {
            Ok(ModelResponse::text(format!("{}:{}", self.name, role)))
        }
    }

    struct StalledCaller;

    #[async_trait]
    impl ModelCaller for StalledCaller {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn call(
            &self,
            _role: &ModelRole,
            _messages: Vec<Message>,
            _options: &CallOptions,
        ) -> std::result::Result<ModelResponse, ModelError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ModelResponse::text("late"))
        }
    }

    #[tokio::test]
    async fn router_uses_explicit_route_before_fallback() {
        let router = RoleRouter::with_fallback(Arc::new(FixedCaller { name: "default" }))
            .route(ModelRole::Planner, Arc::new(FixedCaller { name: "planner-backend" }));

        let planned = router
            .call(&ModelRole::Planner, vec![], &CallOptions::default())
            .await
            .unwrap();
        assert_eq!(planned.content, "planner-backend:planner");

        let persona = router
            .call(&ModelRole::Persona, vec![], &CallOptions::default())
            .await
            .unwrap();
        assert_eq!(persona.content, "default:persona");
    }

    #[tokio::test]
    async fn router_without_route_or_fallback_errors() {
        let router = RoleRouter::new();
        let err = router
            .call(&ModelRole::Curator, vec![], &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::RoleNotMapped(ref r) if r == "curator"));
    }

    #[tokio::test]
    async fn call_with_timeout_reports_elapsed_deadline() {
        let err = call_with_timeout(
            &StalledCaller,
            &ModelRole::Planner,
            vec![Message::user("hi")],
            &CallOptions::json(),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ModelError::Timeout { timeout_ms: 20, .. }));
    }

    #[test]
    fn custom_role_displays_its_name() {
        assert_eq!(ModelRole::Custom("critic".into()).to_string(), "critic");
        assert!(CallOptions::json().json_output);
    }
}
