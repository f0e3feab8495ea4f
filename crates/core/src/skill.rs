//! Skill Registry — the abstraction over invocable agent capabilities.
//!
//! The reasoning loop only sees the [`SkillRegistry`] trait: it asks for an
//! accurate action menu via `describe`, then calls `invoke` by name. Any
//! mutation a skill performs is the registry's own concern.
//!
//! [`SkillSet`] is an in-process registry built from [`Skill`] objects.

use crate::error::SkillError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Domain used when a skill does not declare one.
pub const DEFAULT_DOMAIN: &str = "general";

/// One entry of the planner's action menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDescriptor {
    /// The skill name the planner must use as `action`
    pub name: String,

    /// What the skill does
    pub description: String,

    /// JSON Schema describing `actionInput`
    pub input_schema: serde_json::Value,
}

/// The result of invoking a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillOutcome {
    /// Whether the skill did what it was asked
    pub success: bool,

    /// Structured output on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Failure description on error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SkillOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// The registry the reasoning loop acts through.
///
/// Implementations must be safe for concurrent multi-session use.
#[async_trait]
pub trait SkillRegistry: Send + Sync {
    /// Describe the skills available in `domain` (all skills when `None`).
    fn describe(&self, domain: Option<&str>) -> Vec<SkillDescriptor>;

    /// Invoke a skill by name.
    async fn invoke(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> std::result::Result<SkillOutcome, SkillError>;
}

/// A single invocable capability.
#[async_trait]
pub trait Skill: Send + Sync {
    /// The unique name of this skill (e.g., "list_files").
    fn name(&self) -> &str;

    /// A description of what this skill does (shown to the planner).
    fn description(&self) -> &str;

    /// The domain this skill belongs to.
    fn domain(&self) -> &str {
        DEFAULT_DOMAIN
    }

    /// JSON Schema describing this skill's input.
    fn input_schema(&self) -> serde_json::Value;

    /// Run the skill.
    async fn invoke(
        &self,
        input: serde_json::Value,
    ) -> std::result::Result<SkillOutcome, SkillError>;

    fn to_descriptor(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// An in-process skill registry.
pub struct SkillSet {
    skills: HashMap<String, Box<dyn Skill>>,
}

impl SkillSet {
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    /// Register a skill. Replaces any existing skill with the same name.
    pub fn register(&mut self, skill: Box<dyn Skill>) {
        let name = skill.name().to_string();
        self.skills.insert(name, skill);
    }

    /// Builder-style registration.
    pub fn with(mut self, skill: Box<dyn Skill>) -> Self {
        self.register(skill);
        self
    }

    /// Get a skill by name.
    pub fn get(&self, name: &str) -> Option<&dyn Skill> {
        self.skills.get(name).map(|s| s.as_ref())
    }

    /// List all registered skill names.
    pub fn names(&self) -> Vec<&str> {
        self.skills.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl Default for SkillSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SkillRegistry for SkillSet {
    fn describe(&self, domain: Option<&str>) -> Vec<SkillDescriptor> {
        let mut descriptors: Vec<SkillDescriptor> = self
            .skills
            .values()
            .filter(|s| domain.is_none_or(|d| s.domain() == d))
            .map(|s| s.to_descriptor())
            .collect();
        // Stable menu order keeps planner prompts reproducible.
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    async fn invoke(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> std::result::Result<SkillOutcome, SkillError> {
        let skill = self
            .skills
            .get(name)
            .ok_or_else(|| SkillError::NotFound(name.to_string()))?;
        skill.invoke(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoSkill;

    #[async_trait]
    impl Skill for EchoSkill {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn invoke(
            &self,
            input: serde_json::Value,
        ) -> std::result::Result<SkillOutcome, SkillError> {
            let text = input["text"]
                .as_str()
                .ok_or_else(|| SkillError::InvalidInput("text is required".into()))?;
            Ok(SkillOutcome::ok(serde_json::json!(text)))
        }
    }

    struct FsSkill;

    #[async_trait]
    impl Skill for FsSkill {
        fn name(&self) -> &str {
            "list_files"
        }
        fn description(&self) -> &str {
            "Lists files"
        }
        fn domain(&self) -> &str {
            "filesystem"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn invoke(
            &self,
            _input: serde_json::Value,
        ) -> std::result::Result<SkillOutcome, SkillError> {
            Ok(SkillOutcome::ok(serde_json::json!([])))
        }
    }

    fn registry() -> SkillSet {
        SkillSet::new()
            .with(Box::new(EchoSkill))
            .with(Box::new(FsSkill))
    }

    #[test]
    fn describe_is_sorted_and_filtered_by_domain() {
        let skills = registry();
        let all = skills.describe(None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "echo");
        assert_eq!(all[1].name, "list_files");

        let fs = skills.describe(Some("filesystem"));
        assert_eq!(fs.len(), 1);
        assert_eq!(fs[0].name, "list_files");
    }

    #[tokio::test]
    async fn invoke_registered_skill() {
        let outcome = registry()
            .invoke("echo", serde_json::json!({"text": "hello"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data, Some(serde_json::json!("hello")));
    }

    #[tokio::test]
    async fn invoke_missing_skill() {
        let err = registry()
            .invoke("nonexistent", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_input_surfaces_as_error() {
        let err = registry()
            .invoke("echo", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::InvalidInput(_)));
    }
}
