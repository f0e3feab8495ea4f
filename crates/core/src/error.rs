//! Error types for the Stratum domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! wraps them for callers that only need a single type.
//!
//! Stage and reasoning errors are `Clone` because they are stored inside
//! run logs (`StageResult`, `ReactOutcome`) rather than propagated.

use thiserror::Error;

/// The top-level error type for all Stratum operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model Caller errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Skill Registry errors ---
    #[error("Skill error: {0}")]
    Skill(#[from] SkillError),

    // --- Context Store errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Pipeline stage errors ---
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    // --- Reasoning loop errors ---
    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Model call for role '{role}' timed out after {timeout_ms}ms")]
    Timeout { role: String, timeout_ms: u64 },

    #[error("Model backend failed for role '{role}': {message}")]
    Backend { role: String, message: String },

    #[error("No backend mapped for role '{0}'")]
    RoleNotMapped(String),

    #[error("Model caller not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum SkillError {
    #[error("Skill not found: {0}")]
    NotFound(String),

    #[error("Skill execution failed: {skill} — {reason}")]
    ExecutionFailed { skill: String, reason: String },

    #[error("Skill timed out: {skill} after {timeout_ms}ms")]
    Timeout { skill: String, timeout_ms: u64 },

    #[error("Invalid skill input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("Context store unavailable: {0}")]
    Unavailable(String),

    #[error("Context query failed: {0}")]
    QueryFailed(String),
}

/// Why a stage's `process` did not produce an output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFailure {
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("exception: {message}")]
    Exception { message: String },
}

/// Errors recorded against a single pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// Input precondition failed; `process` never ran.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("execution failed: {0}")]
    Execution(ExecutionFailure),
}

impl StageError {
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Execution(ExecutionFailure::Timeout { timeout_ms })
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self::Execution(ExecutionFailure::Exception {
            message: message.into(),
        })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Execution(ExecutionFailure::Timeout { .. }))
    }
}

impl From<ModelError> for StageError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Timeout { timeout_ms, .. } => Self::timeout(timeout_ms),
            other => Self::exception(other.to_string()),
        }
    }
}

/// Errors that end a ReAct loop in the `FAILED` state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReasoningError {
    #[error("planner output could not be parsed after {attempts} attempts: {detail}")]
    PlanningParse { attempts: u32, detail: String },

    #[error("iteration limit exceeded ({max} iterations)")]
    IterationLimit { max: u32 },

    #[error("{phase} timed out after {timeout_ms}ms")]
    Timeout { phase: String, timeout_ms: u64 },

    #[error("model call failed: {0}")]
    Model(String),
}

impl From<ModelError> for ReasoningError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Timeout { role, timeout_ms } => Self::Timeout {
                phase: format!("{role} call"),
                timeout_ms,
            },
            other => Self::Model(other.to_string()),
        }
    }
}
