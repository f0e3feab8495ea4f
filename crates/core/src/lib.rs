//! # Stratum Core
//!
//! Domain types, collaborator traits, and error definitions for the Stratum
//! orchestration engine. This crate has **no engine logic** — it defines the
//! model that the pipeline, meta-cognition and reasoning crates build on.
//!
//! ## Collaborators
//!
//! Everything outside the engine is a trait here:
//! - [`ModelCaller`] — role + messages → text
//! - [`SkillRegistry`] — invoke a named capability, describe the menu
//! - [`ContextStore`] — opaque context package for a goal or message
//! - [`AuditSink`] — append-only record of every transition

pub mod audit;
pub mod context_store;
pub mod error;
pub mod json;
pub mod message;
pub mod model;
pub mod persona;
pub mod report;
pub mod skill;

#[cfg(any(test, feature = "test-util"))]
pub mod test_helpers;

// Re-export key types at crate root for ergonomics
pub use audit::{
    AuditRecord, AuditSink, AuditSource, AuditStatus, FanoutAuditSink, MemoryAuditSink,
    NullAuditSink, TracingAuditSink,
};
pub use context_store::{ContextItem, ContextPackage, ContextStore, NoopContextStore, StaticContextStore};
pub use error::{
    ContextError, Error, ExecutionFailure, ModelError, ReasoningError, Result, SkillError,
    StageError,
};
pub use json::{extract_json_object, parse_embedded};
pub use message::{CorrelationId, Message, MessageRole};
pub use model::{CallOptions, ModelCaller, ModelResponse, ModelRole, RoleRouter, call_with_timeout};
pub use persona::Persona;
pub use report::{
    AppliedChange, IssueRef, RefinementResult, ScoreRange, Severity, ValidationIssue,
    ValidationReport, ValidatorKind, ValidatorOutcome,
};
pub use skill::{Skill, SkillDescriptor, SkillOutcome, SkillRegistry, SkillSet};
