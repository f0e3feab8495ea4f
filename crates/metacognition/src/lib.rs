//! # Stratum Meta-Cognition
//!
//! Validation and refinement of candidate responses.
//!
//! - [`SafetyValidator`]: deterministic pattern matching over four
//!   categories, always available.
//! - [`AlignmentValidator`]: per-core-value judgments from the curator role.
//! - [`ConsistencyValidator`]: persona consistency as a score range.
//! - [`HeuristicConsistencyValidator`]: cheap persona checks for `quick`.
//!
//! A [`ValidatorSet`] runs the validators selected by the validation level
//! concurrently; a [`RefinementEngine`] makes at most one corrective pass
//! when the joined report fails. [`MetaCognitionStage`] packages both as a
//! pipeline stage.

pub mod alignment;
pub mod consistency;
pub mod refinement;
pub mod safety;
pub mod sanitizer;
pub mod set;
pub mod stage;
pub mod validator;

pub use alignment::AlignmentValidator;
pub use consistency::{ConsistencyValidator, HeuristicConsistencyValidator};
pub use refinement::RefinementEngine;
pub use safety::{SafetyCategory, SafetyMatch, SafetyRule, SafetyScanner, SafetyValidator};
pub use sanitizer::{Redaction, Sanitized, sanitize};
pub use set::ValidatorSet;
pub use stage::{METACOGNITION_STAGE, MetaCognitionOutput, MetaCognitionStage};
pub use validator::{Assessment, Validator, ValidatorError};
