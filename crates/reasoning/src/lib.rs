//! # Stratum Reasoning
//!
//! The ReAct loop: plan one step from the goal and the full trace, act
//! through the [`SkillRegistry`](stratum_core::SkillRegistry), observe a
//! bounded summary, reflect, and finally synthesize an answer from the
//! whole observation history.
//!
//! Grounding checks compare the concrete entities an answer (or an action
//! input) cites against everything the loop actually observed.

pub mod grounding;
pub mod observation;
pub mod planner;
pub mod react;
pub mod reflector;
pub mod state;
pub mod synthesis;
pub mod trace;

pub use grounding::{EntityKind, GroundedEntity, GroundingChecker, GroundingReport};
pub use observation::ObservationSummarizer;
pub use planner::{FINISH_ACTION, PlannedStep, Planner};
pub use react::{ReactLoop, ReactOutcome};
pub use reflector::{Reflection, Reflector};
pub use state::LoopState;
pub use synthesis::Synthesizer;
pub use trace::{ReasoningStep, ReasoningTrace, TraceFull};
