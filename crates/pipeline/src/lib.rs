//! # Stratum Pipeline
//!
//! A layered pipeline that passes a payload through composable stages:
//! context preparation → response generation → validation/refinement.
//!
//! The [`PipelineExecutor`] runs stages strictly in order under a per-stage
//! timeout, an optional whole-run deadline and an error policy, emitting an
//! audit record for every transition. The meta-cognition stage lives in the
//! `stratum-metacognition` crate and plugs in as another [`Stage<Turn>`].

pub mod executor;
pub mod stage;
pub mod stages;
pub mod turn;

pub use executor::{Pipeline, PipelineExecutor, PipelineResult};
pub use stage::{Stage, StageContext, StageResult, StageStatus};
pub use stages::{CONTEXT_STAGE, ContextStage, GENERATION_STAGE, GenerationStage};
pub use turn::Turn;
