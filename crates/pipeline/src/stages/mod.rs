//! Built-in stages for the conversational response pipeline.

pub mod context;
pub mod generation;

pub use context::{CONTEXT_STAGE, ContextStage};
pub use generation::{GENERATION_STAGE, GenerationStage};
