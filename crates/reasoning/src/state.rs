//! Loop states and the transitions allowed between them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Planning,
    Acting,
    Observing,
    Reflecting,
    Done,
    Failed,
}

impl LoopState {
    /// Whether the loop may move from `self` to `next`.
    ///
    /// Any non-terminal state may fail; `Done` and `Failed` are final.
    pub fn can_transition_to(self, next: LoopState) -> bool {
        use LoopState::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Planning, Acting) => true,
            (Acting, Observing) => true,
            (Observing, Reflecting) => true,
            (Reflecting, Planning | Done) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LoopState::Done | LoopState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoopState::Planning => "planning",
            LoopState::Acting => "acting",
            LoopState::Observing => "observing",
            LoopState::Reflecting => "reflecting",
            LoopState::Done => "done",
            LoopState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
