//! Step controller state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of one step controller.
///
/// Loading → Ready → Submitting → Advanced, with ErrorShown as the resting
/// state after a blocked or failed submit. ErrorShown still accepts edits and
/// resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Loading,
    Ready,
    Submitting,
    ErrorShown,
    Advanced,
}

impl ControllerState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: ControllerState) -> bool {
        use ControllerState::*;
        matches!(
            (self, target),
            (Loading, Ready)
                | (Ready, Submitting)
                | (Ready, ErrorShown)
                | (ErrorShown, Ready)
                | (ErrorShown, Submitting)
                | (ErrorShown, ErrorShown)
                | (Submitting, Advanced)
                | (Submitting, ErrorShown)
        )
    }

    /// Whether this controller is finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Advanced)
    }

    /// Whether field edits are accepted.
    pub fn accepts_edits(&self) -> bool {
        matches!(self, Self::Ready | Self::ErrorShown)
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::Loading
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Submitting => "submitting",
            Self::ErrorShown => "error_shown",
            Self::Advanced => "advanced",
        };
        write!(f, "{s}")
    }
}
