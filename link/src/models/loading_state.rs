use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an execution context.
///
/// ```text
/// Idle ──submit──▶ Pending ──lag timer──▶ Waiting
///  ▲                  │                      │
///  │                  └──first chunk──▶ Loading ◀──first chunk──┘
///  └──────── finalize / stop (from any busy state) ────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    /// Nothing in the pipeline.
    #[default]
    Idle,

    /// Submitted, the lag threshold has not elapsed yet and nothing arrived.
    Pending,

    /// The lag threshold elapsed without any result.
    Waiting,

    /// At least one chunk arrived, more may follow.
    Loading,
}

impl LoadingState {
    /// Whether the UI may start a new execution.
    pub fn can_execute(self) -> bool {
        self == LoadingState::Idle
    }

    /// Whether the UI may offer to stop the running execution.
    pub fn can_stop(self) -> bool {
        self != LoadingState::Idle
    }

    /// Returns true if `self -> to` is one of the legal transitions.
    pub fn can_transition_to(self, to: LoadingState) -> bool {
        use LoadingState::*;
        matches!(
            (self, to),
            (Idle, Pending)
                | (Pending, Waiting)
                | (Pending, Loading)
                | (Waiting, Loading)
                | (Pending, Idle)
                | (Waiting, Idle)
                | (Loading, Idle)
        )
    }
}

impl fmt::Display for LoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadingState::Idle => write!(f, "idle"),
            LoadingState::Pending => write!(f, "pending"),
            LoadingState::Waiting => write!(f, "waiting"),
            LoadingState::Loading => write!(f, "loading"),
        }
    }
}
