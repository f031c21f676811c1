//! Run phase state machine.
//!
//! A run's phase only moves along the edges below. `success` and `failed` are
//! terminal.
//!
//! ```text
//! queued       -> planning | running | failed
//! planning     -> running | waiting_user | failed
//! running      -> waiting_user | success | failed
//! waiting_user -> running | failed
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Queued,
    Planning,
    Running,
    WaitingUser,
    Success,
    Failed,
}

impl RunPhase {
    pub const ALL: [RunPhase; 6] = [
        RunPhase::Queued,
        RunPhase::Planning,
        RunPhase::Running,
        RunPhase::WaitingUser,
        RunPhase::Success,
        RunPhase::Failed,
    ];

    /// Phases a run may be created in.
    pub fn is_initial(self) -> bool {
        matches!(self, RunPhase::Queued | RunPhase::Running)
    }

    /// True for phases with no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        allowed_from(self).is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Queued => "queued",
            RunPhase::Planning => "planning",
            RunPhase::Running => "running",
            RunPhase::WaitingUser => "waiting_user",
            RunPhase::Success => "success",
            RunPhase::Failed => "failed",
        }
    }

    /// Inverse of [`RunPhase::as_str`].
    pub fn parse(name: &str) -> Option<RunPhase> {
        RunPhase::ALL.into_iter().find(|phase| phase.as_str() == name)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adjacency list of the transition table.
pub const fn allowed_from(phase: RunPhase) -> &'static [RunPhase] {
    match phase {
        RunPhase::Queued => &[RunPhase::Planning, RunPhase::Running, RunPhase::Failed],
        RunPhase::Planning => &[RunPhase::Running, RunPhase::WaitingUser, RunPhase::Failed],
        RunPhase::Running => &[RunPhase::WaitingUser, RunPhase::Success, RunPhase::Failed],
        RunPhase::WaitingUser => &[RunPhase::Running, RunPhase::Failed],
        RunPhase::Success | RunPhase::Failed => &[],
    }
}

/// Pure lookup: may a run in `current` move to `next`?
pub fn can_transition(current: RunPhase, next: RunPhase) -> bool {
    allowed_from(current).contains(&next)
}
