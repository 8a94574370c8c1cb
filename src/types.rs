//! Core identifier and status types for the flowgrid engine.
//!
//! These are the vocabulary types shared by every other module: run
//! identifiers, the run-level state machine, and per-node statuses.
//!
//! # Examples
//!
//! ```rust
//! use flowgrid::types::{RunId, RunStatus};
//!
//! let id = RunId::new();
//! assert!(!id.as_str().is_empty());
//!
//! assert!(RunStatus::Running.can_transition_to(RunStatus::Paused));
//! assert!(!RunStatus::Completed.can_transition_to(RunStatus::Running));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one execution instance of a graph.
///
/// Generated at execute-time (uuid v4). The inner string form is what the
/// control surface and event payloads carry, so the transport layer can use
/// it verbatim as a topic key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh run id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// View the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Run-level state machine.
///
/// Transitions: `Running → {Paused, Completed, Failed, Cancelled}`,
/// `Paused → {Running, Cancelled}`. `Completed`, `Failed`, and `Cancelled`
/// are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Returns `true` once the run can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match self {
            Self::Running => matches!(
                next,
                Self::Paused | Self::Completed | Self::Failed | Self::Cancelled
            ),
            Self::Paused => matches!(next, Self::Running | Self::Cancelled),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-node execution status.
///
/// `Skipped` marks nodes in levels that were never reached because an earlier
/// level failed or the run was cancelled; such nodes were not attempted and
/// carry neither output nor error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl NodeStatus {
    /// Whether this node has settled one way or another.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}
