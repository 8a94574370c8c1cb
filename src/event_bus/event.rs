use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{NodeStatus, RunId, RunStatus};

/// A progress event emitted by the engine.
///
/// Two shapes cover the external sink surface — run-status (including the
/// per-level progress refresh) and node-update — plus a handler-scoped
/// diagnostic shape that actions can emit through their context.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Run(RunStatusEvent),
    Node(NodeUpdateEvent),
    Handler(HandlerEvent),
}

impl Event {
    pub fn handler_message(
        run_id: RunId,
        node_id: impl Into<String>,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Handler(HandlerEvent {
            run_id,
            node_id: node_id.into(),
            scope: scope.into(),
            message: message.into(),
            at: Utc::now(),
        })
    }

    /// The run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        match self {
            Event::Run(e) => &e.run_id,
            Event::Node(e) => &e.run_id,
            Event::Handler(e) => &e.run_id,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::Run(e) => e.at,
            Event::Node(e) => e.at,
            Event::Handler(e) => e.at,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Run(e) => write!(
                f,
                "[{}] run {} ({}/{} completed, {} failed)",
                e.run_id, e.status, e.completed, e.total, e.failed
            ),
            Event::Node(e) => match &e.error {
                Some(err) => write!(f, "[{}] node {} {}: {err}", e.run_id, e.node_id, e.status),
                None => write!(f, "[{}] node {} {}", e.run_id, e.node_id, e.status),
            },
            Event::Handler(e) => {
                write!(f, "[{}] {}/{}: {}", e.run_id, e.node_id, e.scope, e.message)
            }
        }
    }
}

/// Run-level status event.
///
/// Emitted when a run starts, after every level settles (a progress refresh
/// with `status = Running`), and once on reaching a terminal status.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunStatusEvent {
    pub run_id: RunId,
    pub status: RunStatus,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Per-node settle event, emitted immediately as each node finishes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeUpdateEvent {
    pub run_id: RunId,
    pub node_id: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub at: DateTime<Utc>,
}

/// Handler-scoped diagnostic emitted by an action through its context.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HandlerEvent {
    pub run_id: RunId,
    pub node_id: String,
    pub scope: String,
    pub message: String,
    pub at: DateTime<Utc>,
}
