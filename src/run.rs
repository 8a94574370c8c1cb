//! Mutable per-run state and read-only snapshots.
//!
//! An [`ExecutionRun`] is owned by the coordinator task that drives it (via
//! the store's per-run lock); every external reader receives a
//! [`RunSnapshot`] — a deep, serde-friendly copy that can be mutated freely
//! without affecting the live run.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::graph::{ConfigMap, GraphModel};
use crate::types::{NodeStatus, RunId, RunStatus};

/// Terminal (or in-progress) record of one node's execution.
///
/// `output` is present iff the node completed; `error` iff it failed.
/// `Skipped` nodes carry neither — they were never attempted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeResult {
    pub node_id: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ConfigMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl NodeResult {
    fn running(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            status: NodeStatus::Running,
            output: None,
            error: None,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    fn skipped(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            status: NodeStatus::Skipped,
            output: None,
            error: None,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }
}

/// Mutable record of one execution instance.
///
/// Invariants: a node id appears in at most one of
/// `completed_nodes`/`failed_nodes`/`skipped_nodes`; `status` is terminal
/// only once `ended_at` is set; `current_nodes` is non-empty only while a
/// level's tasks are in flight.
#[derive(Clone, Debug)]
pub struct ExecutionRun {
    pub id: RunId,
    pub graph: Arc<GraphModel>,
    pub status: RunStatus,
    pub current_nodes: Vec<String>,
    pub completed_nodes: Vec<String>,
    pub failed_nodes: Vec<String>,
    pub skipped_nodes: Vec<String>,
    pub results: FxHashMap<String, NodeResult>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ExecutionRun {
    /// Create a fresh run in the `Running` status.
    #[must_use]
    pub fn new(id: RunId, graph: Arc<GraphModel>) -> Self {
        Self {
            id,
            graph,
            status: RunStatus::Running,
            current_nodes: Vec::new(),
            completed_nodes: Vec::new(),
            failed_nodes: Vec::new(),
            skipped_nodes: Vec::new(),
            results: FxHashMap::default(),
            started_at: Utc::now(),
            ended_at: None,
            error: None,
        }
    }

    /// Create a run that was rejected before any node executed.
    ///
    /// Used for validation failures: the run is born `Failed` with the
    /// violation as its run-level error and `ended_at` already set.
    #[must_use]
    pub fn rejected(id: RunId, graph: Arc<GraphModel>, error: impl Into<String>) -> Self {
        let mut run = Self::new(id, graph);
        run.status = RunStatus::Failed;
        run.error = Some(error.into());
        run.ended_at = Some(Utc::now());
        run
    }

    /// Mark every node of a level in-flight.
    pub fn begin_level(&mut self, level: &[String]) {
        self.current_nodes = level.to_vec();
        for node_id in level {
            self.results
                .insert(node_id.clone(), NodeResult::running(node_id));
        }
    }

    /// Record a successful node settle, moving it out of the in-flight set.
    pub fn record_completed(&mut self, node_id: &str, output: ConfigMap, duration_ms: u64) {
        self.current_nodes.retain(|n| n != node_id);
        self.completed_nodes.push(node_id.to_string());
        self.results.insert(
            node_id.to_string(),
            NodeResult {
                node_id: node_id.to_string(),
                status: NodeStatus::Completed,
                output: Some(output),
                error: None,
                duration_ms,
                timestamp: Utc::now(),
            },
        );
    }

    /// Record a failed node settle, moving it out of the in-flight set.
    pub fn record_failed(&mut self, node_id: &str, error: impl Into<String>, duration_ms: u64) {
        self.current_nodes.retain(|n| n != node_id);
        self.failed_nodes.push(node_id.to_string());
        self.results.insert(
            node_id.to_string(),
            NodeResult {
                node_id: node_id.to_string(),
                status: NodeStatus::Failed,
                output: None,
                error: Some(error.into()),
                duration_ms,
                timestamp: Utc::now(),
            },
        );
    }

    /// Mark nodes in never-reached levels as skipped.
    ///
    /// Skipped nodes appear in `skipped_nodes` and `results` but never in
    /// `completed_nodes` or `failed_nodes`.
    pub fn mark_skipped<'a>(&mut self, node_ids: impl IntoIterator<Item = &'a String>) {
        for node_id in node_ids {
            if self.results.get(node_id).is_some_and(|r| r.status.is_settled()) {
                continue;
            }
            self.skipped_nodes.push(node_id.clone());
            self.results
                .insert(node_id.clone(), NodeResult::skipped(node_id));
        }
    }

    /// Move the run to a terminal status and stamp `ended_at`.
    ///
    /// A no-op when the run is already terminal (e.g. cancelled mid-level):
    /// the first terminal transition wins.
    pub fn finish(&mut self, status: RunStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error = error;
        self.ended_at = Some(Utc::now());
    }

    /// Output maps of all nodes completed so far, keyed by node id.
    #[must_use]
    pub fn completed_outputs(&self) -> FxHashMap<String, ConfigMap> {
        self.completed_nodes
            .iter()
            .filter_map(|id| {
                self.results
                    .get(id)
                    .and_then(|r| r.output.clone())
                    .map(|out| (id.clone(), out))
            })
            .collect()
    }

    /// Deep copy for external readers.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            id: self.id.clone(),
            graph_id: self.graph.id.clone(),
            status: self.status,
            current_nodes: self.current_nodes.clone(),
            completed_nodes: self.completed_nodes.clone(),
            failed_nodes: self.failed_nodes.clone(),
            skipped_nodes: self.skipped_nodes.clone(),
            results: self.results.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            error: self.error.clone(),
        }
    }
}

/// Point-in-time deep copy of a run, safe for concurrent reads and directly
/// serializable for the transport layer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunSnapshot {
    pub id: RunId,
    pub graph_id: String,
    pub status: RunStatus,
    pub current_nodes: Vec<String>,
    pub completed_nodes: Vec<String>,
    pub failed_nodes: Vec<String>,
    pub skipped_nodes: Vec<String>,
    pub results: FxHashMap<String, NodeResult>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphModel;
    use serde_json::json;

    fn empty_graph() -> Arc<GraphModel> {
        Arc::new(GraphModel::new("g", vec![], vec![]))
    }

    #[test]
    fn settle_moves_node_out_of_current() {
        let mut run = ExecutionRun::new(RunId::new(), empty_graph());
        run.begin_level(&["a".to_string(), "b".to_string()]);
        assert_eq!(run.current_nodes.len(), 2);

        let mut out = ConfigMap::new();
        out.insert("k".into(), json!(1));
        run.record_completed("a", out, 5);
        run.record_failed("b", "boom", 7);

        assert!(run.current_nodes.is_empty());
        assert_eq!(run.completed_nodes, vec!["a"]);
        assert_eq!(run.failed_nodes, vec!["b"]);
        assert_eq!(run.results["a"].status, NodeStatus::Completed);
        assert_eq!(run.results["b"].error.as_deref(), Some("boom"));
    }

    #[test]
    fn finish_is_first_wins() {
        let mut run = ExecutionRun::new(RunId::new(), empty_graph());
        run.finish(RunStatus::Cancelled, None);
        let ended = run.ended_at;
        run.finish(RunStatus::Failed, Some("late".into()));
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.ended_at, ended);
        assert_eq!(run.error, None);
    }

    #[test]
    fn mark_skipped_never_touches_settled_nodes() {
        let mut run = ExecutionRun::new(RunId::new(), empty_graph());
        run.begin_level(&["a".to_string()]);
        run.record_completed("a", ConfigMap::new(), 1);
        run.mark_skipped(["a".to_string(), "b".to_string()].iter());
        assert_eq!(run.skipped_nodes, vec!["b"]);
        assert_eq!(run.results["a"].status, NodeStatus::Completed);
    }
}
