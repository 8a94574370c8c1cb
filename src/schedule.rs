//! Dependency leveling: converts a validated graph into an ordered sequence
//! of node-id batches.
//!
//! Kahn's algorithm generalized to level-by-level BFS. Each emitted level is
//! a maximal set of nodes whose dependencies have all been scheduled in
//! earlier levels; nodes within a level retain their declaration order and
//! carry no other priority notion.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::graph::GraphModel;

/// Defensive scheduling failure.
///
/// A cycle reaching this point means validation was bypassed or has a bug;
/// the executor surfaces it as a failed run with a diagnostic message rather
/// than silently truncating the level sequence.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("cycle detected during level computation: scheduled {scheduled} of {total} nodes")]
    #[diagnostic(
        code(flowgrid::schedule::cycle),
        help("The graph should have been rejected by validation; this indicates an engine bug or an unvalidated graph.")
    )]
    CycleDetected { scheduled: usize, total: usize },
}

/// Compute dependency levels for an acyclic graph.
///
/// The union of the returned levels is exactly the node set, and every node
/// appears in a level strictly greater than all of its dependencies' levels.
/// Edges referencing unknown node ids are ignored here; validation reports
/// them as connectivity violations.
pub fn compute_levels(graph: &GraphModel) -> Result<Vec<Vec<String>>, ScheduleError> {
    let order: FxHashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let adjacency = graph.adjacency();
    let mut in_degree: FxHashMap<&str, usize> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), 0))
        .collect();
    for successors in adjacency.values() {
        for succ in successors {
            *in_degree.get_mut(succ).expect("successor is a known node") += 1;
        }
    }

    // Initial frontier: all zero-in-degree nodes, in declaration order.
    let mut frontier: Vec<&str> = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut scheduled = 0usize;

    while !frontier.is_empty() {
        let mut next: Vec<&str> = Vec::new();
        for &node in &frontier {
            for &succ in adjacency.get(node).map(Vec::as_slice).unwrap_or_default() {
                let degree = in_degree.get_mut(succ).expect("successor is a known node");
                *degree -= 1;
                if *degree == 0 {
                    next.push(succ);
                }
            }
        }
        next.sort_by_key(|id| order[id]);
        next.dedup();

        scheduled += frontier.len();
        levels.push(frontier.iter().map(|id| id.to_string()).collect());
        frontier = next;
    }

    if scheduled < graph.nodes.len() {
        return Err(ScheduleError::CycleDetected {
            scheduled,
            total: graph.nodes.len(),
        });
    }
    Ok(levels)
}
