//! Structural and configuration validation of a [`GraphModel`].
//!
//! Checks run in a fixed order and short-circuit on the first violation:
//! cycle detection, per-node configuration against the registry's
//! required-field metadata, then edge connectivity. Only the first violation
//! is reported, not an exhaustive list.
//!
//! Cycle detection uses an explicit stack rather than recursion so graphs
//! with thousands of nodes cannot overflow the call stack.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::action::ActionRegistry;
use crate::graph::GraphModel;

/// A structural or configuration violation that makes a graph unexecutable.
///
/// Surfaced before any node executes; the run is created directly in the
/// `Failed` status carrying this error's display form.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("graph contains cycles")]
    #[diagnostic(
        code(flowgrid::validate::cycle),
        help("Remove the dependency edge that closes the loop; workflows must be acyclic.")
    )]
    CycleDetected,

    #[error("invalid configuration for node {node_id}: {reason}")]
    #[diagnostic(
        code(flowgrid::validate::node_config),
        help("Check the node kind is registered and all required config fields are set.")
    )]
    InvalidNodeConfig { node_id: String, reason: String },

    #[error("connectivity issue: edge {edge_id} references unknown node {node_id}")]
    #[diagnostic(code(flowgrid::validate::connectivity))]
    DanglingEdge { edge_id: String, node_id: String },

    #[error("duplicate node id {node_id}")]
    #[diagnostic(code(flowgrid::validate::duplicate_node))]
    DuplicateNodeId { node_id: String },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Validate a graph against the registry, returning the first violation.
///
/// Idempotent and read-only: validating the same graph twice yields identical
/// results.
pub fn validate(graph: &GraphModel, registry: &ActionRegistry) -> Result<(), ValidationError> {
    check_unique_ids(graph)?;
    check_acyclic(graph)?;
    check_node_configs(graph, registry)?;
    check_connectivity(graph)?;
    Ok(())
}

fn check_unique_ids(graph: &GraphModel) -> Result<(), ValidationError> {
    let mut seen = FxHashMap::default();
    for node in &graph.nodes {
        if seen.insert(node.id.as_str(), ()).is_some() {
            return Err(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }
    Ok(())
}

/// Three-coloring DFS with an explicit stack; a back-edge to a gray node
/// signals a cycle.
fn check_acyclic(graph: &GraphModel) -> Result<(), ValidationError> {
    let adjacency = graph.adjacency();
    let mut colors: FxHashMap<&str, Color> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), Color::White))
        .collect();

    static EMPTY: Vec<&str> = Vec::new();

    for root in &graph.nodes {
        if colors[root.id.as_str()] != Color::White {
            continue;
        }
        // Stack frames are (node, index of the next successor to visit).
        let mut stack: Vec<(&str, usize)> = vec![(root.id.as_str(), 0)];
        colors.insert(root.id.as_str(), Color::Gray);

        while let Some((node, next_child)) = stack.last_mut() {
            let successors = adjacency.get(node).unwrap_or(&EMPTY);
            if let Some(&succ) = successors.get(*next_child) {
                *next_child += 1;
                match colors[succ] {
                    Color::Gray => return Err(ValidationError::CycleDetected),
                    Color::White => {
                        colors.insert(succ, Color::Gray);
                        stack.push((succ, 0));
                    }
                    Color::Black => {}
                }
            } else {
                colors.insert(*node, Color::Black);
                stack.pop();
            }
        }
    }
    Ok(())
}

fn check_node_configs(
    graph: &GraphModel,
    registry: &ActionRegistry,
) -> Result<(), ValidationError> {
    for node in &graph.nodes {
        let Some(required) = registry.required_fields(&node.kind) else {
            return Err(ValidationError::InvalidNodeConfig {
                node_id: node.id.clone(),
                reason: format!("unknown node kind {:?}", node.kind),
            });
        };
        for field in required {
            if !node.config.contains_key(&field) {
                return Err(ValidationError::InvalidNodeConfig {
                    node_id: node.id.clone(),
                    reason: format!("missing required field {field:?}"),
                });
            }
        }
    }
    Ok(())
}

fn check_connectivity(graph: &GraphModel) -> Result<(), ValidationError> {
    let ids = graph.node_ids();
    for edge in &graph.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !ids.contains(endpoint.as_str()) {
                return Err(ValidationError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }
    Ok(())
}
