//! Declarative workflow graph model.
//!
//! A [`GraphModel`] is an immutable value describing typed automation steps
//! ([`NodeSpec`]) and dependency edges ([`EdgeSpec`]). The engine never
//! mutates a graph; it is handed in read-only for the lifetime of one run.
//!
//! Declaration order of `nodes` and `edges` is preserved and meaningful: the
//! scheduler breaks ties within a level by declaration order, and no other
//! priority notion exists.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque key→value configuration handed verbatim to an action handler.
pub type ConfigMap = Map<String, Value>;

/// One typed unit of work within a graph.
///
/// `kind` selects the registered [`Action`](crate::action::Action); `config`
/// is passed through untouched. Visual metadata (canvas position etc.) is
/// irrelevant to the engine and intentionally absent here — the API layer
/// strips it before handing the graph over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: ConfigMap,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, config: ConfigMap) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            config,
        }
    }
}

/// A dependency edge between two nodes.
///
/// Handle labels are ignored by validation and scheduling; they ride along so
/// handlers can distinguish which port of an upstream node fed them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: String,
    #[serde(alias = "source_node_id")]
    pub source: String,
    #[serde(alias = "target_node_id")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl EdgeSpec {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }
}

/// An immutable directed graph of automation steps.
///
/// Invariants (enforced by [`validate`](crate::validate::validate), not the
/// constructor): node ids unique, every edge endpoint references an existing
/// node, and the graph is acyclic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphModel {
    pub id: String,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl GraphModel {
    pub fn new(id: impl Into<String>, nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> Self {
        Self {
            id: id.into(),
            nodes,
            edges,
        }
    }

    /// Set of all node ids.
    #[must_use]
    pub fn node_ids(&self) -> FxHashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Successor adjacency over edges whose endpoints both exist.
    ///
    /// Edges referencing unknown ids are excluded here; the connectivity
    /// check reports them separately.
    #[must_use]
    pub fn adjacency(&self) -> FxHashMap<&str, Vec<&str>> {
        let ids = self.node_ids();
        let mut adj: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for edge in &self.edges {
            if ids.contains(edge.source.as_str()) && ids.contains(edge.target.as_str()) {
                adj.entry(edge.source.as_str())
                    .or_default()
                    .push(edge.target.as_str());
            }
        }
        adj
    }

    /// All edges targeting the given node, in declaration order.
    #[must_use]
    pub fn incoming_edges(&self, node_id: &str) -> Vec<&EdgeSpec> {
        self.edges.iter().filter(|e| e.target == node_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> GraphModel {
        GraphModel::new(
            "g",
            vec![
                NodeSpec::new("a", "noop", ConfigMap::new()),
                NodeSpec::new("b", "noop", ConfigMap::new()),
                NodeSpec::new("c", "noop", ConfigMap::new()),
            ],
            vec![EdgeSpec::new("e1", "a", "c"), EdgeSpec::new("e2", "b", "c")],
        )
    }

    #[test]
    fn adjacency_skips_dangling_edges() {
        let mut graph = diamond();
        graph.edges.push(EdgeSpec::new("e3", "a", "ghost"));
        let adj = graph.adjacency();
        assert_eq!(adj.get("a"), Some(&vec!["c"]));
    }

    #[test]
    fn incoming_edges_preserve_declaration_order() {
        let graph = diamond();
        let incoming: Vec<_> = graph.incoming_edges("c").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(incoming, vec!["e1", "e2"]);
    }

    #[test]
    fn deserializes_external_field_names() {
        let raw = serde_json::json!({
            "id": "g1",
            "nodes": [{"id": "n1", "type": "http_request", "config": {"url": "https://example.com"}}],
            "edges": [{"id": "e1", "source_node_id": "n1", "target_node_id": "n1"}],
        });
        let graph: GraphModel = serde_json::from_value(raw).unwrap();
        assert_eq!(graph.nodes[0].kind, "http_request");
        assert_eq!(graph.edges[0].source, "n1");
    }
}
