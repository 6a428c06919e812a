use std::collections::BTreeMap;

use cdr_core::{Edge, EdgeKey, Node, NodeId, NodeType, Relationship};

/// Immutable node/edge snapshot produced by one analysis run. Filters and
/// imports build new instances; nothing mutates a published graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeKey, Edge>,
}

impl Graph {
    pub(crate) fn from_parts(
        nodes: BTreeMap<NodeId, Node>,
        edges: BTreeMap<EdgeKey, Edge>,
    ) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Looks up the edge between two nodes regardless of argument order.
    pub fn edge_between(&self, a: &str, b: &str, relationship: Relationship) -> Option<&Edge> {
        self.edges.get(&EdgeKey::canonical(a, b, relationship))
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in ascending `(source, target, relationship)` order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> {
        self.nodes
            .values()
            .filter(move |node| node.node_type == node_type)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
