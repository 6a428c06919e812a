use std::collections::HashMap;
use std::convert::Infallible;

use cdr_core::{CancelToken, Cancelled, NodeId};
use cdr_graph::Graph;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

const CANCEL_CHECK_INTERVAL: usize = 256;

/// Counts work units and polls the token every [`CANCEL_CHECK_INTERVAL`]
/// steps, starting with the first.
pub(crate) struct Checkpoint<'a> {
    token: Option<&'a CancelToken>,
    pub(crate) steps: usize,
}

impl<'a> Checkpoint<'a> {
    pub(crate) fn new(token: Option<&'a CancelToken>) -> Self {
        Self { token, steps: 0 }
    }

    pub(crate) fn step(&mut self) -> Result<(), Cancelled> {
        let due = self.steps % CANCEL_CHECK_INTERVAL == 0;
        self.steps = self.steps.wrapping_add(1);
        match self.token {
            Some(token) if due => token.check(),
            _ => Ok(()),
        }
    }
}

/// Relationship-agnostic undirected view of a [`Graph`]. Parallel edges
/// between one pair collapse into a single link carrying their summed weight.
///
/// Building is linear in the edge count. Callers running several queries
/// over one graph should build once and reuse the view.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    graph: UnGraph<NodeId, u64>,
    node_index: HashMap<NodeId, NodeIndex>,
}

impl ConnectionGraph {
    pub fn from_graph(source: &Graph) -> Self {
        match Self::build(source, || Ok::<(), Infallible>(())) {
            Ok(connections) => connections,
            Err(never) => match never {},
        }
    }

    /// Like [`ConnectionGraph::from_graph`], but gives up once `token` fires.
    pub fn from_graph_with_cancel(source: &Graph, token: &CancelToken) -> Result<Self, Cancelled> {
        let mut checkpoint = Checkpoint::new(Some(token));
        Self::build(source, || checkpoint.step())
    }

    fn build<E>(source: &Graph, mut poll: impl FnMut() -> Result<(), E>) -> Result<Self, E> {
        let mut connections = Self::default();
        for node in source.nodes() {
            poll()?;
            connections.ensure_node(&node.id);
        }

        // Parallel relationship edges share a slot keyed by the ordered pair.
        let mut slots: HashMap<(NodeIndex, NodeIndex), usize> = HashMap::new();
        let mut links: Vec<((NodeIndex, NodeIndex), u64)> = Vec::new();
        for edge in source.edges() {
            poll()?;
            let a = connections.ensure_node(edge.source());
            let b = connections.ensure_node(edge.target());
            let pair = if a <= b { (a, b) } else { (b, a) };
            let slot = *slots.entry(pair).or_insert_with(|| {
                links.push((pair, 0));
                links.len() - 1
            });
            links[slot].1 = links[slot].1.saturating_add(edge.weight());
        }

        for ((a, b), weight) in links {
            poll()?;
            connections.graph.add_edge(a, b, weight);
        }

        tracing::debug!(
            nodes = connections.node_count(),
            links = connections.link_count(),
            "built connection graph"
        );
        Ok(connections)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn connected_components(&self) -> usize {
        petgraph::algo::connected_components(&self.graph)
    }

    pub(crate) fn index(&self, id: &str) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    pub(crate) fn id(&self, index: NodeIndex) -> &str {
        self.graph[index].as_str()
    }

    /// Neighbors of `node` with the combined weight of the link to each.
    pub(crate) fn links(&self, node: NodeIndex) -> impl Iterator<Item = (NodeIndex, u64)> + '_ {
        self.graph.edges(node).map(move |edge| {
            let other = if edge.source() == node {
                edge.target()
            } else {
                edge.source()
            };
            (other, *edge.weight())
        })
    }

    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&index) = self.node_index.get(id) {
            return index;
        }
        let index = self.graph.add_node(id.to_owned());
        self.node_index.insert(id.to_owned(), index);
        index
    }
}
