mod connection;
mod path;

pub use connection::ConnectionGraph;
pub use path::{HighlightedPath, PathOutcome};

use cdr_core::CancelToken;
use cdr_graph::Graph;

pub fn shortest_path(graph: &Graph, from: &str, to: &str) -> PathOutcome {
    ConnectionGraph::from_graph(graph).shortest_path(from, to, None)
}

/// The token bounds building the undirected view as well as the search.
pub fn shortest_path_with_cancel(
    graph: &Graph,
    from: &str,
    to: &str,
    token: &CancelToken,
) -> PathOutcome {
    match ConnectionGraph::from_graph_with_cancel(graph, token) {
        Ok(connections) => connections.shortest_path(from, to, Some(token)),
        Err(_) => {
            tracing::warn!(
                from = from,
                to = to,
                edges = graph.edge_count(),
                "path query cancelled while building connections"
            );
            PathOutcome::Cancelled
        }
    }
}

pub fn connected_components(graph: &Graph) -> usize {
    ConnectionGraph::from_graph(graph).connected_components()
}
