use std::cmp::Ordering;
use std::collections::VecDeque;

use cdr_core::{CancelToken, Cancelled, NodeId};
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::connection::{Checkpoint, ConnectionGraph};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightedPath {
    pub nodes: Vec<NodeId>,
    /// Weakest link along the route; zero for a single-node path.
    pub bottleneck_weight: u64,
    pub total_weight: u64,
}

impl HighlightedPath {
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

/// Result of a path query. Absent endpoints and disconnected endpoints are
/// statuses, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PathOutcome {
    Found(HighlightedPath),
    NodeNotFound { id: NodeId },
    Disconnected,
    Cancelled,
}

impl PathOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NodeNotFound { .. } => "node_not_found",
            Self::Disconnected => "disconnected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn path(&self) -> Option<&HighlightedPath> {
        match self {
            Self::Found(path) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Route {
    total: u64,
    nodes: Vec<NodeIndex>,
}

impl ConnectionGraph {
    /// Minimum-hop path between two nodes. Among equally short paths the one
    /// with the strongest weakest link wins, then the highest weight sum,
    /// then the lexicographically smallest node-id sequence.
    pub fn shortest_path(&self, from: &str, to: &str, token: Option<&CancelToken>) -> PathOutcome {
        let Some(start) = self.index(from) else {
            return PathOutcome::NodeNotFound { id: from.to_owned() };
        };
        let Some(goal) = self.index(to) else {
            return PathOutcome::NodeNotFound { id: to.to_owned() };
        };
        if start == goal {
            return PathOutcome::Found(HighlightedPath {
                nodes: vec![from.to_owned()],
                bottleneck_weight: 0,
                total_weight: 0,
            });
        }

        let mut checkpoint = Checkpoint::new(token);
        match self.search(start, goal, &mut checkpoint) {
            Ok(Some(path)) => PathOutcome::Found(path),
            Ok(None) => PathOutcome::Disconnected,
            Err(Cancelled) => {
                tracing::warn!(
                    from = from,
                    to = to,
                    steps = checkpoint.steps,
                    "path query cancelled"
                );
                PathOutcome::Cancelled
            }
        }
    }

    fn search(
        &self,
        start: NodeIndex,
        goal: NodeIndex,
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<Option<HighlightedPath>, Cancelled> {
        let size = self.node_count();
        let mut distance: Vec<Option<usize>> = vec![None; size];
        let mut expanded = Vec::new();
        let mut queue = VecDeque::new();
        distance[start.index()] = Some(0);
        queue.push_back((start, 0_usize));

        while let Some((node, depth)) = queue.pop_front() {
            checkpoint.step()?;
            if distance[goal.index()].is_some_and(|goal_depth| depth >= goal_depth) {
                break;
            }
            expanded.push(node);
            for (next, _) in self.links(node) {
                if distance[next.index()].is_none() {
                    distance[next.index()] = Some(depth + 1);
                    queue.push_back((next, depth + 1));
                }
            }
        }

        if distance[goal.index()].is_none() {
            return Ok(None);
        }

        // Restrict to nodes lying on some shortest route into the goal.
        let mut on_route = vec![false; size];
        on_route[goal.index()] = true;
        let mut backlog = VecDeque::from([goal]);
        while let Some(node) = backlog.pop_front() {
            checkpoint.step()?;
            let Some(depth) = distance[node.index()].filter(|depth| *depth > 0) else {
                continue;
            };
            for (previous, _) in self.links(node) {
                if distance[previous.index()] == Some(depth - 1) && !on_route[previous.index()] {
                    on_route[previous.index()] = true;
                    backlog.push_back(previous);
                }
            }
        }

        let route: Vec<NodeIndex> = expanded
            .into_iter()
            .filter(|node| on_route[node.index()])
            .collect();
        let forward = |node: NodeIndex, next: NodeIndex| {
            on_route[next.index()]
                && distance[next.index()]
                    .zip(distance[node.index()])
                    .is_some_and(|(next_depth, depth)| next_depth == depth + 1)
        };

        let mut strongest: Vec<Option<u64>> = vec![None; size];
        strongest[start.index()] = Some(u64::MAX);
        for &node in &route {
            checkpoint.step()?;
            let reach = strongest[node.index()];
            for (next, weight) in self.links(node) {
                if !forward(node, next) {
                    continue;
                }
                let candidate = reach.map(|reach| reach.min(weight));
                if candidate > strongest[next.index()] {
                    strongest[next.index()] = candidate;
                }
            }
        }
        let Some(floor) = strongest[goal.index()] else {
            return Ok(None);
        };

        let mut best: Vec<Option<Route>> = vec![None; size];
        best[start.index()] = Some(Route {
            total: 0,
            nodes: vec![start],
        });
        for &node in &route {
            checkpoint.step()?;
            let Some(current) = best[node.index()].clone() else {
                continue;
            };
            for (next, weight) in self.links(node) {
                if weight < floor || !forward(node, next) {
                    continue;
                }
                let total = current.total.saturating_add(weight);
                let replace = match &best[next.index()] {
                    None => true,
                    Some(existing) => {
                        let prefix = &existing.nodes[..existing.nodes.len() - 1];
                        total > existing.total
                            || (total == existing.total
                                && self.compare_ids(&current.nodes, prefix) == Ordering::Less)
                    }
                };
                if replace {
                    let mut nodes = current.nodes.clone();
                    nodes.push(next);
                    best[next.index()] = Some(Route { total, nodes });
                }
            }
        }

        Ok(best[goal.index()].take().map(|route| HighlightedPath {
            nodes: route
                .nodes
                .iter()
                .map(|node| self.id(*node).to_owned())
                .collect(),
            bottleneck_weight: floor,
            total_weight: route.total,
        }))
    }

    fn compare_ids(&self, left: &[NodeIndex], right: &[NodeIndex]) -> Ordering {
        left.iter()
            .map(|node| self.id(*node))
            .cmp(right.iter().map(|node| self.id(*node)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use cdr_core::{NodeType, Relationship};
    use cdr_graph::{CallDocument, EdgeDocument, Graph, GraphDocument, NodeDocument};

    use crate::{connected_components, shortest_path, shortest_path_with_cancel};

    use super::*;

    fn graph_of(isolated: &[&str], links: &[(&str, &str, u64)]) -> Graph {
        let ids: BTreeSet<&str> = links
            .iter()
            .flat_map(|(a, b, _)| [*a, *b])
            .chain(isolated.iter().copied())
            .collect();
        let document = GraphDocument {
            nodes: ids
                .into_iter()
                .map(|id| NodeDocument {
                    id: id.to_owned(),
                    label: id.to_owned(),
                    node_type: NodeType::Phone,
                })
                .collect(),
            edges: links
                .iter()
                .map(|(a, b, weight)| EdgeDocument {
                    source: (*a).to_owned(),
                    target: (*b).to_owned(),
                    weight: *weight,
                    relationship: Relationship::Calls,
                    calls: (0..*weight)
                        .map(|duration| CallDocument {
                            date: "2018-04-12T09:00:00".to_owned(),
                            duration,
                            call_type: "Voice MO".to_owned(),
                        })
                        .collect(),
                })
                .collect(),
        };
        Graph::from_document(&document).expect("valid document")
    }

    fn found(outcome: PathOutcome) -> HighlightedPath {
        match outcome {
            PathOutcome::Found(path) => path,
            other => panic!("expected a path, got {other:?}"),
        }
    }

    #[test]
    fn direct_edge_beats_longer_chain() {
        let graph = graph_of(&[], &[("A", "B", 9), ("B", "C", 9), ("C", "D", 9), ("A", "D", 1)]);

        let path = found(shortest_path(&graph, "A", "D"));
        assert_eq!(path.nodes, vec!["A", "D"]);
        assert_eq!(path.hops(), 1);
        assert_eq!(path.bottleneck_weight, 1);
    }

    #[test]
    fn strongest_weakest_link_wins_ties() {
        let graph = graph_of(&[], &[("A", "B", 10), ("B", "D", 1), ("A", "C", 3), ("C", "D", 3)]);

        let path = found(shortest_path(&graph, "A", "D"));
        assert_eq!(path.nodes, vec!["A", "C", "D"]);
        assert_eq!(path.bottleneck_weight, 3);
        assert_eq!(path.total_weight, 6);
    }

    #[test]
    fn weight_sum_then_node_ids_break_remaining_ties() {
        let graph = graph_of(&[], &[("A", "B", 2), ("B", "D", 5), ("A", "C", 2), ("C", "D", 3)]);
        let path = found(shortest_path(&graph, "A", "D"));
        assert_eq!(path.nodes, vec!["A", "B", "D"]);
        assert_eq!(path.total_weight, 7);

        let graph = graph_of(&[], &[("A", "C", 1), ("C", "D", 1), ("A", "B", 1), ("B", "D", 1)]);
        let path = found(shortest_path(&graph, "A", "D"));
        assert_eq!(path.nodes, vec!["A", "B", "D"]);

        let path = found(shortest_path(&graph, "D", "A"));
        assert_eq!(path.nodes, vec!["D", "B", "A"]);
    }

    #[test]
    fn tie_breaks_hold_across_several_layers() {
        let graph = graph_of(
            &[],
            &[
                ("S", "A", 4),
                ("S", "B", 4),
                ("A", "C", 1),
                ("B", "C", 4),
                ("A", "X", 4),
                ("C", "T", 4),
                ("X", "T", 4),
            ],
        );

        let path = found(shortest_path(&graph, "S", "T"));
        assert_eq!(path.nodes, vec!["S", "A", "X", "T"]);
        assert_eq!(path.bottleneck_weight, 4);
        assert_eq!(path.total_weight, 12);
    }

    #[test]
    fn missing_and_disconnected_nodes_are_distinguished() {
        let graph = graph_of(&["E"], &[("A", "B", 1)]);

        assert_eq!(
            shortest_path(&graph, "A", "Z"),
            PathOutcome::NodeNotFound { id: "Z".to_owned() }
        );
        assert_eq!(
            shortest_path(&graph, "Q", "A"),
            PathOutcome::NodeNotFound { id: "Q".to_owned() }
        );
        assert_eq!(shortest_path(&graph, "A", "E"), PathOutcome::Disconnected);
    }

    #[test]
    fn path_to_self_is_a_single_node() {
        let graph = graph_of(&[], &[("A", "B", 1)]);
        let path = found(shortest_path(&graph, "A", "A"));
        assert_eq!(path.nodes, vec!["A"]);
        assert_eq!(path.hops(), 0);
    }

    #[test]
    fn cancelled_token_stops_search() {
        let graph = graph_of(&[], &[("A", "B", 1), ("B", "C", 1)]);
        let token = CancelToken::new();
        token.cancel();

        let outcome = shortest_path_with_cancel(&graph, "A", "C", &token);
        assert_eq!(outcome, PathOutcome::Cancelled);
        assert_eq!(outcome.as_str(), "cancelled");
    }

    fn hub_graph(peers: usize) -> Graph {
        let peer_ids: Vec<String> = (0..peers).map(|n| format!("6282{n:09}")).collect();
        let links: Vec<(&str, &str, u64)> = peer_ids
            .iter()
            .map(|peer| ("6281000000000", peer.as_str(), 1))
            .collect();
        graph_of(&[], &links)
    }

    #[test]
    fn busy_hub_path_completes_within_deadline() {
        let graph = hub_graph(20_000);
        let connections = ConnectionGraph::from_graph(&graph);
        assert_eq!(connections.link_count(), 20_000);
        assert_eq!(connections.node_count(), 20_001);

        let token = CancelToken::with_timeout(Duration::from_secs(5));
        let path = found(shortest_path_with_cancel(
            &graph,
            "6282000000000",
            "6282000019999",
            &token,
        ));
        assert_eq!(
            path.nodes,
            vec!["6282000000000", "6281000000000", "6282000019999"]
        );

        let reused = connections.shortest_path("6282000000001", "6282000000002", Some(&token));
        assert_eq!(found(reused).hops(), 2);
    }

    #[test]
    fn expired_deadline_stops_connection_build() {
        let graph = hub_graph(2_000);
        let token = CancelToken::with_timeout(Duration::ZERO);

        assert!(matches!(
            ConnectionGraph::from_graph_with_cancel(&graph, &token),
            Err(Cancelled)
        ));
        assert_eq!(
            shortest_path_with_cancel(&graph, "6282000000000", "6282000000001", &token),
            PathOutcome::Cancelled
        );
    }

    #[test]
    fn parallel_relationships_merge_into_one_link() {
        let mut document = graph_of(&[], &[("A", "B", 2)]).to_document();
        document.edges.push(EdgeDocument {
            relationship: Relationship::LocatedAt,
            ..document.edges[0].clone()
        });
        let graph = Graph::from_document(&document).expect("valid document");
        assert_eq!(graph.edge_count(), 2);

        let connections = ConnectionGraph::from_graph(&graph);
        assert_eq!(connections.link_count(), 1);
        assert_eq!(found(shortest_path(&graph, "A", "B")).total_weight, 4);
    }

    #[test]
    fn components_count_isolated_nodes() {
        let graph = graph_of(&["E"], &[("A", "B", 1), ("C", "D", 2)]);
        assert_eq!(connected_components(&graph), 3);
        assert_eq!(connected_components(&Graph::default()), 0);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let graph = graph_of(&[], &[("A", "B", 2)]);
        let json = serde_json::to_value(shortest_path(&graph, "A", "B")).expect("json");
        assert_eq!(json["status"], "found");
        assert_eq!(json["nodes"], serde_json::json!(["A", "B"]));

        let json = serde_json::to_value(PathOutcome::Disconnected).expect("json");
        assert_eq!(json, serde_json::json!({ "status": "disconnected" }));
    }
}
