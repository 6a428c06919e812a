use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;

use cdr_core::{CallInstance, CancelToken, Cancelled, Edge, EdgeKey, Node, NodeId, NodeType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::graph::Graph;

const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Inclusive calendar-day range; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, value: &NaiveDateTime) -> bool {
        let day = value.date();
        self.from.is_none_or(|from| day >= from) && self.to.is_none_or(|to| day <= to)
    }
}

/// Inclusive duration range in seconds; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DurationRange {
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
}

impl DurationRange {
    pub fn new(min: Option<u64>, max: Option<u64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, seconds: u64) -> bool {
        self.min.is_none_or(|min| seconds >= min) && self.max.is_none_or(|max| seconds <= max)
    }
}

/// Conjunctive query over a built graph. An empty `node_types` set admits
/// every type; `None` ranges and blank search text are unset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub node_types: BTreeSet<NodeType>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub duration_range: Option<DurationRange>,
    #[serde(default)]
    pub search_text: Option<String>,
    #[serde(default)]
    pub drop_isolated: bool,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty()
            && self.date_range.is_none()
            && self.duration_range.is_none()
            && self.search_needle().is_none()
            && !self.drop_isolated
    }

    fn search_needle(&self) -> Option<String> {
        self.search_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase)
    }

    fn admits_node(&self, node: &Node, needle: Option<&str>) -> bool {
        if !self.node_types.is_empty() && !self.node_types.contains(&node.node_type) {
            return false;
        }
        needle.is_none_or(|needle| {
            node.id.to_lowercase().contains(needle) || node.label.to_lowercase().contains(needle)
        })
    }

    fn filters_calls(&self) -> bool {
        self.date_range.is_some() || self.duration_range.is_some()
    }

    fn admits_call(&self, call: &CallInstance) -> bool {
        self.date_range
            .as_ref()
            .is_none_or(|range| range.contains(&call.date))
            && self
                .duration_range
                .as_ref()
                .is_none_or(|range| range.contains(call.duration))
    }
}

/// Derives a filtered view; the source graph is left untouched.
pub fn filter(graph: &Graph, criteria: &FilterCriteria) -> Graph {
    match run_filter(graph, criteria, |_| Ok::<(), Infallible>(())) {
        Ok(view) => view,
        Err(never) => match never {},
    }
}

pub fn filter_with_cancel(
    graph: &Graph,
    criteria: &FilterCriteria,
    token: &CancelToken,
) -> Result<Graph, Cancelled> {
    let filtered = run_filter(graph, criteria, |step| {
        if step % CANCEL_CHECK_INTERVAL == 0 {
            token.check()
        } else {
            Ok(())
        }
    });
    if filtered.is_err() {
        tracing::warn!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph filter cancelled"
        );
    }
    filtered
}

fn run_filter<E>(
    graph: &Graph,
    criteria: &FilterCriteria,
    checkpoint: impl Fn(usize) -> Result<(), E>,
) -> Result<Graph, E> {
    let needle = criteria.search_needle();
    let mut nodes: BTreeMap<NodeId, Node> = BTreeMap::new();
    for (step, node) in graph.nodes().enumerate() {
        checkpoint(step)?;
        if criteria.admits_node(node, needle.as_deref()) {
            nodes.insert(node.id.clone(), node.clone());
        }
    }

    let mut edges: BTreeMap<EdgeKey, Edge> = BTreeMap::new();
    for (step, edge) in graph.edges().enumerate() {
        checkpoint(step)?;
        if !nodes.contains_key(edge.source()) || !nodes.contains_key(edge.target()) {
            continue;
        }

        if !criteria.filters_calls() {
            edges.insert(edge.key().clone(), edge.clone());
            continue;
        }

        let calls: Vec<CallInstance> = edge
            .calls()
            .iter()
            .filter(|call| criteria.admits_call(call))
            .cloned()
            .collect();
        if !calls.is_empty() {
            edges.insert(edge.key().clone(), edge.with_calls(calls));
        }
    }

    if criteria.drop_isolated {
        let connected: BTreeSet<&str> = edges
            .keys()
            .flat_map(|key| [key.source.as_str(), key.target.as_str()])
            .collect();
        nodes.retain(|id, _| connected.contains(id.as_str()));
    }

    Ok(Graph::from_parts(nodes, edges))
}
