use std::collections::BTreeMap;

use cdr_core::{NodeType, Relationship, format_timestamp};
use cdr_graph::Graph;
use serde::Serialize;
use serde_json::{Value, json};

pub const TOP_PHONES_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationStats {
    pub min: u64,
    pub max: u64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub first: String,
    pub last: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhoneActivity {
    pub id: String,
    pub call_weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    pub edges_by_relationship: BTreeMap<Relationship, usize>,
    pub total_calls: u64,
    pub duration: Option<DurationStats>,
    pub date_span: Option<DateSpan>,
    pub connected_components: usize,
    pub top_phones: Vec<PhoneActivity>,
}

/// Call volume and durations come from `calls` edges only, since every
/// record also contributes to its device and location edges. The date span
/// covers every call on every edge.
pub fn summarize(graph: &Graph) -> Summary {
    let mut nodes_by_type: BTreeMap<NodeType, usize> =
        NodeType::ALL.iter().map(|kind| (*kind, 0)).collect();
    for node in graph.nodes() {
        *nodes_by_type.entry(node.node_type).or_default() += 1;
    }

    let mut edges_by_relationship: BTreeMap<Relationship, usize> =
        Relationship::ALL.iter().map(|kind| (*kind, 0)).collect();
    let mut durations = Vec::new();
    let mut call_weight: BTreeMap<&str, u64> = BTreeMap::new();
    for edge in graph.edges() {
        *edges_by_relationship.entry(edge.relationship()).or_default() += 1;
        if edge.relationship() != Relationship::Calls {
            continue;
        }
        durations.extend(edge.calls().iter().map(|call| call.duration));
        for endpoint in [edge.source(), edge.target()] {
            *call_weight.entry(endpoint).or_default() += edge.weight();
        }
        if edge.source() == edge.target() {
            // Self-calls count once.
            *call_weight.entry(edge.source()).or_default() -= edge.weight();
        }
    }

    let mut top_phones: Vec<PhoneActivity> = call_weight
        .into_iter()
        .map(|(id, call_weight)| PhoneActivity {
            id: id.to_owned(),
            call_weight,
        })
        .collect();
    top_phones.sort_by(|left, right| {
        right
            .call_weight
            .cmp(&left.call_weight)
            .then_with(|| left.id.cmp(&right.id))
    });
    top_phones.truncate(TOP_PHONES_LIMIT);

    let call_dates = || graph.edges().flat_map(|edge| edge.calls()).map(|call| call.date);
    let first = call_dates().min();
    let last = call_dates().max();

    Summary {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        nodes_by_type,
        edges_by_relationship,
        total_calls: durations.len() as u64,
        duration: duration_stats(durations),
        date_span: first.zip(last).map(|(first, last)| DateSpan {
            first: format_timestamp(&first),
            last: format_timestamp(&last),
        }),
        connected_components: cdr_graph_algo::connected_components(graph),
        top_phones,
    }
}

fn duration_stats(mut durations: Vec<u64>) -> Option<DurationStats> {
    durations.sort_unstable();
    let min = *durations.first()?;
    let max = *durations.last()?;
    let middle = durations.len() / 2;
    let median = if durations.len() % 2 == 0 {
        (durations[middle - 1] as f64 + durations[middle] as f64) / 2.0
    } else {
        durations[middle] as f64
    };
    Some(DurationStats { min, max, median })
}

impl Summary {
    /// Flat key-value rendering for tabular summary export. Absent
    /// statistics map to `null`.
    pub fn to_flat_map(&self) -> BTreeMap<String, Value> {
        let mut flat = BTreeMap::new();
        flat.insert("node_count".to_owned(), json!(self.node_count));
        flat.insert("edge_count".to_owned(), json!(self.edge_count));
        for (kind, count) in &self.nodes_by_type {
            flat.insert(format!("nodes.{}", kind.as_str()), json!(count));
        }
        for (kind, count) in &self.edges_by_relationship {
            flat.insert(format!("edges.{}", kind.as_str()), json!(count));
        }
        flat.insert("total_calls".to_owned(), json!(self.total_calls));

        let duration = self.duration.as_ref();
        flat.insert(
            "duration.min".to_owned(),
            json!(duration.map(|stats| stats.min)),
        );
        flat.insert(
            "duration.max".to_owned(),
            json!(duration.map(|stats| stats.max)),
        );
        flat.insert(
            "duration.median".to_owned(),
            json!(duration.map(|stats| stats.median)),
        );

        let span = self.date_span.as_ref();
        flat.insert("date.first".to_owned(), json!(span.map(|span| &span.first)));
        flat.insert("date.last".to_owned(), json!(span.map(|span| &span.last)));
        flat.insert(
            "connected_components".to_owned(),
            json!(self.connected_components),
        );
        for (rank, phone) in self.top_phones.iter().enumerate() {
            flat.insert(
                format!("top_phone.{}", rank + 1),
                json!(format!("{} ({})", phone.id, phone.call_weight)),
            );
        }
        flat
    }
}
