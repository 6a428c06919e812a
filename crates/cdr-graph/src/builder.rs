use std::collections::BTreeMap;

use cdr_core::{
    CallInstance, Edge, EdgeKey, IdentifierKind, Node, NodeId, NodeType, Record, Relationship,
};
use cdr_parse::EntityResolver;
use chrono::NaiveDateTime;

use crate::graph::Graph;

/// Position of a record in the folded stream: chronological first, input
/// order second.
type FoldOrder = (NaiveDateTime, u64);

#[derive(Debug, Clone)]
struct Sourced<T> {
    order: FoldOrder,
    value: T,
}

fn keep_earliest<T>(slot: &mut Option<Sourced<T>>, order: FoldOrder, value: Option<T>) {
    let Some(value) = value else {
        return;
    };
    let replace = slot
        .as_ref()
        .is_none_or(|existing| order < existing.order);
    if replace {
        *slot = Some(Sourced { order, value });
    }
}

#[derive(Debug, Clone)]
struct NodeDraft {
    node_type: NodeType,
    device_model: Option<Sourced<String>>,
    imsi: Option<Sourced<String>>,
    site_name: Option<Sourced<String>>,
    coordinates: Option<Sourced<(String, String)>>,
}

impl NodeDraft {
    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            device_model: None,
            imsi: None,
            site_name: None,
            coordinates: None,
        }
    }

    fn label(&self, id: &str) -> String {
        match self.node_type {
            NodeType::Phone => id.to_owned(),
            NodeType::Imei => {
                let mut label = format!("IMEI: {id}");
                if let Some(model) = &self.device_model {
                    label.push('\n');
                    label.push_str(&model.value);
                }
                if let Some(imsi) = &self.imsi {
                    label.push_str("\nIMSI: ");
                    label.push_str(&imsi.value);
                }
                label
            }
            NodeType::Location => {
                let mut label = format!("LOC: {id}");
                if let Some(site) = &self.site_name {
                    label.push_str(&format!(" ({})", site.value));
                }
                if let Some(coordinates) = &self.coordinates {
                    let (latitude, longitude) = &coordinates.value;
                    label.push_str(&format!("\n{latitude}, {longitude}"));
                }
                label
            }
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCall {
    order: FoldOrder,
    call: CallInstance,
}

/// Single-writer accumulator for one analysis run. Every mutation takes
/// `&mut self` and [`GraphBuilder::finish`] consumes the builder, so a
/// half-built graph can never be observed or shared.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    resolver: EntityResolver,
    nodes: BTreeMap<NodeId, NodeDraft>,
    edges: BTreeMap<EdgeKey, Vec<PendingCall>>,
    sequence: u64,
}

impl GraphBuilder {
    pub fn new(resolver: EntityResolver) -> Self {
        Self {
            resolver,
            ..Self::default()
        }
    }

    pub fn push(&mut self, record: &Record) {
        let order = (record.timestamp, self.sequence);
        self.sequence += 1;

        let Some(phone) = self
            .resolver
            .canonicalize(&record.a_number, IdentifierKind::Phone)
        else {
            tracing::debug!(sequence = order.1, "record without a-number skipped");
            return;
        };
        self.touch_node(&phone, NodeType::Phone);

        let call = CallInstance {
            date: record.timestamp,
            duration: record.duration_seconds,
            call_type: record.call_type.clone(),
        };

        if let Some(peer) = self.resolve(record.b_number.as_deref(), IdentifierKind::Phone) {
            self.touch_node(&peer, NodeType::Phone);
            self.append(
                EdgeKey::canonical(&phone, &peer, Relationship::Calls),
                order,
                &call,
            );
        }

        if let Some(imei) = self.resolve(record.imei.as_deref(), IdentifierKind::Imei) {
            if let Some(draft) = self.touch_node(&imei, NodeType::Imei) {
                keep_earliest(
                    &mut draft.device_model,
                    order,
                    record.details.imei_type.clone(),
                );
                keep_earliest(&mut draft.imsi, order, record.details.imsi.clone());
                self.append(
                    EdgeKey::canonical(&phone, &imei, Relationship::UsesDevice),
                    order,
                    &call,
                );
            }
        }

        let location = self.resolve(record.location_code.as_deref(), IdentifierKind::Location);
        if let Some(location) = location {
            if let Some(draft) = self.touch_node(&location, NodeType::Location) {
                keep_earliest(&mut draft.site_name, order, record.details.site_name.clone());
                let coordinates = record
                    .details
                    .latitude
                    .clone()
                    .zip(record.details.longitude.clone());
                keep_earliest(&mut draft.coordinates, order, coordinates);
                self.append(
                    EdgeKey::canonical(&phone, &location, Relationship::LocatedAt),
                    order,
                    &call,
                );
            }
        }
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>) {
        for record in records {
            self.push(record);
        }
    }

    pub fn finish(self) -> Graph {
        let nodes: BTreeMap<NodeId, Node> = self
            .nodes
            .into_iter()
            .map(|(id, draft)| {
                let node = Node {
                    label: draft.label(&id),
                    node_type: draft.node_type,
                    id: id.clone(),
                };
                (id, node)
            })
            .collect();

        let edges: BTreeMap<EdgeKey, Edge> = self
            .edges
            .into_iter()
            .filter(|(key, _)| endpoints_fit(&nodes, key))
            .map(|(key, mut pending)| {
                pending.sort_by(|left, right| left.order.cmp(&right.order));
                let calls = pending.into_iter().map(|entry| entry.call).collect();
                (key.clone(), Edge::new(key, calls))
            })
            .collect();

        tracing::info!(
            records = self.sequence,
            nodes = nodes.len(),
            edges = edges.len(),
            "built CDR graph"
        );

        Graph::from_parts(nodes, edges)
    }

    fn resolve(&self, raw: Option<&str>, kind: IdentifierKind) -> Option<NodeId> {
        raw.and_then(|raw| self.resolver.canonicalize(raw, kind))
    }

    /// Returns the draft only when the id belongs to `node_type`; an id
    /// already claimed by a different type keeps the first-ranked type
    /// (phone, then imei, then location).
    fn touch_node(&mut self, id: &str, node_type: NodeType) -> Option<&mut NodeDraft> {
        let draft = self
            .nodes
            .entry(id.to_owned())
            .or_insert_with(|| NodeDraft::new(node_type));

        if draft.node_type != node_type {
            tracing::warn!(
                id = id,
                existing = draft.node_type.as_str(),
                incoming = node_type.as_str(),
                "identifier resolves to two node types"
            );
            if node_type < draft.node_type {
                *draft = NodeDraft::new(node_type);
            } else {
                return None;
            }
        }

        Some(draft)
    }

    fn append(&mut self, key: EdgeKey, order: FoldOrder, call: &CallInstance) {
        self.edges.entry(key).or_default().push(PendingCall {
            order,
            call: call.clone(),
        });
    }
}

/// An id that changed type mid-build may leave edges whose endpoints no
/// longer match the relationship; those are dropped at publish time.
fn endpoints_fit(nodes: &BTreeMap<NodeId, Node>, key: &EdgeKey) -> bool {
    let source = nodes.get(&key.source).map(|node| node.node_type);
    let target = nodes.get(&key.target).map(|node| node.node_type);
    let (Some(source), Some(target)) = (source, target) else {
        return false;
    };

    let phone_and = |other: NodeType| {
        (source == NodeType::Phone && target == other)
            || (source == other && target == NodeType::Phone)
    };
    match key.relationship {
        Relationship::Calls => source == NodeType::Phone && target == NodeType::Phone,
        Relationship::UsesDevice => phone_and(NodeType::Imei),
        Relationship::LocatedAt => phone_and(NodeType::Location),
    }
}

/// Folds records with the default resolver.
pub fn build_graph<'a>(records: impl IntoIterator<Item = &'a Record>) -> Graph {
    let mut builder = GraphBuilder::default();
    builder.extend(records);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use cdr_core::RecordDetails;
    use chrono::NaiveDate;

    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 4, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp")
    }

    fn call(a: &str, b: Option<&str>, timestamp: NaiveDateTime, duration: u64) -> Record {
        Record {
            call_type: "Voice MO".to_owned(),
            a_number: a.to_owned(),
            b_number: b.map(str::to_owned),
            c_number: None,
            timestamp,
            duration_seconds: duration,
            location_code: None,
            imei: None,
            details: RecordDetails::default(),
        }
    }

    #[test]
    fn both_directions_aggregate_into_one_edge() {
        let records = vec![
            call("6285222243707", Some("628124164478"), at(12, 21, 46), 60),
            call("0812-4164478", Some("+6285222243707"), at(13, 8, 0), 30),
        ];

        let graph = build_graph(&records);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let edge = graph
            .edge_between("6285222243707", "628124164478", Relationship::Calls)
            .expect("calls edge");
        assert_eq!(edge.weight(), 2);
        assert_eq!(edge.calls().len(), 2);
        assert_eq!(edge.source(), "628124164478");
    }

    #[test]
    fn calls_are_chronological_with_input_order_tie_break() {
        let mut late = call("6285222243707", Some("628124164478"), at(14, 9, 0), 1);
        late.call_type = "late".to_owned();
        let mut tie_first = call("628124164478", Some("6285222243707"), at(12, 9, 0), 2);
        tie_first.call_type = "tie-first".to_owned();
        let mut tie_second = call("6285222243707", Some("628124164478"), at(12, 9, 0), 3);
        tie_second.call_type = "tie-second".to_owned();

        let graph = build_graph(&[late, tie_first, tie_second]);
        let edge = graph
            .edge_between("6285222243707", "628124164478", Relationship::Calls)
            .expect("calls edge");
        let order: Vec<&str> = edge
            .calls()
            .iter()
            .map(|call| call.call_type.as_str())
            .collect();
        assert_eq!(order, vec!["tie-first", "tie-second", "late"]);
    }

    #[test]
    fn absent_b_number_creates_no_calls_edge() {
        let mut record = call("6285222243707", None, at(14, 10, 29), 0);
        record.location_code = Some("09419_47092".to_owned());
        record.imei = Some("356912078685274".to_owned());

        let graph = build_graph(&[record]);

        assert_eq!(graph.node_count(), 3);
        assert!(graph.edges().all(|edge| edge.relationship() != Relationship::Calls));
        let device = graph
            .edge_between("6285222243707", "356912078685274", Relationship::UsesDevice)
            .expect("uses-device edge");
        assert_eq!(device.weight(), 1);
        assert!(
            graph
                .edge_between("6285222243707", "09419_47092", Relationship::LocatedAt)
                .is_some()
        );
    }

    #[test]
    fn device_and_location_labels_use_earliest_details() {
        let mut later = call("6285222243707", None, at(14, 10, 0), 0);
        later.imei = Some("356912078685274".to_owned());
        later.location_code = Some("09419_47092".to_owned());
        later.details.imei_type = Some("Later Phone".to_owned());
        later.details.site_name = Some("Later Site".to_owned());

        let mut earlier = call("6285222243707", None, at(12, 10, 0), 0);
        earlier.imei = Some("356912078685274".to_owned());
        earlier.location_code = Some("09419_47092".to_owned());
        earlier.details.imei_type = Some("Nokia 105".to_owned());
        earlier.details.imsi = Some("510101234567890".to_owned());
        earlier.details.site_name = Some("Plaza".to_owned());
        earlier.details.latitude = Some("-6.2".to_owned());
        earlier.details.longitude = Some("106.8".to_owned());

        let graph = build_graph(&[later, earlier]);

        let imei = graph.node("356912078685274").expect("imei node");
        assert_eq!(imei.node_type, NodeType::Imei);
        assert_eq!(
            imei.label,
            "IMEI: 356912078685274\nNokia 105\nIMSI: 510101234567890"
        );

        let location = graph.node("09419_47092").expect("location node");
        assert_eq!(location.label, "LOC: 09419_47092 (Plaza)\n-6.2, 106.8");

        let phone = graph.node("6285222243707").expect("phone node");
        assert_eq!(phone.label, "6285222243707");
    }

    #[test]
    fn build_result_is_independent_of_input_order() {
        let mut records = vec![
            call("6285222243707", Some("628124164478"), at(12, 21, 46), 60),
            call("628124164478", Some("6285222243707"), at(13, 8, 0), 30),
            call("628111111111", Some("628124164478"), at(13, 9, 0), 10),
        ];
        records[2].location_code = Some("L1".to_owned());

        let forward = build_graph(&records);
        records.reverse();
        let backward = build_graph(&records);

        assert_eq!(forward, backward);
    }

    #[test]
    fn colliding_identifier_keeps_phone_type() {
        let mut record = call("6285222243707", Some("628124164478"), at(12, 1, 0), 5);
        record.location_code = Some("628124164478".to_owned());

        let graph = build_graph(&[record.clone()]);
        let node = graph.node("628124164478").expect("node");
        assert_eq!(node.node_type, NodeType::Phone);
        assert_eq!(graph.edge_count(), 1);

        let mut location_first = call("628999999999", None, at(11, 1, 0), 5);
        location_first.location_code = Some("628124164478".to_owned());
        let graph = build_graph(&[location_first, record]);
        let node = graph.node("628124164478").expect("node");
        assert_eq!(node.node_type, NodeType::Phone);
        assert!(
            graph
                .edges()
                .all(|edge| edge.relationship() == Relationship::Calls)
        );
    }
}
