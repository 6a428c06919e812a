use std::collections::BTreeMap;

use cdr_core::{
    CallInstance, Edge, EdgeKey, Node, NodeId, NodeType, Relationship, format_timestamp,
    parse_iso_timestamp,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::Graph;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate node id '{id}'")]
    DuplicateNode { id: NodeId },
    #[error("duplicate {relationship} edge between '{source_id}' and '{target_id}'")]
    DuplicateEdge {
        source_id: NodeId,
        target_id: NodeId,
        relationship: Relationship,
    },
    #[error("edge endpoint '{id}' is not a node")]
    UnknownEndpoint { id: NodeId },
    #[error("edge '{source_id}' - '{target_id}' has weight {weight} but {calls} calls")]
    WeightMismatch {
        source_id: NodeId,
        target_id: NodeId,
        weight: u64,
        calls: usize,
    },
    #[error("invalid call date '{value}'")]
    InvalidDate { value: String },
}

/// Portable node/edge shape handed to visualization and export layers.
/// Field order is fixed so serialization is byte-stable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDocument {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: u64,
    pub relationship: Relationship,
    #[serde(default)]
    pub calls: Vec<CallDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDocument {
    pub date: String,
    pub duration: u64,
    pub call_type: String,
}

impl GraphDocument {
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(input)?)
    }
}

impl From<&CallInstance> for CallDocument {
    fn from(call: &CallInstance) -> Self {
        Self {
            date: format_timestamp(&call.date),
            duration: call.duration,
            call_type: call.call_type.clone(),
        }
    }
}

impl Graph {
    pub fn to_document(&self) -> GraphDocument {
        let nodes = self
            .nodes()
            .map(|node| NodeDocument {
                id: node.id.clone(),
                label: node.label.clone(),
                node_type: node.node_type,
            })
            .collect();
        let edges = self
            .edges()
            .map(|edge| EdgeDocument {
                source: edge.source().to_owned(),
                target: edge.target().to_owned(),
                weight: edge.weight(),
                relationship: edge.relationship(),
                calls: edge.calls().iter().map(CallDocument::from).collect(),
            })
            .collect();
        GraphDocument { nodes, edges }
    }

    /// Rebuilds a graph from a stored document. Edges are re-oriented onto
    /// their canonical key; calls keep document order after a stable
    /// chronological sort.
    pub fn from_document(document: &GraphDocument) -> Result<Self, DocumentError> {
        let mut nodes = BTreeMap::new();
        for entry in &document.nodes {
            let node = Node {
                id: entry.id.clone(),
                node_type: entry.node_type,
                label: entry.label.clone(),
            };
            if nodes.insert(entry.id.clone(), node).is_some() {
                return Err(DocumentError::DuplicateNode {
                    id: entry.id.clone(),
                });
            }
        }

        let mut edges = BTreeMap::new();
        for entry in &document.edges {
            for endpoint in [&entry.source, &entry.target] {
                if !nodes.contains_key(endpoint) {
                    return Err(DocumentError::UnknownEndpoint {
                        id: endpoint.clone(),
                    });
                }
            }
            if entry.weight != entry.calls.len() as u64 {
                return Err(DocumentError::WeightMismatch {
                    source_id: entry.source.clone(),
                    target_id: entry.target.clone(),
                    weight: entry.weight,
                    calls: entry.calls.len(),
                });
            }

            let mut calls = entry
                .calls
                .iter()
                .map(|call| {
                    let date = parse_iso_timestamp(&call.date).ok_or_else(|| {
                        DocumentError::InvalidDate {
                            value: call.date.clone(),
                        }
                    })?;
                    Ok(CallInstance {
                        date,
                        duration: call.duration,
                        call_type: call.call_type.clone(),
                    })
                })
                .collect::<Result<Vec<_>, DocumentError>>()?;
            calls.sort_by_key(|call| call.date);

            let key = EdgeKey::canonical(&entry.source, &entry.target, entry.relationship);
            if edges.contains_key(&key) {
                return Err(DocumentError::DuplicateEdge {
                    source_id: key.source,
                    target_id: key.target,
                    relationship: key.relationship,
                });
            }
            edges.insert(key.clone(), Edge::new(key, calls));
        }

        Ok(Self::from_parts(nodes, edges))
    }
}
