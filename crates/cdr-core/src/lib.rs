use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

mod cancel;

pub use cancel::{CancelToken, Cancelled};

pub type NodeId = String;

pub const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Phone,
    Imei,
    Location,
}

/// Identifier slots of a record resolve to exactly one node type each.
pub type IdentifierKind = NodeType;

impl NodeType {
    pub const ALL: [NodeType; 3] = [Self::Phone, Self::Imei, Self::Location];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Imei => "imei",
            Self::Location => "location",
        }
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "phone" => Ok(Self::Phone),
            "imei" => Ok(Self::Imei),
            "location" => Ok(Self::Location),
            other => Err(format!(
                "invalid node type '{other}', expected one of: phone, imei, location"
            )),
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "kebab-case")]
pub enum Relationship {
    Calls,
    UsesDevice,
    LocatedAt,
}

impl Relationship {
    pub const ALL: [Relationship; 3] = [Self::Calls, Self::UsesDevice, Self::LocatedAt];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calls => "calls",
            Self::UsesDevice => "uses-device",
            Self::LocatedAt => "located-at",
        }
    }
}

impl std::str::FromStr for Relationship {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "calls" => Ok(Self::Calls),
            "uses-device" => Ok(Self::UsesDevice),
            "located-at" => Ok(Self::LocatedAt),
            other => Err(format!(
                "invalid relationship '{other}', expected one of: calls, uses-device, located-at"
            )),
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
}

/// Identity of an aggregated edge. `source <= target` always holds, so both
/// call directions between a pair land on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: NodeId,
    pub target: NodeId,
    pub relationship: Relationship,
}

impl EdgeKey {
    pub fn canonical(a: &str, b: &str, relationship: Relationship) -> Self {
        let (source, target) = if a <= b { (a, b) } else { (b, a) };
        Self {
            source: source.to_owned(),
            target: target.to_owned(),
            relationship,
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.source <= self.target
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallInstance {
    pub date: NaiveDateTime,
    pub duration: u64,
    pub call_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    key: EdgeKey,
    calls: Vec<CallInstance>,
}

impl Edge {
    pub fn new(key: EdgeKey, calls: Vec<CallInstance>) -> Self {
        Self { key, calls }
    }

    pub fn key(&self) -> &EdgeKey {
        &self.key
    }

    pub fn source(&self) -> &str {
        &self.key.source
    }

    pub fn target(&self) -> &str {
        &self.key.target
    }

    pub fn relationship(&self) -> Relationship {
        self.key.relationship
    }

    pub fn calls(&self) -> &[CallInstance] {
        &self.calls
    }

    /// Count of contributing calls; derived so it can never drift from `calls`.
    pub fn weight(&self) -> u64 {
        self.calls.len() as u64
    }

    pub fn with_calls(&self, calls: Vec<CallInstance>) -> Self {
        Self {
            key: self.key.clone(),
            calls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordDetails {
    pub imei_type: Option<String>,
    pub imsi: Option<String>,
    pub site_name: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub call_type: String,
    pub a_number: String,
    pub b_number: Option<String>,
    pub c_number: Option<String>,
    pub timestamp: NaiveDateTime,
    pub duration_seconds: u64,
    pub location_code: Option<String>,
    pub imei: Option<String>,
    #[serde(default)]
    pub details: RecordDetails,
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(ISO_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_iso_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), ISO_TIMESTAMP_FORMAT).ok()
}
