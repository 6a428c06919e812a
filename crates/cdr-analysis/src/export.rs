use std::fs;
use std::path::{Path, PathBuf};

use cdr_graph::{Graph, GraphDocument};

use crate::session::AnalysisError;

pub const NODES_CSV_HEADER: &str = "id,label,type";
pub const EDGES_CSV_HEADER: &str = "source,target,weight,relationship,call_count";

pub const NODES_CSV_FILE: &str = "nodes.csv";
pub const EDGES_CSV_FILE: &str = "edges.csv";
pub const GRAPH_JSON_FILE: &str = "graph.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularExport {
    pub nodes_csv: String,
    pub edges_csv: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub nodes_csv: PathBuf,
    pub edges_csv: PathBuf,
    pub graph_json: PathBuf,
}

/// Rows follow graph iteration order (ascending ids and edge keys), so equal
/// graphs export identical bytes.
pub fn export_tabular(graph: &Graph) -> TabularExport {
    let mut nodes_csv = String::new();
    push_row(&mut nodes_csv, &[NODES_CSV_HEADER]);
    for node in graph.nodes() {
        push_row(
            &mut nodes_csv,
            &[
                &csv_field(&node.id),
                &csv_field(&node.label),
                node.node_type.as_str(),
            ],
        );
    }

    let mut edges_csv = String::new();
    push_row(&mut edges_csv, &[EDGES_CSV_HEADER]);
    for edge in graph.edges() {
        push_row(
            &mut edges_csv,
            &[
                &csv_field(edge.source()),
                &csv_field(edge.target()),
                &edge.weight().to_string(),
                edge.relationship().as_str(),
                &edge.calls().len().to_string(),
            ],
        );
    }

    TabularExport {
        nodes_csv,
        edges_csv,
    }
}

pub fn export_json(graph: &Graph) -> GraphDocument {
    graph.to_document()
}

pub fn export_json_string(graph: &Graph) -> Result<String, AnalysisError> {
    Ok(export_json(graph).to_json_pretty()?)
}

/// Content hash of the compact JSON form; equal graphs share a fingerprint.
pub fn document_fingerprint(document: &GraphDocument) -> Result<String, AnalysisError> {
    let bytes = serde_json::to_vec(document)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

pub fn write_export_files(out_dir: &Path, graph: &Graph) -> Result<ExportPaths, AnalysisError> {
    fs::create_dir_all(out_dir)?;
    let tabular = export_tabular(graph);
    let paths = ExportPaths {
        nodes_csv: out_dir.join(NODES_CSV_FILE),
        edges_csv: out_dir.join(EDGES_CSV_FILE),
        graph_json: out_dir.join(GRAPH_JSON_FILE),
    };

    fs::write(&paths.nodes_csv, tabular.nodes_csv)?;
    fs::write(&paths.edges_csv, tabular.edges_csv)?;
    fs::write(&paths.graph_json, export_json_string(graph)?)?;
    tracing::info!(
        out_dir = %out_dir.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "wrote graph export files"
    );
    Ok(paths)
}

fn push_row(out: &mut String, fields: &[&str]) {
    out.push_str(&fields.join(","));
    out.push('\n');
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}
