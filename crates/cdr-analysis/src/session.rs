use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use cdr_config::{CdrConfig, ConfigError};
use cdr_core::Cancelled;
use cdr_graph::{DocumentError, Graph, GraphBuilder};
use cdr_parse::{EntityResolver, ParserOptions, RejectKind, RejectedLine, parse_lines};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("graph document error: {0}")]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionSample {
    pub source: String,
    pub line_number: usize,
    pub kind: RejectKind,
    pub message: String,
}

/// Running tally of skipped lines for one analysis run. Only the first
/// `max_samples` rejections are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RejectionSummary {
    total: u64,
    by_kind: BTreeMap<RejectKind, u64>,
    samples: Vec<RejectionSample>,
    #[serde(skip)]
    max_samples: usize,
}

impl RejectionSummary {
    pub fn new(max_samples: usize) -> Self {
        Self {
            max_samples,
            ..Self::default()
        }
    }

    pub fn record(&mut self, source: &str, rejected: &RejectedLine) {
        self.total += 1;
        *self.by_kind.entry(rejected.kind()).or_default() += 1;
        if self.samples.len() < self.max_samples {
            self.samples.push(RejectionSample {
                source: source.to_owned(),
                line_number: rejected.line_number,
                kind: rejected.kind(),
                message: rejected.reason.to_string(),
            });
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, kind: RejectKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn by_kind(&self) -> &BTreeMap<RejectKind, u64> {
        &self.by_kind
    }

    pub fn samples(&self) -> &[RejectionSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub graph: Arc<Graph>,
    pub rejections: RejectionSummary,
    pub records_accepted: u64,
    pub sources: Vec<String>,
}

/// One analysis run. Files are ingested one after another into a single
/// builder; [`AnalysisSession::finish`] consumes the session and publishes
/// the graph for shared read access.
#[derive(Debug)]
pub struct AnalysisSession {
    options: ParserOptions,
    builder: GraphBuilder,
    rejections: RejectionSummary,
    records_accepted: u64,
    sources: Vec<String>,
}

impl AnalysisSession {
    pub fn new(config: &CdrConfig) -> Self {
        Self {
            options: ParserOptions::from_config(&config.parser),
            builder: GraphBuilder::new(EntityResolver::new(config.resolver.clone())),
            rejections: RejectionSummary::new(config.parser.max_rejection_samples),
            records_accepted: 0,
            sources: Vec::new(),
        }
    }

    pub fn ingest(&mut self, source: &str, content: &str) -> IngestStats {
        let mut stats = IngestStats::default();
        for parsed in parse_lines(content, self.options.clone()) {
            match parsed {
                Ok(record) => {
                    self.builder.push(&record);
                    stats.accepted += 1;
                }
                Err(rejected) => {
                    self.rejections.record(source, &rejected);
                    stats.rejected += 1;
                }
            }
        }

        self.records_accepted += stats.accepted;
        self.sources.push(source.to_owned());
        tracing::info!(
            source = source,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "ingested CDR source"
        );
        stats
    }

    /// Reads a file from disk; bytes that are not valid UTF-8 are replaced
    /// rather than failing the whole file.
    pub fn ingest_file(&mut self, path: &Path) -> Result<IngestStats, AnalysisError> {
        let bytes = fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(self.ingest(&path.display().to_string(), &content))
    }

    pub fn rejections(&self) -> &RejectionSummary {
        &self.rejections
    }

    pub fn finish(self) -> AnalysisReport {
        let graph = Arc::new(self.builder.finish());
        if !self.rejections.is_empty() {
            tracing::warn!(
                rejected = self.rejections.total(),
                malformed = self.rejections.count(RejectKind::MalformedRow),
                invalid_duration = self.rejections.count(RejectKind::InvalidDuration),
                invalid_timestamp = self.rejections.count(RejectKind::InvalidTimestamp),
                "some CDR lines were rejected"
            );
        }
        AnalysisReport {
            graph,
            rejections: self.rejections,
            records_accepted: self.records_accepted,
            sources: self.sources,
        }
    }
}

/// Single-source analysis with the given configuration.
pub fn analyze_content(config: &CdrConfig, source: &str, content: &str) -> AnalysisReport {
    let mut session = AnalysisSession::new(config);
    session.ingest(source, content);
    session.finish()
}
