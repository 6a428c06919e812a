use std::time::Duration;

use cdr_config::QueryConfig;
use cdr_core::CancelToken;
use cdr_graph::{FilterCriteria, Graph, filter_with_cancel};
use cdr_graph_algo::{PathOutcome, shortest_path_with_cancel};

use crate::session::AnalysisError;

/// Filtered view bounded by `filter_timeout_ms`.
pub fn filter_view(
    graph: &Graph,
    criteria: &FilterCriteria,
    config: &QueryConfig,
) -> Result<Graph, AnalysisError> {
    let token = CancelToken::with_timeout(Duration::from_millis(config.filter_timeout_ms));
    Ok(filter_with_cancel(graph, criteria, &token)?)
}

/// Path query bounded by `path_timeout_ms`.
pub fn highlight_path(graph: &Graph, from: &str, to: &str, config: &QueryConfig) -> PathOutcome {
    let token = CancelToken::with_timeout(Duration::from_millis(config.path_timeout_ms));
    shortest_path_with_cancel(graph, from, to, &token)
}
