use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cdr_analysis::{
    AnalysisReport, AnalysisSession, export_json_string, export_tabular, filter_view,
    highlight_path, summarize, write_export_files,
};
use cdr_config::{CdrConfig, ensure_workspace_config};
use cdr_core::{NodeId, NodeType};
use cdr_graph::Graph;
use cdr_graph_algo::PathOutcome;
use cdr_parse::EntityResolver;

use crate::cli::{AnalyzeArgs, FilterArgs, OutputFormat, PathArgs, SummaryArgs};

pub fn run_init(workspace: &Path, out: &mut dyn Write) -> Result<()> {
    ensure_workspace_config(workspace).with_context(|| {
        format!(
            "failed to create workspace config under {}",
            workspace.display()
        )
    })?;
    writeln!(out, "{}", cdr_config::config_path(workspace).display())?;
    Ok(())
}

pub fn load_report(config: &CdrConfig, files: &[PathBuf]) -> Result<AnalysisReport> {
    let mut session = AnalysisSession::new(config);
    for file in files {
        session
            .ingest_file(file)
            .with_context(|| format!("failed to read CDR file {}", file.display()))?;
    }

    let report = session.finish();
    eprintln!(
        "CDRD: accepted={} rejected={} sources={}",
        report.records_accepted,
        report.rejections.total(),
        report.sources.len()
    );
    for sample in report.rejections.samples() {
        eprintln!(
            "CDRD: rejected {}:{} {}: {}",
            sample.source,
            sample.line_number,
            sample.kind.as_str(),
            sample.message
        );
    }
    Ok(report)
}

fn filtered(report: &AnalysisReport, filter: &FilterArgs, config: &CdrConfig) -> Result<Graph> {
    let criteria = filter.criteria()?;
    filter_view(&report.graph, &criteria, &config.query).context("graph filter did not complete")
}

pub fn run_analyze(config: &CdrConfig, args: &AnalyzeArgs, out: &mut dyn Write) -> Result<()> {
    let report = load_report(config, &args.files)?;
    let view = filtered(&report, &args.filter, config)?;

    if let Some(out_dir) = &args.out_dir {
        let paths = write_export_files(out_dir, &view)
            .with_context(|| format!("failed to write export files to {}", out_dir.display()))?;
        for path in [&paths.nodes_csv, &paths.edges_csv, &paths.graph_json] {
            writeln!(out, "{}", path.display())?;
        }
        return Ok(());
    }

    match args.output {
        OutputFormat::Json => {
            writeln!(out, "{}", export_json_string(&view)?)?;
        }
        OutputFormat::Csv => {
            let tabular = export_tabular(&view);
            write!(out, "{}", tabular.nodes_csv)?;
            writeln!(out)?;
            write!(out, "{}", tabular.edges_csv)?;
        }
        OutputFormat::Summary => {
            let flat = summarize(&view).to_flat_map();
            writeln!(out, "{}", serde_json::to_string_pretty(&flat)?)?;
        }
    }
    Ok(())
}

pub fn run_summary(config: &CdrConfig, args: &SummaryArgs, out: &mut dyn Write) -> Result<()> {
    let report = load_report(config, &args.files)?;
    let view = filtered(&report, &args.filter, config)?;
    let summary = summarize(&view);

    let rendered = if args.flat {
        serde_json::to_string_pretty(&summary.to_flat_map())?
    } else {
        serde_json::to_string_pretty(&summary)?
    };
    writeln!(out, "{rendered}")?;
    Ok(())
}

pub fn run_path(config: &CdrConfig, args: &PathArgs, out: &mut dyn Write) -> Result<PathOutcome> {
    let report = load_report(config, &args.files)?;
    let view = filtered(&report, &args.filter, config)?;

    let resolver = EntityResolver::new(config.resolver.clone());
    let from = resolve_node(&view, &resolver, &args.from);
    let to = resolve_node(&view, &resolver, &args.to);

    let mut query = config.query.clone();
    if let Some(timeout_ms) = args.timeout_ms {
        query.path_timeout_ms = timeout_ms;
    }
    let outcome = highlight_path(&view, &from, &to, &query);
    tracing::info!(
        from = %from,
        to = %to,
        status = outcome.as_str(),
        "path query finished"
    );
    writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?;
    Ok(outcome)
}

/// Accepts either a node id as it appears in the graph or a raw identifier
/// that canonicalizes to one.
fn resolve_node(graph: &Graph, resolver: &EntityResolver, raw: &str) -> NodeId {
    let trimmed = raw.trim();
    if graph.contains_node(trimmed) {
        return trimmed.to_owned();
    }
    NodeType::ALL
        .iter()
        .filter_map(|kind| resolver.canonicalize(trimmed, *kind))
        .find(|id| graph.contains_node(id))
        .unwrap_or_else(|| trimmed.to_owned())
}
