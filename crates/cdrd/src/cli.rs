use std::ffi::OsStr;
use std::path::PathBuf;

use anyhow::{Result, bail};
use cdr_core::NodeType;
use cdr_graph::{DateRange, DurationRange, FilterCriteria};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Summary,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "summary" => Ok(Self::Summary),
            other => Err(format!(
                "invalid output format '{other}', expected one of: json, csv, summary"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Args)]
pub struct FilterArgs {
    #[arg(
        long = "node-type",
        value_delimiter = ',',
        value_parser = parse_node_type,
        value_name = "TYPE",
        help = "Keep only these node types: phone, imei, location"
    )]
    pub node_types: Vec<NodeType>,

    #[arg(long, value_parser = parse_date, help = "First call day to keep (YYYY-MM-DD)")]
    pub from_date: Option<NaiveDate>,

    #[arg(long, value_parser = parse_date, help = "Last call day to keep (YYYY-MM-DD)")]
    pub to_date: Option<NaiveDate>,

    #[arg(long, help = "Minimum call duration in seconds")]
    pub min_duration: Option<u64>,

    #[arg(long, help = "Maximum call duration in seconds")]
    pub max_duration: Option<u64>,

    #[arg(long, help = "Case-insensitive substring match on node id or label")]
    pub search: Option<String>,

    #[arg(long, help = "Drop nodes left without edges after filtering")]
    pub drop_isolated: bool,
}

impl FilterArgs {
    pub fn criteria(&self) -> Result<FilterCriteria> {
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                bail!("--from-date {from} is after --to-date {to}");
            }
        }
        if let (Some(min), Some(max)) = (self.min_duration, self.max_duration) {
            if min > max {
                bail!("--min-duration {min} is greater than --max-duration {max}");
            }
        }

        let date_range = (self.from_date.is_some() || self.to_date.is_some())
            .then(|| DateRange::new(self.from_date, self.to_date));
        let duration_range = (self.min_duration.is_some() || self.max_duration.is_some())
            .then(|| DurationRange::new(self.min_duration, self.max_duration));

        Ok(FilterCriteria {
            node_types: self.node_types.iter().copied().collect(),
            date_range,
            duration_range,
            search_text: self.search.clone(),
            drop_isolated: self.drop_isolated,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AnalyzeArgs {
    #[arg(required = true, help = "CDR files, ingested in the given order")]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(
        long,
        default_value = "json",
        value_parser = parse_output_format,
        help = "Output format: json, csv, or summary"
    )]
    pub output: OutputFormat,

    #[arg(
        long,
        help = "Write nodes.csv, edges.csv and graph.json into this directory instead of stdout"
    )]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct PathArgs {
    #[arg(required = true, help = "CDR files, ingested in the given order")]
    pub files: Vec<PathBuf>,

    #[arg(long, help = "Start node id or raw phone number")]
    pub from: String,

    #[arg(long, help = "Target node id or raw phone number")]
    pub to: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, help = "Override query.path_timeout_ms")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SummaryArgs {
    #[arg(required = true, help = "CDR files, ingested in the given order")]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, help = "Print the flat key-value form")]
    pub flat: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Write a default .cdrgraph/config.toml into the workspace
    Init,
    /// Build the call graph and export it
    Analyze(AnalyzeArgs),
    /// Find the shortest connection between two nodes
    Path(PathArgs),
    /// Print aggregate statistics
    Summary(SummaryArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "CDR call graph analyzer")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .cdrgraph/config.toml"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[arg(long, global = true, help = "Override resolver.country_code")]
    pub country_code: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

fn parse_node_type(value: &str) -> Result<NodeType, String> {
    value.parse()
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn analyze_parses_files_filters_and_output() {
        let cli = Cli::try_parse_from([
            "cdrd",
            "analyze",
            "a.txt",
            "b.txt",
            "--node-type",
            "phone,imei",
            "--from-date",
            "2018-04-12",
            "--to-date",
            "2018-04-12",
            "--search",
            "628",
            "--output",
            "csv",
        ])
        .expect("analyze should parse");

        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
                assert_eq!(args.output, OutputFormat::Csv);
                assert_eq!(args.filter.node_types, vec![NodeType::Phone, NodeType::Imei]);

                let criteria = args.filter.criteria().expect("criteria");
                let day = NaiveDate::from_ymd_opt(2018, 4, 12).expect("date");
                assert_eq!(criteria.date_range, Some(DateRange::new(Some(day), Some(day))));
                assert_eq!(criteria.duration_range, None);
                assert_eq!(criteria.search_text.as_deref(), Some("628"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.log_format, LogFormat::Human);
    }

    #[test]
    fn path_requires_endpoints() {
        let missing = Cli::try_parse_from(["cdrd", "path", "a.txt", "--from", "628"]);
        assert!(missing.is_err());

        let cli = Cli::try_parse_from([
            "cdrd",
            "path",
            "a.txt",
            "--from",
            "0812-4164478",
            "--to",
            "6285222243707",
            "--timeout-ms",
            "50",
            "--log-format",
            "json",
        ])
        .expect("path should parse");
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Path(args) => {
                assert_eq!(args.from, "0812-4164478");
                assert_eq!(args.timeout_ms, Some(50));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["cdrd", "analyze", "a.txt", "--node-type", "tower"]).is_err());
        assert!(Cli::try_parse_from(["cdrd", "analyze", "a.txt", "--from-date", "12/04/2018"]).is_err());
        assert!(Cli::try_parse_from(["cdrd", "analyze", "a.txt", "--output", "xml"]).is_err());
        assert!(Cli::try_parse_from(["cdrd", "analyze"]).is_err());
    }

    #[test]
    fn inverted_ranges_fail_criteria() {
        let filter = FilterArgs {
            min_duration: Some(60),
            max_duration: Some(10),
            ..FilterArgs::default()
        };
        assert!(filter.criteria().is_err());

        let filter = FilterArgs {
            min_duration: Some(10),
            drop_isolated: true,
            ..FilterArgs::default()
        };
        let criteria = filter.criteria().expect("criteria");
        assert_eq!(criteria.duration_range, Some(DurationRange::new(Some(10), None)));
        assert!(criteria.drop_isolated);
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cdrd",
            "summary",
            "a.txt",
            "--flat",
            "--workspace",
            "/tmp/case",
            "--country-code",
            "44",
        ])
        .expect("summary should parse");
        assert_eq!(cli.workspace, PathBuf::from("/tmp/case"));
        assert_eq!(cli.country_code.as_deref(), Some("44"));
        assert!(matches!(cli.command, Commands::Summary(args) if args.flat));
    }
}
