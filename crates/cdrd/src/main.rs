use std::path::Path;

use anyhow::{Context, Result};
use cdr_config::{CdrConfig, load_workspace_config, validate_config};
use cdrd::cli::{Cli, Commands, LogFormat, parse_cli};
use cdrd::commands::{run_analyze, run_init, run_path, run_summary};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.log_format)?;
    run(cli)
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Human => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let workspace = cli.workspace.as_path();
    let load = || load_config(workspace, cli.country_code.as_deref());
    let mut out = std::io::stdout();

    match &cli.command {
        Commands::Init => run_init(workspace, &mut out),
        Commands::Analyze(args) => run_analyze(&load()?, args, &mut out),
        Commands::Summary(args) => run_summary(&load()?, args, &mut out),
        Commands::Path(args) => run_path(&load()?, args, &mut out).map(|_| ()),
    }
}

fn load_config(workspace: &Path, country_code: Option<&str>) -> Result<CdrConfig> {
    let mut config = load_workspace_config(workspace).with_context(|| {
        format!(
            "failed to load workspace config at {}",
            cdr_config::config_path(workspace).display()
        )
    })?;
    if let Some(country_code) = country_code {
        config.resolver.country_code = country_code.trim().trim_start_matches('+').to_owned();
    }

    for warning in validate_config(&config) {
        tracing::warn!(code = warning.code, "{}", warning.message);
    }
    Ok(config)
}
