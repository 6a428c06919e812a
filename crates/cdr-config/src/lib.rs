use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CDRGRAPH_DIR_NAME: &str = ".cdrgraph";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub const DEFAULT_COUNTRY_CODE: &str = "62";
pub const DEFAULT_TRUNK_PREFIX: &str = "0";
pub const DEFAULT_INTERNATIONAL_PREFIX: &str = "00";
pub const DEFAULT_MIN_SUBSCRIBER_DIGITS: usize = 8;
pub const DEFAULT_MAX_REJECTION_SAMPLES: usize = 20;
pub const DEFAULT_PATH_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_FILTER_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CdrConfig {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "default_placeholders")]
    pub placeholders: Vec<String>,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    #[serde(default = "default_max_rejection_samples")]
    pub max_rejection_samples: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            placeholders: default_placeholders(),
            timestamp_format: default_timestamp_format(),
            max_rejection_samples: default_max_rejection_samples(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_trunk_prefix")]
    pub trunk_prefix: String,
    #[serde(default = "default_international_prefix")]
    pub international_prefix: String,
    #[serde(default = "default_min_subscriber_digits")]
    pub min_subscriber_digits: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            trunk_prefix: default_trunk_prefix(),
            international_prefix: default_international_prefix(),
            min_subscriber_digits: default_min_subscriber_digits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_path_timeout_ms")]
    pub path_timeout_ms: u64,
    #[serde(default = "default_filter_timeout_ms")]
    pub filter_timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            path_timeout_ms: default_path_timeout_ms(),
            filter_timeout_ms: default_filter_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn cdrgraph_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(CDRGRAPH_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    cdrgraph_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn load_workspace_config(workspace_root: impl AsRef<Path>) -> Result<CdrConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(CdrConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: CdrConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<CdrConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(cdrgraph_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = CdrConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &CdrConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.parser.placeholders.is_empty() {
        warnings.push(ConfigWarning {
            code: "parser.placeholders_empty",
            message: "no placeholders configured; '000' and 'UN' will become phone nodes"
                .to_owned(),
        });
    }

    let country_code = &config.resolver.country_code;
    if country_code.is_empty() || !country_code.chars().all(|ch| ch.is_ascii_digit()) {
        warnings.push(ConfigWarning {
            code: "resolver.country_code_invalid",
            message: format!(
                "country_code '{country_code}' is not a digit string; phone numbers will pass through unnormalized"
            ),
        });
    }

    if !config
        .resolver
        .trunk_prefix
        .chars()
        .all(|ch| ch.is_ascii_digit())
    {
        warnings.push(ConfigWarning {
            code: "resolver.trunk_prefix_invalid",
            message: format!(
                "trunk_prefix '{}' contains non-digit characters",
                config.resolver.trunk_prefix
            ),
        });
    }

    if config.resolver.min_subscriber_digits < 4 {
        warnings.push(ConfigWarning {
            code: "resolver.min_subscriber_digits_low",
            message: format!(
                "min_subscriber_digits = {} may merge distinct short codes",
                config.resolver.min_subscriber_digits
            ),
        });
    }

    if config.query.path_timeout_ms == 0 {
        warnings.push(ConfigWarning {
            code: "query.path_timeout_zero",
            message: "path_timeout_ms = 0 cancels every path query immediately".to_owned(),
        });
    }

    if config.query.filter_timeout_ms == 0 {
        warnings.push(ConfigWarning {
            code: "query.filter_timeout_zero",
            message: "filter_timeout_ms = 0 cancels every filter immediately".to_owned(),
        });
    }

    warnings
}

fn default_placeholders() -> Vec<String> {
    vec!["000".to_owned(), "UN".to_owned(), "UNKNOWN".to_owned()]
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_owned()
}

fn default_max_rejection_samples() -> usize {
    DEFAULT_MAX_REJECTION_SAMPLES
}

fn default_country_code() -> String {
    DEFAULT_COUNTRY_CODE.to_owned()
}

fn default_trunk_prefix() -> String {
    DEFAULT_TRUNK_PREFIX.to_owned()
}

fn default_international_prefix() -> String {
    DEFAULT_INTERNATIONAL_PREFIX.to_owned()
}

fn default_min_subscriber_digits() -> usize {
    DEFAULT_MIN_SUBSCRIBER_DIGITS
}

fn default_path_timeout_ms() -> u64 {
    DEFAULT_PATH_TIMEOUT_MS
}

fn default_filter_timeout_ms() -> u64 {
    DEFAULT_FILTER_TIMEOUT_MS
}

fn normalize_config(mut config: CdrConfig) -> CdrConfig {
    let mut placeholders: Vec<String> = config
        .parser
        .placeholders
        .iter()
        .map(|value| value.trim().to_ascii_uppercase())
        .filter(|value| !value.is_empty())
        .collect();
    placeholders.sort();
    placeholders.dedup();
    config.parser.placeholders = placeholders;

    let timestamp_format = config.parser.timestamp_format.trim();
    if timestamp_format.is_empty() {
        config.parser.timestamp_format = default_timestamp_format();
    } else {
        config.parser.timestamp_format = timestamp_format.to_owned();
    }

    let resolver = &mut config.resolver;
    resolver.country_code = resolver
        .country_code
        .trim()
        .trim_start_matches('+')
        .to_owned();
    resolver.trunk_prefix = resolver.trunk_prefix.trim().to_owned();
    resolver.international_prefix = resolver.international_prefix.trim().to_owned();

    config
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn ensure_workspace_config_creates_default_file() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();

        let config = ensure_workspace_config(workspace).expect("ensure config");

        assert_eq!(config.resolver.country_code, DEFAULT_COUNTRY_CODE);
        assert_eq!(config.parser.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
        assert!(config_path(workspace).exists());

        let content = fs::read_to_string(config_path(workspace)).expect("read config file");
        assert!(content.contains("[parser]"));
        assert!(content.contains("[resolver]"));
        assert!(content.contains("country_code = \"62\""));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let temp = tempdir().expect("tempdir");
        let config = load_workspace_config(temp.path()).expect("load config");
        assert_eq!(config, CdrConfig::default());
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn load_workspace_config_normalizes_values() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();
        fs::create_dir_all(cdrgraph_dir(workspace)).expect("create .cdrgraph");

        let raw = r#"
[parser]
placeholders = [" un ", "000", "", "000"]
timestamp_format = "   "

[resolver]
country_code = " +44 "
min_subscriber_digits = 9

[query]
path_timeout_ms = 500
"#;
        fs::write(config_path(workspace), raw).expect("write config");

        let config = load_workspace_config(workspace).expect("load config");

        assert_eq!(config.parser.placeholders, vec!["000", "UN"]);
        assert_eq!(config.parser.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
        assert_eq!(config.resolver.country_code, "44");
        assert_eq!(config.resolver.trunk_prefix, DEFAULT_TRUNK_PREFIX);
        assert_eq!(config.resolver.min_subscriber_digits, 9);
        assert_eq!(config.query.path_timeout_ms, 500);
        assert_eq!(config.query.filter_timeout_ms, DEFAULT_FILTER_TIMEOUT_MS);
    }

    #[test]
    fn validate_config_flags_suspicious_values() {
        let mut config = CdrConfig::default();
        config.parser.placeholders.clear();
        config.resolver.country_code = "ID".to_owned();
        config.query.path_timeout_ms = 0;

        let codes: Vec<&str> = validate_config(&config)
            .into_iter()
            .map(|warning| warning.code)
            .collect();
        assert_eq!(
            codes,
            vec![
                "parser.placeholders_empty",
                "resolver.country_code_invalid",
                "query.path_timeout_zero",
            ]
        );
    }
}
