// Configuration loading and parsing (gridstat.toml).

use crate::provider::http::UrlTemplates;
use crate::provider::{Dataset, ProviderOptions};
use crate::request::{Position, RequestLimits, DEFAULT_LOOKBACK, FIRST_SEASON, MAX_WEEK};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Location of the config file relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/gridstat.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub request: RequestConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Http,
    CsvDir,
}

/// `[provider]`: where raw tables come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Directory read by the `csv_dir` provider.
    pub data_dir: PathBuf,
    pub timeout_secs: u64,
    pub log_parse_warnings: bool,
    pub urls: UrlTemplates,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Http,
            data_dir: PathBuf::from("data"),
            timeout_secs: 60,
            log_parse_warnings: false,
            urls: UrlTemplates::default(),
        }
    }
}

impl ProviderConfig {
    pub fn options(&self) -> ProviderOptions {
        ProviderOptions {
            log_parse_warnings: self.log_parse_warnings,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[request]`: validation bounds and defaults for omitted parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub min_season: u16,
    pub max_week: u8,
    /// Seasons requested when none are named, ending at the current one.
    pub lookback_seasons: u16,
    /// Positions requested when none are named.
    pub positions: Vec<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            min_season: FIRST_SEASON,
            max_week: MAX_WEEK,
            lookback_seasons: DEFAULT_LOOKBACK,
            positions: Position::ALL.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl RequestConfig {
    pub fn limits(&self) -> RequestLimits {
        RequestLimits {
            min_season: self.min_season,
            max_week: self.max_week,
        }
    }
}

/// `[output]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print the JSON document.
    pub pretty: bool,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Load an explicitly named config file, or `config/gridstat.toml` when it
/// exists, or fall back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return load_config_from(default_path);
    }
    info!("no {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
    let config = Config::default();
    validate(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let provider = &config.provider;
    if provider.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "provider.timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if provider.kind == ProviderKind::CsvDir && provider.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "provider.data_dir".into(),
            message: "must be set when provider.kind is \"csv_dir\"".into(),
        });
    }

    for dataset in Dataset::ALL {
        let template = provider.urls.template(dataset);
        if !template.contains("{season}") {
            return Err(ConfigError::ValidationError {
                field: format!("provider.urls.{}", dataset.file_stem()),
                message: format!("must contain a {{season}} placeholder, got \"{template}\""),
            });
        }
    }

    let request = &config.request;
    if request.min_season < FIRST_SEASON {
        return Err(ConfigError::ValidationError {
            field: "request.min_season".into(),
            message: format!("must be at least {FIRST_SEASON}, got {}", request.min_season),
        });
    }

    if !(1..=MAX_WEEK).contains(&request.max_week) {
        return Err(ConfigError::ValidationError {
            field: "request.max_week".into(),
            message: format!("must be between 1 and {MAX_WEEK}, got {}", request.max_week),
        });
    }

    if request.lookback_seasons == 0 {
        return Err(ConfigError::ValidationError {
            field: "request.lookback_seasons".into(),
            message: "must be greater than 0".into(),
        });
    }

    if request.positions.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "request.positions".into(),
            message: "must name at least one position".into(),
        });
    }
    for raw in &request.positions {
        if let Err(e) = raw.parse::<Position>() {
            return Err(ConfigError::ValidationError {
                field: "request.positions".into(),
                message: e.to_string(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text).unwrap();
        validate(&config).map(|_| config)
    }

    fn expect_field(result: Result<Config, ConfigError>, expected: &str) {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, expected),
            Err(other) => panic!("expected ValidationError, got: {other}"),
            Ok(_) => panic!("expected ValidationError for {expected}"),
        }
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Http);
        assert_eq!(config.provider.timeout(), Duration::from_secs(60));
        assert_eq!(config.request.limits(), RequestLimits::default());
        assert_eq!(config.request.lookback_seasons, 5);
        assert_eq!(config.request.positions, vec!["QB", "RB", "WR", "TE"]);
        assert!(!config.output.pretty);
    }

    #[test]
    fn parses_all_sections() {
        let config = parse(
            r#"
[provider]
kind = "csv_dir"
data_dir = "fixtures"
timeout_secs = 10
log_parse_warnings = true

[provider.urls]
roster = "http://mirror.local/roster_{season}.csv"

[request]
min_season = 2010
max_week = 18
lookback_seasons = 3
positions = ["qb", "WR"]

[output]
pretty = true
"#,
        )
        .unwrap();

        assert_eq!(config.provider.kind, ProviderKind::CsvDir);
        assert_eq!(config.provider.data_dir, PathBuf::from("fixtures"));
        assert!(config.provider.options().log_parse_warnings);
        assert_eq!(
            config.provider.urls.url_for(Dataset::Roster, 2020),
            "http://mirror.local/roster_2020.csv"
        );
        assert_eq!(config.provider.urls.weekly, UrlTemplates::default().weekly);
        assert_eq!(config.request.limits().max_week, 18);
        assert_eq!(config.request.lookback_seasons, 3);
        assert!(config.output.pretty);
    }

    #[test]
    fn rejects_zero_timeout() {
        expect_field(parse("[provider]\ntimeout_secs = 0"), "provider.timeout_secs");
    }

    #[test]
    fn rejects_empty_data_dir_for_csv_dir() {
        expect_field(
            parse("[provider]\nkind = \"csv_dir\"\ndata_dir = \"\""),
            "provider.data_dir",
        );
    }

    #[test]
    fn rejects_url_without_season_placeholder() {
        expect_field(
            parse("[provider.urls]\nweekly = \"http://example.invalid/weekly.csv\""),
            "provider.urls.weekly",
        );
    }

    #[test]
    fn rejects_bad_request_bounds() {
        expect_field(parse("[request]\nmin_season = 1990"), "request.min_season");
        expect_field(parse("[request]\nmax_week = 0"), "request.max_week");
        expect_field(parse("[request]\nmax_week = 30"), "request.max_week");
        expect_field(parse("[request]\nlookback_seasons = 0"), "request.lookback_seasons");
    }

    #[test]
    fn rejects_unknown_default_position() {
        expect_field(parse("[request]\npositions = [\"QB\", \"K\"]"), "request.positions");
        expect_field(parse("[request]\npositions = []"), "request.positions");
    }

    #[test]
    fn file_not_found_for_missing_file() {
        let path = std::env::temp_dir().join("gridstat_config_test_missing.toml");
        let _ = fs::remove_file(&path);
        match load_config_from(&path).unwrap_err() {
            ConfigError::FileNotFound { path: p } => assert_eq!(p, path),
            other => panic!("expected FileNotFound, got: {other}"),
        }
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let path = std::env::temp_dir().join("gridstat_config_test_invalid.toml");
        fs::write(&path, "this is not valid [[[ toml").unwrap();

        match load_config_from(&path).unwrap_err() {
            ConfigError::ParseError { path: p, .. } => assert!(p.ends_with("gridstat_config_test_invalid.toml")),
            other => panic!("expected ParseError, got: {other}"),
        }

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn explicit_path_takes_precedence() {
        let path = std::env::temp_dir().join("gridstat_config_test_explicit.toml");
        fs::write(&path, "[output]\npretty = true\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(config.output.pretty);

        let _ = fs::remove_file(&path);
    }
}
