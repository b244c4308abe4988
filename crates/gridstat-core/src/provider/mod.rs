// Upstream data provider boundary.
//
// A provider fetches one raw dataset (weekly stats, seasonal stats or
// rosters) for one season. A season that is not published yet comes back as
// an empty table; only an unreachable or broken provider is an error.

pub mod csv_dir;
pub mod http;

use crate::schema::TableKind;
use crate::table::{Table, TableError};
use async_trait::async_trait;
use polars::prelude::*;
use std::fmt;
use std::io::Cursor;
use thiserror::Error;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Weekly,
    Seasonal,
    Roster,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::Weekly, Dataset::Seasonal, Dataset::Roster];

    /// Label used in diagnostics and quality metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Dataset::Weekly => "weekly_stats",
            Dataset::Seasonal => "seasonal_stats",
            Dataset::Roster => "rosters",
        }
    }

    /// File-name stem used by file-backed providers.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Dataset::Weekly => "weekly",
            Dataset::Seasonal => "seasonal",
            Dataset::Roster => "roster",
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            Dataset::Weekly => TableKind::Weekly,
            Dataset::Seasonal => TableKind::Seasonal,
            Dataset::Roster => TableKind::Roster,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Errors and options
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request for {dataset} {season} failed: {source}")]
    Request {
        dataset: Dataset,
        season: u16,
        source: reqwest::Error,
    },

    #[error("{dataset} {season}: provider returned HTTP {status}")]
    Status {
        dataset: Dataset,
        season: u16,
        status: u16,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed CSV for {dataset} {season}: {source}")]
    Csv {
        dataset: Dataset,
        season: u16,
        source: PolarsError,
    },

    #[error("failed to combine {dataset} seasons: {source}")]
    Combine {
        dataset: Dataset,
        source: TableError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Per-provider behavior switches, passed in at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderOptions {
    /// Log each malformed or ragged CSV row. Off by default: upstream files
    /// routinely carry a few.
    pub log_parse_warnings: bool,
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Fetch `dataset` for a single season.
    async fn fetch_season(&self, dataset: Dataset, season: u16) -> Result<Table, ProviderError>;
}

/// Fetch `dataset` for every season and stack the results.
pub async fn fetch<P: StatsProvider + ?Sized>(
    provider: &P,
    dataset: Dataset,
    seasons: &[u16],
) -> Result<Table, ProviderError> {
    let mut tables = Vec::with_capacity(seasons.len());
    for &season in seasons {
        tables.push(provider.fetch_season(dataset, season).await?);
    }
    let table = Table::concat(tables).map_err(|source| ProviderError::Combine { dataset, source })?;
    info!(%dataset, ?seasons, rows = table.len(), "fetched upstream data");
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV parsing shared by providers
// ---------------------------------------------------------------------------

/// Text cells read as missing, in addition to empty fields.
const NULL_MARKER: &str = "NA";

/// Parse CSV bytes into a table, inferring each column's type from every
/// row. Short rows are padded with nulls, long rows truncated and unparsable
/// cells read as null. A repeated header keeps its first column, and blank
/// input is an empty table.
///
/// A text column whose present cells mostly parse as numbers (including
/// `inf`) becomes a float column; its placeholder cells such as `n/a` turn
/// into nulls for the sanitizer.
pub fn parse_csv(bytes: impl Into<Vec<u8>>, options: ProviderOptions) -> PolarsResult<Table> {
    let bytes = bytes.into();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Table::new());
    }

    let parse = CsvParseOptions::default()
        .with_truncate_ragged_lines(true)
        .with_null_values(Some(NullValues::AllColumnsSingle(NULL_MARKER.into())));
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_ignore_errors(true)
        .with_parse_options(parse)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    let mut columns: Vec<Column> = Vec::with_capacity(df.width());
    for mut column in df.take_columns() {
        let trimmed = column.name().trim().to_string();
        if is_repeated_header(&trimmed, &columns) {
            if options.log_parse_warnings {
                warn!("ignoring repeated CSV column '{trimmed}'");
            }
            continue;
        }
        if trimmed != column.name().as_str() {
            column.rename(trimmed.into());
        }
        columns.push(coerce_numeric(column, options)?);
    }
    Ok(Table::from(DataFrame::new(columns)?))
}

/// The reader renames a repeated header `{name}_duplicated_{n}`.
fn is_repeated_header(name: &str, kept: &[Column]) -> bool {
    let Some((original, suffix)) = name.rsplit_once("_duplicated_") else {
        return false;
    };
    suffix.parse::<usize>().is_ok() && kept.iter().any(|c| c.name().as_str() == original)
}

/// Read a mostly-numeric text column as floats.
fn coerce_numeric(column: Column, options: ProviderOptions) -> PolarsResult<Column> {
    if column.dtype() != &DataType::String {
        return Ok(column);
    }
    let present = column.len() - column.null_count();
    let numbers = column.cast(&DataType::Float64)?;
    let parsed = numbers.len() - numbers.null_count();
    if parsed == 0 || parsed * 2 <= present {
        return Ok(column);
    }
    if parsed < present && options.log_parse_warnings {
        warn!(
            column = column.name().as_str(),
            placeholders = present - parsed,
            "non-numeric cells in a numeric CSV column read as missing"
        );
    }
    Ok(numbers)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
