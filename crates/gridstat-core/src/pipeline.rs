// End-to-end extraction: fetch raw tables, report upstream quality problems,
// normalize, filter, aggregate, roll up, and sanitize every output.

use crate::aggregate::{aggregate_season, with_seasonal_metrics, with_weekly_metrics};
use crate::provider::{fetch, Dataset, ProviderError, StatsProvider};
use crate::quality::{sanitize, validate, Diagnostic, QualityMetrics};
use crate::request::{ExtractRequest, Position, RequestError};
use crate::roster::player_info;
use crate::schema::{normalize, PLAYER_ID, POSITION, WEEK};
use crate::table::{Table, TableError, TableResult};
use crate::team::{self, select_source, team_rollup, RollupSource};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

pub const WEEKLY_STATS: &str = "weekly_stats";
pub const SEASONAL_STATS: &str = "seasonal_stats";
pub const AGGREGATED_SEASON_STATS: &str = "aggregated_season_stats";
pub const PLAYER_INFO: &str = "player_info";
pub const TEAM_ANALYTICS: &str = "team_analytics";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("upstream data provider unavailable: {0}")]
    UpstreamUnavailable(#[from] ProviderError),

    #[error("processing failed: {0}")]
    Processing(#[from] TableError),
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Raw provider tables for one request, before any processing.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub weekly: Table,
    pub seasonal: Table,
    pub roster: Table,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DataQuality {
    /// Sanitization counts keyed by output table name.
    pub metrics: BTreeMap<String, QualityMetrics>,
    /// Infinite values found in the raw provider tables.
    pub upstream_issues: Vec<Diagnostic>,
}

impl DataQuality {
    pub fn is_clean(&self) -> bool {
        self.upstream_issues.is_empty() && self.metrics.values().all(QualityMetrics::is_clean)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub years: Vec<u16>,
    pub positions: Vec<Position>,
    pub week: Option<u8>,
    pub extracted_at: DateTime<Utc>,
    pub rollup_source: Option<RollupSource>,
    pub total_weekly_records: usize,
    pub total_seasonal_records: usize,
    pub total_aggregated_records: usize,
    pub total_players: usize,
    pub total_teams: usize,
}

/// Everything one extraction produces. Every numeric cell in the five
/// tables is finite.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResponse {
    pub weekly_stats: Table,
    pub seasonal_stats: Table,
    pub aggregated_season_stats: Table,
    pub player_info: Table,
    pub team_analytics: Table,
    pub data_quality: DataQuality,
    pub metadata: Metadata,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Fetch the three datasets for `request` concurrently and process them.
pub async fn extract<P: StatsProvider + ?Sized>(
    provider: &P,
    request: &ExtractRequest,
) -> Result<ExtractResponse, ExtractError> {
    let seasons = request.seasons();
    info!(
        ?seasons,
        positions = ?request.positions(),
        week = ?request.week(),
        "starting extraction"
    );

    let (weekly, seasonal, roster) = tokio::try_join!(
        fetch(provider, Dataset::Weekly, seasons),
        fetch(provider, Dataset::Seasonal, seasons),
        fetch(provider, Dataset::Roster, seasons),
    )?;

    process(
        request,
        RawTables {
            weekly,
            seasonal,
            roster,
        },
        Utc::now(),
    )
}

/// The synchronous part of an extraction, for callers that already hold the
/// raw tables.
///
/// With a week requested, the weekly table holds that week only, so the
/// aggregated table and the team rollup built from it cover that week.
pub fn process(
    request: &ExtractRequest,
    raw: RawTables,
    extracted_at: DateTime<Utc>,
) -> Result<ExtractResponse, ExtractError> {
    let mut quality = DataQuality::default();
    for (dataset, table) in [
        (Dataset::Weekly, &raw.weekly),
        (Dataset::Seasonal, &raw.seasonal),
        (Dataset::Roster, &raw.roster),
    ] {
        quality.upstream_issues.extend(validate(table, dataset.label()));
    }

    let weekly = filter_week(
        filter_positions(normalize(&raw.weekly, Dataset::Weekly.kind())?, request)?,
        request.week(),
    )?;
    let seasonal = filter_positions(normalize(&raw.seasonal, Dataset::Seasonal.kind())?, request)?;
    let roster = filter_positions(normalize(&raw.roster, Dataset::Roster.kind())?, request)?;
    debug!(
        weekly = weekly.len(),
        seasonal = seasonal.len(),
        roster = roster.len(),
        "normalized and filtered provider tables"
    );

    let aggregated = aggregate_season(&weekly, Some(&roster))?;

    let (rollup_source, teams) = match select_source(&aggregated, &seasonal, &weekly) {
        Some((source, players)) => (Some(source), team_rollup(players, &roster)?),
        None => (None, Vec::new()),
    };

    let weekly_out = with_weekly_metrics(&weekly);
    let seasonal_out = with_seasonal_metrics(&seasonal);
    let players = player_info(&roster)?;

    let metadata = Metadata {
        years: request.seasons().to_vec(),
        positions: request.positions().to_vec(),
        week: request.week(),
        extracted_at,
        rollup_source,
        total_weekly_records: weekly_out.len(),
        total_seasonal_records: seasonal_out.len(),
        total_aggregated_records: aggregated.len(),
        total_players: distinct_players(&roster)?,
        total_teams: teams.len(),
    };

    let response = ExtractResponse {
        weekly_stats: sanitized(WEEKLY_STATS, weekly_out, &mut quality)?,
        seasonal_stats: sanitized(SEASONAL_STATS, seasonal_out, &mut quality)?,
        aggregated_season_stats: sanitized(AGGREGATED_SEASON_STATS, aggregated, &mut quality)?,
        player_info: sanitized(PLAYER_INFO, players, &mut quality)?,
        team_analytics: sanitized(TEAM_ANALYTICS, team::to_table(&teams)?, &mut quality)?,
        data_quality: quality,
        metadata,
    };

    info!(
        weekly = response.metadata.total_weekly_records,
        seasonal = response.metadata.total_seasonal_records,
        aggregated = response.metadata.total_aggregated_records,
        players = response.metadata.total_players,
        teams = response.metadata.total_teams,
        upstream_issues = response.data_quality.upstream_issues.len(),
        "extraction complete"
    );
    Ok(response)
}

fn sanitized(label: &str, table: Table, quality: &mut DataQuality) -> TableResult<Table> {
    let (table, metrics) = sanitize(table, label)?;
    quality.metrics.insert(label.to_string(), metrics);
    Ok(table)
}

/// Keep rows whose position is one of the requested ones. A table without a
/// position column passes through; a null position is dropped.
fn filter_positions(table: Table, request: &ExtractRequest) -> TableResult<Table> {
    if !table.has_column(POSITION) {
        return Ok(table);
    }
    let mask: BooleanChunked = table
        .keys(POSITION)?
        .into_iter()
        .map(|p| p.is_some_and(|p| request.includes_position(&p.to_ascii_uppercase())))
        .collect();
    if mask.all() {
        return Ok(table);
    }
    Ok(Table::from(table.frame().filter(&mask)?))
}

/// Keep rows from `week` when one is requested and the table has weeks.
fn filter_week(table: Table, week: Option<u8>) -> TableResult<Table> {
    let Some(week) = week else {
        return Ok(table);
    };
    if !table.has_column(WEEK) {
        return Ok(table);
    }
    let rows = table
        .lazy()
        .filter(col(WEEK).cast(DataType::Float64).eq(lit(f64::from(week))))
        .collect()?;
    Ok(Table::from(rows))
}

fn distinct_players(table: &Table) -> TableResult<usize> {
    let ids: BTreeSet<String> = table.keys(PLAYER_ID)?.into_iter().flatten().collect();
    Ok(ids.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestLimits;
    use crate::table::Value;

    fn request(positions: &[&str], week: Option<&str>) -> ExtractRequest {
        ExtractRequest::parse(&["2024"], positions, week, &RequestLimits::default(), 2024).unwrap()
    }

    fn players() -> Table {
        Table::from(
            df!(
                "player_id" => ["a", "b", "c", "d"],
                "position" => [Some("QB"), Some("rb"), Some("K"), None],
                "week" => [1i64, 2, 1, 1],
            )
            .unwrap(),
        )
    }

    #[test]
    fn position_filter_keeps_requested_codes() {
        let out = filter_positions(players(), &request(&["QB", "RB"], None)).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(1, "player_id"), Some(Value::Str("b".into())));
    }

    #[test]
    fn position_filter_passes_tables_without_positions() {
        let t = Table::from(df!("player_id" => ["a"]).unwrap());
        assert_eq!(filter_positions(t.clone(), &request(&["TE"], None)).unwrap(), t);
    }

    #[test]
    fn week_filter_selects_one_week() {
        assert_eq!(filter_week(players(), Some(1)).unwrap().len(), 3);
        assert_eq!(filter_week(players(), None).unwrap().len(), 4);
        assert!(filter_week(players(), Some(9)).unwrap().is_empty());
    }

    #[test]
    fn distinct_players_ignores_blank_ids() {
        let t = Table::from(df!("player_id" => [Some("a"), Some("a"), None, Some("b")]).unwrap());
        assert_eq!(distinct_players(&t).unwrap(), 2);
    }

    #[test]
    fn empty_inputs_give_empty_outputs() {
        let response = process(&request(&["QB"], None), RawTables::default(), Utc::now()).unwrap();
        assert!(response.weekly_stats.is_empty());
        assert!(response.aggregated_season_stats.is_empty());
        assert!(response.team_analytics.is_empty());
        assert_eq!(response.metadata.rollup_source, None);
        assert_eq!(response.data_quality.metrics.len(), 5);
        assert!(response.data_quality.is_clean());
    }
}
