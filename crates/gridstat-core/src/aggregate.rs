// Season aggregation and derived per-game / efficiency metrics.
//
// Weekly rows are grouped by player and season, every available countable
// stat is summed, and rates are derived from the sums. Ratios with a zero
// denominator are 0.0 at the point they are computed.

use crate::roster::{RosterIndex, ROSTER_POSITION, ROSTER_TEAM};
use crate::schema::*;
use crate::table::{Table, TableResult};
use polars::prelude::*;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Stat lists
// ---------------------------------------------------------------------------

/// Countable stats summed across a player's weeks.
pub const SUMMABLE_STATS: &[&str] = &[
    FANTASY_POINTS,
    FANTASY_POINTS_PPR,
    PASSING_YARDS,
    PASSING_TDS,
    INTERCEPTIONS,
    PASSING_ATTEMPTS,
    COMPLETIONS,
    RUSHING_YARDS,
    RUSHING_TDS,
    RUSHING_ATTEMPTS,
    RECEIVING_YARDS,
    RECEIVING_TDS,
    RECEPTIONS,
    TARGETS,
    "passing_first_downs",
    "rushing_first_downs",
    "receiving_first_downs",
    RED_ZONE_TARGETS,
    RED_ZONE_CARRIES,
    RED_ZONE_TOUCHES,
];

/// Stats that also get a `<stat>_per_game` column.
pub const PER_GAME_STATS: &[&str] = &[
    FANTASY_POINTS,
    FANTASY_POINTS_PPR,
    PASSING_YARDS,
    RUSHING_YARDS,
    RECEIVING_YARDS,
    TARGETS,
    RECEPTIONS,
];

/// Columns that identify a season aggregate, in output order. Only
/// `player_id` is required; the rest join the key when present.
const GROUP_COLUMNS: &[&str] = &[PLAYER_ID, SEASON, PLAYER_NAME, POSITION, TEAM];

// ---------------------------------------------------------------------------
// Ratios
// ---------------------------------------------------------------------------

/// `numerator / denominator * scale`, written to column `name`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratio {
    pub name: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
    pub scale: f64,
}

impl Ratio {
    /// Column expression: 0.0 where the denominator is zero, null where
    /// either input is null.
    pub fn expr(&self) -> Expr {
        (ratio_expr(col(self.numerator), col(self.denominator)) * lit(self.scale)).alias(self.name)
    }
}

pub const COMPLETION_RATE: Ratio = Ratio {
    name: "completion_rate",
    numerator: COMPLETIONS,
    denominator: PASSING_ATTEMPTS,
    scale: 100.0,
};

pub const CATCH_RATE: Ratio = Ratio {
    name: "catch_rate",
    numerator: RECEPTIONS,
    denominator: TARGETS,
    scale: 100.0,
};

pub const YARDS_PER_CARRY: Ratio = Ratio {
    name: "yards_per_carry",
    numerator: RUSHING_YARDS,
    denominator: RUSHING_ATTEMPTS,
    scale: 1.0,
};

pub const YARDS_PER_TARGET: Ratio = Ratio {
    name: "yards_per_target",
    numerator: RECEIVING_YARDS,
    denominator: TARGETS,
    scale: 1.0,
};

pub const YARDS_PER_RECEPTION: Ratio = Ratio {
    name: "yards_per_reception",
    numerator: RECEIVING_YARDS,
    denominator: RECEPTIONS,
    scale: 1.0,
};

const AGGREGATE_RATIOS: &[Ratio] = &[
    COMPLETION_RATE,
    CATCH_RATE,
    YARDS_PER_CARRY,
    YARDS_PER_TARGET,
    YARDS_PER_RECEPTION,
];

const WEEKLY_RATIOS: &[Ratio] = &[CATCH_RATE, COMPLETION_RATE];

const SEASONAL_RATIOS: &[Ratio] = &[CATCH_RATE, COMPLETION_RATE, YARDS_PER_CARRY, YARDS_PER_TARGET];

// ---------------------------------------------------------------------------
// Numeric helpers
// ---------------------------------------------------------------------------

/// Division that yields exactly 0.0 for a zero denominator.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// `numerator / denominator` as floats, 0.0 where the denominator is zero.
pub fn ratio_expr(numerator: Expr, denominator: Expr) -> Expr {
    let den = denominator.cast(DataType::Float64);
    when(den.clone().eq(lit(0.0)))
        .then(lit(0.0))
        .otherwise(numerator.cast(DataType::Float64) / den)
}

/// Sum that does not depend on row order: values are sorted inside each
/// group before adding, so any permutation produces the same bits. Integer
/// columns stay integer.
pub fn ordered_sum(column: &str) -> Expr {
    col(column).sort(SortOptions::default()).sum()
}

/// Add every ratio in `ratios` whose inputs are both numeric columns. A
/// ratio that fails to evaluate is left out.
pub fn with_ratios(table: Table, ratios: &[Ratio]) -> Table {
    let exprs: Vec<Expr> = ratios
        .iter()
        .filter(|r| table.is_numeric(r.numerator) && table.is_numeric(r.denominator))
        .map(Ratio::expr)
        .collect();
    with_derived(table, exprs, "ratio")
}

/// Add `<stat>_per_game` for each of `stats` present, dividing by the
/// `games` column. Rows with no games get 0.0; rows missing the stat get
/// null.
pub fn with_per_game(table: Table, stats: &[&str]) -> Table {
    if !table.is_numeric(GAMES) {
        return table;
    }
    let games = col(GAMES).cast(DataType::Float64);
    let exprs: Vec<Expr> = stats
        .iter()
        .filter(|s| table.is_numeric(s))
        .map(|stat| {
            when(col(*stat).is_null())
                .then(lit(NULL).cast(DataType::Float64))
                .when(games.clone().gt(lit(0.0)))
                .then(col(*stat).cast(DataType::Float64) / games.clone())
                .otherwise(lit(0.0))
                .alias(format!("{stat}_per_game"))
        })
        .collect();
    with_derived(table, exprs, "per-game")
}

/// Evaluate derived columns. On failure the input comes back unchanged and
/// the derived columns count as unavailable.
fn with_derived(table: Table, exprs: Vec<Expr>, what: &str) -> Table {
    if exprs.is_empty() {
        return table;
    }
    match table.lazy().with_columns(exprs).collect() {
        Ok(df) => Table::from(df),
        Err(e) => {
            warn!("{what} columns unavailable: {e}");
            table
        }
    }
}

// ---------------------------------------------------------------------------
// Output shaping for the provider's own weekly / seasonal tables
// ---------------------------------------------------------------------------

/// Normalized weekly rows plus catch and completion rates.
pub fn with_weekly_metrics(weekly: &Table) -> Table {
    with_ratios(weekly.clone(), WEEKLY_RATIOS)
}

/// Normalized seasonal rows plus per-game averages (when a `games` column
/// exists) and efficiency ratios.
pub fn with_seasonal_metrics(seasonal: &Table) -> Table {
    let table = with_per_game(seasonal.clone(), PER_GAME_STATS);
    with_ratios(table, SEASONAL_RATIOS)
}

// ---------------------------------------------------------------------------
// Season aggregation
// ---------------------------------------------------------------------------

/// Aggregate normalized weekly rows into one row per player and season.
///
/// When `roster` is given, missing team/position cells are backfilled from
/// it first; values already present are never replaced. The output has the
/// grouping columns, the sums of every available summable stat, `games`,
/// per-game averages and efficiency ratios. Groups are emitted in key order.
pub fn aggregate_season(weekly: &Table, roster: Option<&Table>) -> TableResult<Table> {
    if weekly.is_empty() {
        return Ok(Table::new());
    }
    if !weekly.has_column(PLAYER_ID) {
        warn!("weekly table has no player_id column; nothing to aggregate");
        return Ok(Table::new());
    }

    let source = match roster {
        Some(roster) => backfill_from_roster(weekly, &RosterIndex::build(roster)?)?,
        None => weekly.clone(),
    };

    let keys: Vec<Expr> = GROUP_COLUMNS
        .iter()
        .filter(|name| source.has_column(name))
        .map(|name| col(*name))
        .collect();

    let mut sums: Vec<Expr> = Vec::with_capacity(SUMMABLE_STATS.len() + 1);
    for name in SUMMABLE_STATS {
        if source.is_numeric(name) {
            sums.push(ordered_sum(name));
        } else if source.has_column(name) {
            debug!(column = *name, "stat column is not numeric, treating as unavailable");
        }
    }
    sums.push(len().cast(DataType::Int64).alias(GAMES));

    let unattributed = source.frame().column(PLAYER_ID)?.null_count();
    if unattributed > 0 {
        warn!(rows = unattributed, "skipped weekly rows without a player_id");
    }

    let df = source
        .lazy()
        .filter(col(PLAYER_ID).is_not_null())
        .group_by(keys.clone())
        .agg(sums)
        .sort_by_exprs(keys, SortMultipleOptions::default())
        .collect()?;

    let aggregated = with_ratios(with_per_game(Table::from(df), PER_GAME_STATS), AGGREGATE_RATIOS);

    info!(
        weekly_rows = weekly.len(),
        season_rows = aggregated.len(),
        "aggregated weekly stats into season totals"
    );
    Ok(aggregated)
}

/// Fill null team/position cells from the roster index through a left join
/// on `player_id`, adding the column when the weekly table lacks it.
fn backfill_from_roster(weekly: &Table, index: &RosterIndex) -> TableResult<Table> {
    if index.is_empty() {
        return Ok(weekly.clone());
    }

    let mut output: Vec<Expr> = weekly
        .column_names()
        .filter(|n| *n != TEAM && *n != POSITION)
        .map(col)
        .collect();
    for (name, from_roster) in [(TEAM, ROSTER_TEAM), (POSITION, ROSTER_POSITION)] {
        let filled = if weekly.has_column(name) {
            col(name).fill_null(col(from_roster))
        } else {
            col(from_roster)
        };
        output.push(filled.alias(name));
    }

    let joined = weekly
        .lazy()
        .join(
            index.lookup_frame()?.lazy(),
            [col(PLAYER_ID)],
            [col(PLAYER_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .select(output)
        .collect()?;
    debug!(rows = joined.height(), "backfilled team and position from roster");
    Ok(Table::from(joined))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
