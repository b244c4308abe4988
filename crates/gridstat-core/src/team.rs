// Team rollups: per-team totals, efficiency ratios, positional sub-totals
// and offensive identity.
//
// Players are assigned to teams through the roster, never through the stat
// rows themselves, so a rollup only ever contains teams the roster knows.

use crate::aggregate::safe_ratio;
use crate::roster::{RosterIndex, ROSTER_POSITION, ROSTER_TEAM};
use crate::schema::*;
use crate::table::{Table, TableResult, Value};
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Offensive identity
// ---------------------------------------------------------------------------

/// Share of passing yardage above this is pass-heavy.
pub const PASS_HEAVY_ABOVE: f64 = 60.0;
/// Share of passing yardage below this is run-heavy.
pub const RUN_HEAVY_BELOW: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OffensiveIdentity {
    #[serde(rename = "Pass-Heavy")]
    PassHeavy,
    #[serde(rename = "Run-Heavy")]
    RunHeavy,
    Balanced,
}

impl OffensiveIdentity {
    /// Classify a passing-yardage percentage. Both thresholds are exclusive.
    pub fn from_percentage(passing_percentage: f64) -> Self {
        if passing_percentage > PASS_HEAVY_ABOVE {
            OffensiveIdentity::PassHeavy
        } else if passing_percentage < RUN_HEAVY_BELOW {
            OffensiveIdentity::RunHeavy
        } else {
            OffensiveIdentity::Balanced
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OffensiveIdentity::PassHeavy => "Pass-Heavy",
            OffensiveIdentity::RunHeavy => "Run-Heavy",
            OffensiveIdentity::Balanced => "Balanced",
        }
    }
}

/// Passing percentage of total yardage and the resulting identity. Zero
/// total yardage gives 0.0 and `Balanced`.
pub fn passing_share(passing_yards: f64, rushing_yards: f64) -> (f64, OffensiveIdentity) {
    let total = passing_yards + rushing_yards;
    if total == 0.0 {
        return (0.0, OffensiveIdentity::Balanced);
    }
    let pct = safe_ratio(passing_yards, total) * 100.0;
    (pct, OffensiveIdentity::from_percentage(pct))
}

// ---------------------------------------------------------------------------
// Team analytics row
// ---------------------------------------------------------------------------

/// Tracked offensive positions, in sub-total order.
pub const TRACKED_POSITIONS: &[&str] = &["QB", "RB", "WR", "TE"];

/// One team's rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamAnalytics {
    pub team: String,
    pub total_fantasy_points: f64,
    pub total_fantasy_points_ppr: f64,

    pub passing_yards: f64,
    pub passing_tds: f64,
    pub interceptions_thrown: f64,

    pub rushing_yards: f64,
    pub rushing_tds: f64,
    pub rushing_attempts: f64,

    pub receiving_yards: f64,
    pub receiving_tds: f64,
    pub receptions: f64,
    pub targets: f64,

    pub yards_per_carry: f64,
    /// Percentage, 0-100.
    pub catch_rate: f64,
    pub yards_per_target: f64,

    pub qb_fantasy_points: f64,
    pub rb_fantasy_points: f64,
    pub wr_fantasy_points: f64,
    pub te_fantasy_points: f64,
    pub rb_touches: f64,
    pub wr_targets: f64,
    pub te_targets: f64,

    /// Only reported when the source table carries the column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red_zone_targets: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red_zone_carries: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red_zone_touches: Option<f64>,

    pub passing_percentage: f64,
    pub offensive_identity: OffensiveIdentity,
}

/// Convert rollup rows into a table (for sanitization and output). Optional
/// red-zone columns appear when any row reports them; other rows get null.
/// The identity columns come last.
pub fn to_table(rows: &[TeamAnalytics]) -> TableResult<Table> {
    let numbers = |get: fn(&TeamAnalytics) -> f64| -> Vec<f64> { rows.iter().map(get).collect() };
    let teams: Vec<&str> = rows.iter().map(|r| r.team.as_str()).collect();

    let mut columns = vec![
        Column::new("team".into(), teams),
        Column::new("total_fantasy_points".into(), numbers(|r| r.total_fantasy_points)),
        Column::new("total_fantasy_points_ppr".into(), numbers(|r| r.total_fantasy_points_ppr)),
        Column::new("passing_yards".into(), numbers(|r| r.passing_yards)),
        Column::new("passing_tds".into(), numbers(|r| r.passing_tds)),
        Column::new("interceptions_thrown".into(), numbers(|r| r.interceptions_thrown)),
        Column::new("rushing_yards".into(), numbers(|r| r.rushing_yards)),
        Column::new("rushing_tds".into(), numbers(|r| r.rushing_tds)),
        Column::new("rushing_attempts".into(), numbers(|r| r.rushing_attempts)),
        Column::new("receiving_yards".into(), numbers(|r| r.receiving_yards)),
        Column::new("receiving_tds".into(), numbers(|r| r.receiving_tds)),
        Column::new("receptions".into(), numbers(|r| r.receptions)),
        Column::new("targets".into(), numbers(|r| r.targets)),
        Column::new("yards_per_carry".into(), numbers(|r| r.yards_per_carry)),
        Column::new("catch_rate".into(), numbers(|r| r.catch_rate)),
        Column::new("yards_per_target".into(), numbers(|r| r.yards_per_target)),
        Column::new("qb_fantasy_points".into(), numbers(|r| r.qb_fantasy_points)),
        Column::new("rb_fantasy_points".into(), numbers(|r| r.rb_fantasy_points)),
        Column::new("wr_fantasy_points".into(), numbers(|r| r.wr_fantasy_points)),
        Column::new("te_fantasy_points".into(), numbers(|r| r.te_fantasy_points)),
        Column::new("rb_touches".into(), numbers(|r| r.rb_touches)),
        Column::new("wr_targets".into(), numbers(|r| r.wr_targets)),
        Column::new("te_targets".into(), numbers(|r| r.te_targets)),
    ];

    let red_zone: [(&str, fn(&TeamAnalytics) -> Option<f64>); 3] = [
        (RED_ZONE_TARGETS, |r| r.red_zone_targets),
        (RED_ZONE_CARRIES, |r| r.red_zone_carries),
        (RED_ZONE_TOUCHES, |r| r.red_zone_touches),
    ];
    for (name, get) in red_zone {
        if rows.iter().any(|r| get(r).is_some()) {
            let values: Vec<Option<f64>> = rows.iter().map(get).collect();
            columns.push(Column::new(name.into(), values));
        }
    }

    let labels: Vec<&str> = rows.iter().map(|r| r.offensive_identity.label()).collect();
    columns.push(Column::new("passing_percentage".into(), numbers(|r| r.passing_percentage)));
    columns.push(Column::new("offensive_identity".into(), labels));

    Ok(Table::from(DataFrame::new(columns)?))
}

// ---------------------------------------------------------------------------
// Source selection
// ---------------------------------------------------------------------------

/// Which player-level table a rollup was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupSource {
    Aggregated,
    Seasonal,
    Weekly,
}

/// Pick the first non-empty table in preference order: aggregated season,
/// provider seasonal, weekly.
pub fn select_source<'a>(
    aggregated: &'a Table,
    seasonal: &'a Table,
    weekly: &'a Table,
) -> Option<(RollupSource, &'a Table)> {
    [
        (RollupSource::Aggregated, aggregated),
        (RollupSource::Seasonal, seasonal),
        (RollupSource::Weekly, weekly),
    ]
    .into_iter()
    .find(|(_, t)| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Rollup
// ---------------------------------------------------------------------------

/// Position used for a row's team sub-totals: the roster's, else the row's.
const ROLLUP_POSITION: &str = "rollup_position";

/// Team totals: output name and the player column summed into it.
const TEAM_TOTALS: &[(&str, &str)] = &[
    ("total_fantasy_points", FANTASY_POINTS),
    ("total_fantasy_points_ppr", FANTASY_POINTS_PPR),
    ("passing_yards", PASSING_YARDS),
    ("passing_tds", PASSING_TDS),
    ("interceptions_thrown", INTERCEPTIONS),
    ("rushing_yards", RUSHING_YARDS),
    ("rushing_tds", RUSHING_TDS),
    ("rushing_attempts", RUSHING_ATTEMPTS),
    ("receiving_yards", RECEIVING_YARDS),
    ("receiving_tds", RECEIVING_TDS),
    ("receptions", RECEPTIONS),
    ("targets", TARGETS),
    (RED_ZONE_TARGETS, RED_ZONE_TARGETS),
    (RED_ZONE_CARRIES, RED_ZONE_CARRIES),
    (RED_ZONE_TOUCHES, RED_ZONE_TOUCHES),
];

/// Positional sub-totals: output name, player column, position.
const POSITION_TOTALS: &[(&str, &str, &str)] = &[
    ("qb_fantasy_points", FANTASY_POINTS_PPR, "QB"),
    ("rb_fantasy_points", FANTASY_POINTS_PPR, "RB"),
    ("wr_fantasy_points", FANTASY_POINTS_PPR, "WR"),
    ("te_fantasy_points", FANTASY_POINTS_PPR, "TE"),
    ("rb_rushing_attempts", RUSHING_ATTEMPTS, "RB"),
    ("rb_targets", TARGETS, "RB"),
    ("wr_targets", TARGETS, "WR"),
    ("te_targets", TARGETS, "TE"),
];

fn team_sum(values: Expr) -> Expr {
    values.cast(DataType::Float64).sort(SortOptions::default()).sum()
}

/// Roll player rows up into one row per team, ordered by team code.
///
/// Each row's team comes from the roster's player → team mapping; rows whose
/// player has no mapped team are left out. Returns an empty list when the
/// roster has no team column or `players` is empty.
pub fn team_rollup(players: &Table, roster: &Table) -> TableResult<Vec<TeamAnalytics>> {
    if players.is_empty() || !players.has_column(PLAYER_ID) {
        return Ok(Vec::new());
    }
    if !roster.has_column(TEAM) {
        info!("roster has no team column; team analytics unavailable");
        return Ok(Vec::new());
    }

    let position = if players.has_column(POSITION) {
        col(ROSTER_POSITION).fill_null(col(POSITION).cast(DataType::String))
    } else {
        col(ROSTER_POSITION)
    };
    let resolved = players
        .lazy()
        .with_column(col(PLAYER_ID).cast(DataType::String))
        .join(
            RosterIndex::build(roster)?.lookup_frame()?.lazy(),
            [col(PLAYER_ID)],
            [col(PLAYER_ID)],
            JoinArgs::new(JoinType::Inner),
        )
        .filter(col(ROSTER_TEAM).is_not_null())
        .with_column(position.alias(ROLLUP_POSITION))
        .collect()?;

    let unresolved = players.len() - resolved.height();
    if unresolved > 0 {
        debug!(rows = unresolved, "rows without a roster team excluded from rollup");
    }

    let mut sums: Vec<Expr> = Vec::new();
    for &(name, source) in TEAM_TOTALS {
        if players.is_numeric(source) {
            sums.push(team_sum(col(source)).alias(name));
        }
    }
    for &(name, source, pos) in POSITION_TOTALS {
        if players.is_numeric(source) {
            let at = col(ROLLUP_POSITION).eq(lit(pos));
            sums.push(team_sum(col(source).filter(at)).alias(name));
        }
    }

    let totals = Table::from(
        resolved
            .lazy()
            .group_by([col(ROSTER_TEAM)])
            .agg(sums)
            .sort_by_exprs([col(ROSTER_TEAM)], SortMultipleOptions::default())
            .collect()?,
    );

    let teams = totals.keys(ROSTER_TEAM)?;
    let rollup: Vec<TeamAnalytics> = teams
        .into_iter()
        .enumerate()
        .filter_map(|(row, team)| Some(summarize_team(team?, &totals, row)))
        .collect();
    info!(teams = rollup.len(), "computed team analytics");
    Ok(rollup)
}

fn summarize_team(team: String, totals: &Table, row: usize) -> TeamAnalytics {
    let optional = |name: &str| totals.get(row, name).as_ref().and_then(Value::as_f64);
    let total = |name: &str| optional(name).unwrap_or(0.0);

    let passing_yards = total("passing_yards");
    let rushing_yards = total("rushing_yards");
    let rushing_attempts = total("rushing_attempts");
    let receiving_yards = total("receiving_yards");
    let receptions = total("receptions");
    let targets = total("targets");
    let (passing_percentage, offensive_identity) = passing_share(passing_yards, rushing_yards);

    TeamAnalytics {
        total_fantasy_points: total("total_fantasy_points"),
        total_fantasy_points_ppr: total("total_fantasy_points_ppr"),
        passing_yards,
        passing_tds: total("passing_tds"),
        interceptions_thrown: total("interceptions_thrown"),
        rushing_yards,
        rushing_tds: total("rushing_tds"),
        rushing_attempts,
        receiving_yards,
        receiving_tds: total("receiving_tds"),
        receptions,
        targets,
        yards_per_carry: safe_ratio(rushing_yards, rushing_attempts),
        catch_rate: safe_ratio(receptions, targets) * 100.0,
        yards_per_target: safe_ratio(receiving_yards, targets),
        qb_fantasy_points: total("qb_fantasy_points"),
        rb_fantasy_points: total("rb_fantasy_points"),
        wr_fantasy_points: total("wr_fantasy_points"),
        te_fantasy_points: total("te_fantasy_points"),
        rb_touches: total("rb_rushing_attempts") + total("rb_targets"),
        wr_targets: total("wr_targets"),
        te_targets: total("te_targets"),
        red_zone_targets: optional(RED_ZONE_TARGETS),
        red_zone_carries: optional(RED_ZONE_CARRIES),
        red_zone_touches: optional(RED_ZONE_TOUCHES),
        passing_percentage,
        offensive_identity,
        team,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
