// Roster lookups: player → (team, position), and the player-info view.
//
// Rosters arrive with one row per player per season. Lookups use the most
// recent season a player appears in; on a tie the later row wins.

use crate::schema::{PLAYER_ID, POSITION, SEASON, TEAM};
use crate::table::{Table, TableResult};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Lookup-frame columns carrying the roster's view of a player.
pub const ROSTER_TEAM: &str = "roster_team";
pub const ROSTER_POSITION: &str = "roster_position";

/// Roster facts about one player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RosterEntry {
    team: Option<String>,
    position: Option<String>,
}

/// Player id → latest roster entry.
#[derive(Debug, Clone, Default)]
pub struct RosterIndex {
    entries: HashMap<String, RosterEntry>,
}

impl RosterIndex {
    /// Index a normalized roster table. Rows without a player id are ignored.
    /// A roster without a `team` column yields entries with no team.
    pub fn build(roster: &Table) -> TableResult<Self> {
        if !roster.has_column(PLAYER_ID) {
            return Ok(Self::default());
        }
        let latest = latest_rows(roster)?;
        let ids = latest.keys(PLAYER_ID)?;
        let teams = latest.keys(TEAM)?;
        let positions = latest.keys(POSITION)?;

        let entries: HashMap<String, RosterEntry> = ids
            .into_iter()
            .zip(teams.into_iter().zip(positions))
            .filter_map(|(id, (team, position))| Some((id?, RosterEntry { team, position })))
            .collect();
        debug!(players = entries.len(), "built roster index");
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The index as a frame of `player_id`, `roster_team` and
    /// `roster_position`, ordered by player id, for joining onto stat rows.
    pub fn lookup_frame(&self) -> TableResult<DataFrame> {
        let mut entries: Vec<(&String, &RosterEntry)> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let ids: Vec<&str> = entries.iter().map(|(id, _)| id.as_str()).collect();
        let teams: Vec<Option<&str>> = entries.iter().map(|(_, e)| e.team.as_deref()).collect();
        let positions: Vec<Option<&str>> = entries.iter().map(|(_, e)| e.position.as_deref()).collect();

        Ok(DataFrame::new(vec![
            Column::new(PLAYER_ID.into(), ids),
            Column::new(ROSTER_TEAM.into(), teams),
            Column::new(ROSTER_POSITION.into(), positions),
        ])?)
    }
}

/// Each player's most recent roster row, ordered by player id, with the
/// roster's column order. Rows without a player id are dropped.
fn latest_rows(roster: &Table) -> TableResult<Table> {
    let names: Vec<&str> = roster.column_names().collect();
    let latest: Vec<Expr> = names
        .iter()
        .filter(|n| **n != PLAYER_ID)
        .map(|n| col(*n).last())
        .collect();

    let mut rows = roster.lazy().filter(col(PLAYER_ID).is_not_null());
    if roster.has_column(SEASON) {
        // Nulls sort first, so any known season beats an unknown one.
        rows = rows.sort_by_exprs([col(SEASON)], SortMultipleOptions::default().with_maintain_order(true));
    }
    let df = rows
        .group_by([col(PLAYER_ID)])
        .agg(latest)
        .sort_by_exprs([col(PLAYER_ID)], SortMultipleOptions::default())
        .collect()?;
    Ok(Table::from(df.select(names)?))
}

/// One row per player from their most recent roster row, ordered by player
/// id. Gaps in text columns become empty strings; numeric gaps are left for
/// the sanitizer.
pub fn player_info(roster: &Table) -> TableResult<Table> {
    if roster.is_empty() || !roster.has_column(PLAYER_ID) {
        return Ok(Table::new());
    }

    let latest = latest_rows(roster)?;
    let fills: Vec<Expr> = latest
        .frame()
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::String)
        .map(|c| col(c.name().clone()).fill_null(lit("")))
        .collect();
    Ok(Table::from(latest.lazy().with_columns(fills).collect()?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
