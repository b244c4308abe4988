// Canonical column vocabulary and provider-alias normalization.
//
// Provider releases rename columns between versions (`player_display_name`
// vs `player_name`, `carries` vs `rushing_attempts`, ...). Normalization maps
// every known alias onto one canonical name, once, so that the aggregation
// and rollup code only ever deals with the canonical vocabulary.

use crate::table::{is_numeric_dtype, Table, TableResult};
use polars::prelude::*;
use tracing::debug;

// ---------------------------------------------------------------------------
// Canonical names used across the pipeline
// ---------------------------------------------------------------------------

pub const PLAYER_ID: &str = "player_id";
pub const PLAYER_NAME: &str = "player_name";
pub const POSITION: &str = "position";
pub const TEAM: &str = "team";
pub const SEASON: &str = "season";
pub const WEEK: &str = "week";
pub const GAMES: &str = "games";

pub const FANTASY_POINTS: &str = "fantasy_points";
pub const FANTASY_POINTS_PPR: &str = "fantasy_points_ppr";
pub const PASSING_YARDS: &str = "passing_yards";
pub const PASSING_TDS: &str = "passing_tds";
pub const INTERCEPTIONS: &str = "interceptions";
pub const PASSING_ATTEMPTS: &str = "passing_attempts";
pub const COMPLETIONS: &str = "completions";
pub const RUSHING_YARDS: &str = "rushing_yards";
pub const RUSHING_TDS: &str = "rushing_tds";
pub const RUSHING_ATTEMPTS: &str = "rushing_attempts";
pub const RECEIVING_YARDS: &str = "receiving_yards";
pub const RECEIVING_TDS: &str = "receiving_tds";
pub const RECEPTIONS: &str = "receptions";
pub const TARGETS: &str = "targets";
pub const RED_ZONE_TARGETS: &str = "red_zone_targets";
pub const RED_ZONE_CARRIES: &str = "red_zone_carries";
pub const RED_ZONE_TOUCHES: &str = "red_zone_touches";

// ---------------------------------------------------------------------------
// Alias table
// ---------------------------------------------------------------------------

/// Canonical name paired with the provider names it may arrive under, in
/// preference order.
pub type AliasTable = &'static [(&'static str, &'static [&'static str])];

pub const ALIASES: AliasTable = &[
    (PLAYER_NAME, &["player_display_name", "full_name"]),
    (TEAM, &["recent_team", "team_abbr"]),
    (POSITION, &["fantasy_pos"]),
    (RUSHING_ATTEMPTS, &["carries"]),
    (PASSING_ATTEMPTS, &["attempts"]),
];

// ---------------------------------------------------------------------------
// Per-kind vocabularies
// ---------------------------------------------------------------------------

/// Which upstream dataset a table came from. Each kind has its own canonical
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Weekly,
    Seasonal,
    Roster,
}

const WEEKLY_FIELDS: &[&str] = &[
    PLAYER_ID,
    PLAYER_NAME,
    POSITION,
    TEAM,
    SEASON,
    WEEK,
    FANTASY_POINTS,
    FANTASY_POINTS_PPR,
    PASSING_YARDS,
    PASSING_TDS,
    INTERCEPTIONS,
    PASSING_ATTEMPTS,
    COMPLETIONS,
    "passing_air_yards",
    "passing_yards_after_catch",
    "passing_first_downs",
    RUSHING_YARDS,
    RUSHING_TDS,
    RUSHING_ATTEMPTS,
    "rushing_first_downs",
    "rushing_epa",
    "rushing_yards_after_contact",
    RECEIVING_YARDS,
    RECEIVING_TDS,
    RECEPTIONS,
    TARGETS,
    "receiving_air_yards",
    "receiving_yards_after_catch",
    "receiving_first_downs",
    "receiving_epa",
    "target_share",
    RED_ZONE_TOUCHES,
    RED_ZONE_TARGETS,
    RED_ZONE_CARRIES,
    "snap_counts",
    "snap_count_pct",
    "air_yards_share",
    "wopr",
];

const SEASONAL_FIELDS: &[&str] = &[
    PLAYER_ID,
    PLAYER_NAME,
    POSITION,
    TEAM,
    SEASON,
    GAMES,
    FANTASY_POINTS,
    FANTASY_POINTS_PPR,
    PASSING_YARDS,
    PASSING_TDS,
    INTERCEPTIONS,
    PASSING_ATTEMPTS,
    COMPLETIONS,
    "passing_air_yards",
    "passing_yards_after_catch",
    "passing_first_downs",
    "passing_epa",
    "dakota",
    RUSHING_YARDS,
    RUSHING_TDS,
    RUSHING_ATTEMPTS,
    "rushing_first_downs",
    "rushing_epa",
    "rushing_yards_after_contact",
    RECEIVING_YARDS,
    RECEIVING_TDS,
    RECEPTIONS,
    TARGETS,
    "receiving_air_yards",
    "receiving_yards_after_catch",
    "receiving_first_downs",
    "receiving_epa",
    "target_share",
    RED_ZONE_TOUCHES,
    RED_ZONE_TARGETS,
    RED_ZONE_CARRIES,
    "air_yards_share",
    "wopr",
    "racr",
];

/// Canonical fields holding text. Every other canonical field is numeric.
pub const TEXT_FIELDS: &[&str] = &[
    PLAYER_ID,
    PLAYER_NAME,
    POSITION,
    TEAM,
    "height",
    "birth_date",
    "college",
];

const ROSTER_FIELDS: &[&str] = &[
    PLAYER_ID,
    PLAYER_NAME,
    POSITION,
    TEAM,
    "jersey_number",
    "height",
    "weight",
    "birth_date",
    "college",
    SEASON,
];

impl TableKind {
    pub fn vocabulary(self) -> &'static [&'static str] {
        match self {
            TableKind::Weekly => WEEKLY_FIELDS,
            TableKind::Seasonal => SEASONAL_FIELDS,
            TableKind::Roster => ROSTER_FIELDS,
        }
    }

    pub fn is_canonical(self, column: &str) -> bool {
        self.vocabulary().contains(&column)
    }
}

/// Text fields are `String`; everything else is numeric.
pub fn is_text_field(column: &str) -> bool {
    TEXT_FIELDS.contains(&column)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Apply `aliases` to a copy of `raw`: each canonical name that is absent
/// takes over the first present source column. Existing canonical columns
/// are never replaced and nothing is invented.
pub fn apply_aliases(raw: &Table, aliases: AliasTable) -> TableResult<Table> {
    let mut df = raw.frame().clone();
    for &(canonical, sources) in aliases {
        if df.get_column_index(canonical).is_some() {
            continue;
        }
        if let Some(source) = sources.iter().find(|s| df.get_column_index(s).is_some()) {
            debug!(from = *source, to = canonical, "renaming provider column");
            df.rename(source, PlSmallStr::from_static(canonical))?;
        }
    }
    Ok(Table::from(df))
}

/// Normalize a raw provider table into the canonical vocabulary of `kind`.
///
/// Aliases are resolved and every non-canonical column is dropped. Text
/// fields are cast to `String`. Numeric fields that arrived untyped or as
/// text (an all-empty column, or placeholders such as `n/a`) are cast to
/// `Float64`, so cells that are not numbers become nulls.
pub fn normalize(raw: &Table, kind: TableKind) -> TableResult<Table> {
    let aliased = apply_aliases(raw, ALIASES)?.into_frame();
    let before = aliased.width();

    let mut columns = Vec::with_capacity(before);
    for column in aliased.take_columns() {
        let name = column.name().clone();
        if !kind.is_canonical(&name) {
            continue;
        }
        let typed = if is_text_field(&name) {
            match column.dtype() {
                DataType::String => column,
                _ => column.cast(&DataType::String)?,
            }
        } else if is_numeric_dtype(column.dtype()) {
            column
        } else {
            debug!(column = %name, dtype = %column.dtype(), "casting stat column to numeric");
            column.cast(&DataType::Float64)?
        };
        columns.push(typed);
    }

    let dropped = before - columns.len();
    if dropped > 0 {
        debug!(?kind, dropped, "dropped non-canonical columns");
    }
    Ok(Table::from(DataFrame::new(columns)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    /// One row where every cell holds its own column name.
    fn raw(names: &[&str]) -> Table {
        let columns = names
            .iter()
            .map(|n| Column::new((*n).into(), [*n]))
            .collect();
        Table::from(DataFrame::new(columns).unwrap())
    }

    fn text(t: &Table, name: &str) -> Option<String> {
        t.get(0, name).and_then(|v| v.as_str().map(str::to_string))
    }

    #[test]
    fn renames_aliases_onto_canonical_names() {
        let t = normalize(
            &raw(&["player_id", "player_display_name", "recent_team", "fantasy_pos", "carries"]),
            TableKind::Weekly,
        )
        .unwrap();
        let names: Vec<&str> = t.column_names().collect();
        assert_eq!(names, vec!["player_id", "player_name", "team", "position", "rushing_attempts"]);
        // Values travel with the renamed column.
        assert_eq!(text(&t, "team").as_deref(), Some("recent_team"));
    }

    #[test]
    fn canonical_column_wins_over_alias() {
        let t = normalize(&raw(&["player_name", "player_display_name", "team", "team_abbr"]), TableKind::Weekly)
            .unwrap();
        assert_eq!(text(&t, "player_name").as_deref(), Some("player_name"));
        assert_eq!(text(&t, "team").as_deref(), Some("team"));
        assert!(!t.has_column("player_display_name"));
        assert!(!t.has_column("team_abbr"));
    }

    #[test]
    fn first_present_alias_is_used() {
        let t = normalize(&raw(&["player_id", "team_abbr", "recent_team"]), TableKind::Roster).unwrap();
        assert_eq!(text(&t, "team").as_deref(), Some("recent_team"));
    }

    #[test]
    fn drops_non_canonical_columns() {
        let t = normalize(&raw(&["player_id", "headshot_url", "passing_yards"]), TableKind::Weekly).unwrap();
        for name in t.column_names() {
            assert!(TableKind::Weekly.is_canonical(name), "{name} is not canonical");
        }
        assert!(!t.has_column("headshot_url"));
    }

    #[test]
    fn vocabulary_depends_on_kind() {
        let input = raw(&["player_id", "week", "games", "college"]);
        let weekly = normalize(&input, TableKind::Weekly).unwrap();
        let seasonal = normalize(&input, TableKind::Seasonal).unwrap();
        let roster = normalize(&input, TableKind::Roster).unwrap();

        assert!(weekly.has_column("week") && !weekly.has_column("games"));
        assert!(seasonal.has_column("games") && !seasonal.has_column("week"));
        assert!(roster.has_column("college") && !roster.has_column("week"));
    }

    #[test]
    fn missing_columns_are_not_invented() {
        let t = normalize(&raw(&["player_id"]), TableKind::Weekly).unwrap();
        assert_eq!(t.width(), 1);
        assert!(!t.has_column("team"));
    }

    #[test]
    fn input_is_untouched() {
        let input = raw(&["recent_team", "extra"]);
        let snapshot = input.clone();
        let _ = normalize(&input, TableKind::Weekly).unwrap();
        assert_eq!(input, snapshot);
    }

    #[test]
    fn empty_table_normalizes_to_empty() {
        let t = normalize(&Table::new(), TableKind::Seasonal).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.width(), 0);
    }

    #[test]
    fn text_placeholders_in_stat_columns_become_null() {
        let t = Table::from(
            df!(
                "player_id" => ["p1", "p2"],
                "targets" => ["4", "n/a"],
            )
            .unwrap(),
        );
        let t = normalize(&t, TableKind::Weekly).unwrap();
        assert!(t.is_numeric("targets"));
        assert_eq!(t.get(0, "targets"), Some(Value::Float(4.0)));
        assert_eq!(t.get(1, "targets"), Some(Value::Null));
    }

    #[test]
    fn all_null_stat_column_is_numeric() {
        let snaps = Column::from(Series::new_null("snap_counts".into(), 2));
        let ids = Column::new("player_id".into(), ["p1", "p2"]);
        let t = Table::from(DataFrame::new(vec![ids, snaps]).unwrap());

        let t = normalize(&t, TableKind::Weekly).unwrap();
        assert_eq!(t.dtype("snap_counts"), Some(&DataType::Float64));
        assert_eq!(t.get(0, "snap_counts"), Some(Value::Null));
    }

    #[test]
    fn numeric_identifiers_become_text() {
        let t = Table::from(df!("player_id" => [1234i64], "season" => [2024i64]).unwrap());
        let t = normalize(&t, TableKind::Roster).unwrap();
        assert_eq!(t.get(0, "player_id"), Some(Value::Str("1234".into())));
        assert_eq!(t.get(0, "season"), Some(Value::Int(2024)));
    }
}
