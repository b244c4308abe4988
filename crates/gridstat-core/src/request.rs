// Extraction request parameters and their validation.
//
// A request can only be constructed through the validating constructors, so
// the pipeline never sees an out-of-range season, an unknown position or an
// impossible week.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Earliest season the upstream provider publishes.
pub const FIRST_SEASON: u16 = 1999;
/// Regular season plus playoffs.
pub const MAX_WEEK: u8 = 22;
/// Seasons covered by a request that names none.
pub const DEFAULT_LOOKBACK: u16 = 5;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("invalid year `{value}`: expected a season between {min} and {max}")]
    InvalidYear { value: String, min: u16, max: u16 },

    #[error("unknown position `{value}`: expected one of {valid}")]
    UnknownPosition { value: String, valid: String },

    #[error("invalid week `{value}`: expected a week between 1 and {max}")]
    InvalidWeek { value: String, max: u8 },

    #[error("at least one {field} is required")]
    Empty { field: &'static str },
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
}

impl Position {
    pub const ALL: [Position; 4] = [Position::QB, Position::RB, Position::WR, Position::TE];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::QB => "QB",
            Position::RB => "RB",
            Position::WR => "WR",
            Position::TE => "TE",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        Position::ALL
            .into_iter()
            .find(|p| p.as_str() == code)
            .ok_or_else(|| RequestError::UnknownPosition {
                value: s.trim().to_string(),
                valid: Position::ALL.map(|p| p.as_str()).join(", "),
            })
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Bounds applied when validating a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    pub min_season: u16,
    pub max_week: u8,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            min_season: FIRST_SEASON,
            max_week: MAX_WEEK,
        }
    }
}

/// The season in progress on `today`. A season starts in September, so
/// January through August belong to the previous year's season.
pub fn current_season(today: NaiveDate) -> u16 {
    let year = u16::try_from(today.year()).unwrap_or(FIRST_SEASON);
    if today.month() >= 9 {
        year
    } else {
        year.saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A validated extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractRequest {
    #[serde(rename = "years")]
    seasons: Vec<u16>,
    positions: Vec<Position>,
    week: Option<u8>,
}

impl ExtractRequest {
    /// Validate raw parameter values. Values are trimmed, positions are
    /// case-insensitive, and duplicates are dropped keeping first occurrence.
    pub fn parse<Y: AsRef<str>, P: AsRef<str>>(
        years: &[Y],
        positions: &[P],
        week: Option<&str>,
        limits: &RequestLimits,
        current_season: u16,
    ) -> Result<Self, RequestError> {
        if years.is_empty() {
            return Err(RequestError::Empty { field: "year" });
        }
        if positions.is_empty() {
            return Err(RequestError::Empty { field: "position" });
        }

        let mut seasons = Vec::with_capacity(years.len());
        for raw in years {
            let season = parse_season(raw.as_ref(), limits.min_season, current_season)?;
            if !seasons.contains(&season) {
                seasons.push(season);
            }
        }

        let mut parsed = Vec::with_capacity(positions.len());
        for raw in positions {
            let position: Position = raw.as_ref().parse()?;
            if !parsed.contains(&position) {
                parsed.push(position);
            }
        }

        let week = week.map(|w| parse_week(w, limits.max_week)).transpose()?;

        Ok(Self {
            seasons,
            positions: parsed,
            week,
        })
    }

    /// The last `lookback` seasons up to `current_season`, every position, no
    /// week filter.
    pub fn recent(current_season: u16, lookback: u16) -> Self {
        let first = current_season.saturating_sub(lookback.max(1) - 1);
        Self {
            seasons: (first..=current_season).collect(),
            positions: Position::ALL.to_vec(),
            week: None,
        }
    }

    pub fn seasons(&self) -> &[u16] {
        &self.seasons
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn week(&self) -> Option<u8> {
        self.week
    }

    /// Whether `code` names one of the requested positions.
    pub fn includes_position(&self, code: &str) -> bool {
        self.positions.iter().any(|p| p.as_str() == code)
    }
}

fn parse_season(raw: &str, min: u16, max: u16) -> Result<u16, RequestError> {
    let invalid = || RequestError::InvalidYear {
        value: raw.trim().to_string(),
        min,
        max,
    };
    let season: u16 = raw.trim().parse().map_err(|_| invalid())?;
    if (min..=max).contains(&season) {
        Ok(season)
    } else {
        Err(invalid())
    }
}

fn parse_week(raw: &str, max: u8) -> Result<u8, RequestError> {
    let invalid = || RequestError::InvalidWeek {
        value: raw.trim().to_string(),
        max,
    };
    let week: u8 = raw.trim().parse().map_err(|_| invalid())?;
    if (1..=max).contains(&week) {
        Ok(week)
    } else {
        Err(invalid())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
