use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Visibility state of a single tile as seen by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileState {
    #[default]
    Hidden,
    Revealed,
    Mark,
    Mine,
    FalseMark,
}

impl TileState {
    pub const ALL: [TileState; 5] = [
        Self::Hidden,
        Self::Revealed,
        Self::Mark,
        Self::Mine,
        Self::FalseMark,
    ];

    /// Wire name of the state, the inverse of [`TileState::from_str`].
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Revealed => "revealed",
            Self::Mark => "mark",
            Self::Mine => "mine",
            Self::FalseMark => "false_mark",
        }
    }
}

impl FromStr for TileState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidden" => Ok(Self::Hidden),
            "revealed" => Ok(Self::Revealed),
            "mark" => Ok(Self::Mark),
            "mine" => Ok(Self::Mine),
            "false_mark" => Ok(Self::FalseMark),
            other => Err(ParseError::UnknownTileState(other.to_owned())),
        }
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single game.
///
/// `Running` is the only initial state. `Won` and `Lost` are terminal until
/// a new game is started.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FieldState {
    #[default]
    Running,
    Won,
    Lost,
}

impl FieldState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    /// Whether a delta may move the field from `self` to `next`.
    pub fn can_transition_to(self, next: FieldState) -> bool {
        match self {
            Self::Running => true,
            terminal => terminal == next,
        }
    }
}

impl FromStr for FieldState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            other => Err(ParseError::UnknownFieldState(other.to_owned())),
        }
    }
}

impl fmt::Display for FieldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile {
    pub state: TileState,
    /// Adjacent mine count, only meaningful for revealed tiles.
    pub mines_close: u32,
}

impl Tile {
    pub const HIDDEN: Tile = Tile {
        state: TileState::Hidden,
        mines_close: 0,
    };

    pub const fn new(state: TileState, mines_close: u32) -> Self {
        Self { state, mines_close }
    }
}

/// In-bounds grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Parses a nullable ISO-8601 timestamp.
///
/// The producer encodes "not set" as `null`, and an empty string is treated
/// the same way.
pub fn parse_timestamp(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ParseError> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|source| ParseError::InvalidTimestamp {
                raw: raw.to_owned(),
                source,
            }),
    }
}
