use serde::{Deserialize, Serialize};

use crate::{
    error::ParseError,
    models::{Tile, TileState},
};

/// A tile as the server sends it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileWire {
    pub state: String,
    #[serde(default)]
    pub mines_close: Option<u32>,
}

impl TileWire {
    pub fn new(state: impl Into<String>, mines_close: u32) -> Self {
        Self {
            state: state.into(),
            mines_close: Some(mines_close),
        }
    }

    /// A missing or null count is read as zero.
    pub fn parse(&self) -> Result<Tile, ParseError> {
        Ok(Tile {
            state: self.state.parse::<TileState>()?,
            mines_close: self.mines_close.unwrap_or(0),
        })
    }
}

impl From<Tile> for TileWire {
    fn from(tile: Tile) -> Self {
        Self::new(tile.state.as_str(), tile.mines_close)
    }
}

/// Scalar status of a field, resent with every delta.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldStatusWire {
    /// Goes negative when players place more marks than there are mines.
    pub mines_left: i64,
    pub state: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub recent_player: String,
}

/// A new game: every scalar, but no tiles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGameWire {
    pub mines: u32,
    pub size: usize,
    #[serde(flatten)]
    pub status: FieldStatusWire,
}

/// Full snapshot of a field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWire {
    pub mines: u32,
    pub size: usize,
    pub tiles: Vec<Vec<TileWire>>,
    #[serde(flatten)]
    pub status: FieldStatusWire,
}

/// `[[row, col], tile]`. Coordinates stay signed until validated.
pub type Change = ([i64; 2], TileWire);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    #[serde(rename = "reveal")]
    Reveal { row: usize, col: usize },
    #[serde(rename = "mark")]
    Mark { row: usize, col: usize },
    #[serde(rename = "play_again")]
    PlayAgain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "field")]
    Field { field: FieldWire },
    #[serde(rename = "changes")]
    Changes {
        field: FieldStatusWire,
        changes: Vec<Change>,
    },
    #[serde(rename = "play_again")]
    PlayAgain { field: NewGameWire },
}
