use std::collections::HashMap;

use chrono::{DateTime, Utc};
use minesweeper_common::{
    ParseError,
    models::{FieldState, Pos, Tile, TileState, parse_timestamp},
    protocol::{Change, FieldStatusWire, FieldWire, NewGameWire, TileWire},
};

use crate::{
    clock::{Clock, SystemClock},
    error::FieldError,
};

/// Scalars shared by snapshots, deltas and new games, already validated.
struct Status {
    mines_left: i64,
    state: FieldState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    recent_player: String,
}

impl Status {
    fn parse(wire: &FieldStatusWire) -> Result<Self, FieldError> {
        let state = wire.state.parse::<FieldState>()?;
        let started_at = parse_timestamp(wire.started_at.as_deref())?;
        let finished_at = parse_timestamp(wire.finished_at.as_deref())?;

        if state == FieldState::Running && finished_at.is_some() {
            return Err(FieldError::FinishedWhileRunning);
        }
        if let (Some(started_at), Some(finished_at)) = (started_at, finished_at)
            && finished_at < started_at
        {
            return Err(FieldError::FinishedBeforeStart);
        }

        Ok(Self {
            mines_left: wire.mines_left,
            state,
            started_at,
            finished_at,
            recent_player: wire.recent_player.clone(),
        })
    }
}

/// Client-side view of a square minesweeper board.
///
/// Built once from a snapshot and then mutated in place by
/// [`apply_delta`](Self::apply_delta) and
/// [`reset_for_new_game`](Self::reset_for_new_game), so anything holding on
/// to the model keeps seeing the current game. A call that returns an error
/// leaves the model exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModel {
    mines: u32,
    size: usize,
    mines_left: i64,
    tiles: Vec<Vec<Tile>>,
    state: FieldState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    recent_player: String,
}

impl FieldModel {
    /// Largest number of tiles a field may have.
    pub const MAX_TILES: usize = 1 << 20;

    /// Builds the model from a full snapshot.
    pub fn from_wire(wire: &FieldWire) -> Result<Self, FieldError> {
        let status = Status::parse(&wire.status)?;

        Self::check_size(wire.size)?;
        if wire.tiles.len() != wire.size || wire.tiles.iter().any(|row| row.len() != wire.size) {
            return Err(FieldError::InvalidBoardShape { size: wire.size });
        }
        let tiles = wire
            .tiles
            .iter()
            .map(|row| row.iter().map(TileWire::parse).collect())
            .collect::<Result<Vec<Vec<Tile>>, ParseError>>()?;

        let mut field = Self {
            mines: wire.mines,
            size: wire.size,
            mines_left: 0,
            tiles,
            state: FieldState::Running,
            started_at: None,
            finished_at: None,
            recent_player: String::new(),
        };
        field.set_status(status);
        Ok(field)
    }

    /// Applies the server's status after a move together with the tiles it
    /// changed.
    ///
    /// The whole batch is validated before anything is written. Changes are
    /// applied in list order, so the last entry for a position wins. Returns
    /// the positions written, in that order.
    pub fn apply_delta(
        &mut self,
        status: &FieldStatusWire,
        changes: &[Change],
    ) -> Result<Vec<Pos>, FieldError> {
        let status = Status::parse(status)?;
        if !self.state.can_transition_to(status.state) {
            return Err(FieldError::InvalidTransition {
                from: self.state,
                to: status.state,
            });
        }

        let parsed = changes
            .iter()
            .map(|([row, col], tile)| -> Result<(Pos, Tile), FieldError> {
                Ok((self.checked_pos(*row, *col)?, tile.parse()?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.set_status(status);
        let mut written = Vec::with_capacity(parsed.len());
        for (pos, tile) in parsed {
            self.tiles[pos.row][pos.col] = tile;
            written.push(pos);
        }
        Ok(written)
    }

    /// Starts a new game in place. The grid is rebuilt at the new size with
    /// every tile hidden.
    pub fn reset_for_new_game(&mut self, wire: &NewGameWire) -> Result<(), FieldError> {
        let status = Status::parse(&wire.status)?;
        if status.state != FieldState::Running {
            return Err(FieldError::InvalidTransition {
                from: self.state,
                to: status.state,
            });
        }
        Self::check_size(wire.size)?;

        self.mines = wire.mines;
        self.size = wire.size;
        self.tiles = vec![vec![Tile::HIDDEN; wire.size]; wire.size];
        self.set_status(status);
        Ok(())
    }

    fn check_size(size: usize) -> Result<(), FieldError> {
        if size
            .checked_mul(size)
            .is_none_or(|tiles| tiles > Self::MAX_TILES)
        {
            return Err(FieldError::InvalidBoardShape { size });
        }
        Ok(())
    }

    fn set_status(&mut self, status: Status) {
        self.mines_left = status.mines_left;
        self.state = status.state;
        self.started_at = status.started_at;
        self.finished_at = status.finished_at;
        self.recent_player = status.recent_player;
    }

    fn checked_pos(&self, row: i64, col: i64) -> Result<Pos, FieldError> {
        if self.is_valid_position(row, col) {
            Ok(Pos::new(row as usize, col as usize))
        } else {
            Err(FieldError::InvalidPosition {
                row,
                col,
                size: self.size,
            })
        }
    }

    /// Whether `(row, col)` lies on the board. Any integer is accepted.
    pub fn is_valid_position(&self, row: i64, col: i64) -> bool {
        let size = i64::try_from(self.size).unwrap_or(i64::MAX);
        (0..size).contains(&row) && (0..size).contains(&col)
    }

    /// Whole seconds played so far, measured against the system clock while
    /// the game is still running.
    pub fn game_seconds(&self) -> i64 {
        self.game_seconds_with(&SystemClock)
    }

    /// Like [`game_seconds`](Self::game_seconds), reading "now" from `clock`.
    pub fn game_seconds_with(&self, clock: &impl Clock) -> i64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let end = self.finished_at.unwrap_or_else(|| clock.now());
        (end - started_at).num_milliseconds().div_euclid(1000)
    }

    /// Total mines in the current game
    pub fn mines(&self) -> u32 {
        self.mines
    }

    /// Side length of the square board
    pub fn size(&self) -> usize {
        self.size
    }

    /// Mines minus marks, as counted by the server. Negative when the board
    /// is over-marked.
    pub fn mines_left(&self) -> i64 {
        self.mines_left
    }

    /// All tiles, indexed `[row][col]`
    pub fn tiles(&self) -> &[Vec<Tile>] {
        &self.tiles
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.iter().map(Vec::as_slice)
    }

    /// Get the tile at a position
    pub fn tile(&self, pos: Pos) -> Option<&Tile> {
        self.tiles.get(pos.row)?.get(pos.col)
    }

    /// Get the tile at raw coordinates, `None` when off the board
    pub fn tile_at(&self, row: i64, col: i64) -> Option<&Tile> {
        self.checked_pos(row, col).ok().and_then(|pos| self.tile(pos))
    }

    /// Current lifecycle state
    pub fn state(&self) -> FieldState {
        self.state
    }

    /// Check if the game was won or lost
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Player who made the last move
    pub fn recent_player(&self) -> &str {
        &self.recent_player
    }

    /// Number of tiles in each state.
    pub fn count_tiles(&self) -> HashMap<TileState, usize> {
        let mut counts = HashMap::new();
        for tile in self.tiles.iter().flatten() {
            *counts.entry(tile.state).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::FixedClock;

    fn status(state: &str, started_at: Option<&str>, finished_at: Option<&str>) -> FieldStatusWire {
        FieldStatusWire {
            mines_left: 2,
            state: state.to_owned(),
            started_at: started_at.map(str::to_owned),
            finished_at: finished_at.map(str::to_owned),
            recent_player: "alice".to_owned(),
        }
    }

    fn hidden_field(size: usize) -> FieldModel {
        FieldModel::from_wire(&FieldWire {
            mines: 2,
            size,
            tiles: vec![vec![TileWire::new("hidden", 0); size]; size],
            status: status("running", None, None),
        })
        .unwrap()
    }

    fn at(secs: i64, millis: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, millis * 1_000_000).unwrap()
    }

    #[test]
    fn snapshot_with_ragged_rows_is_rejected() {
        let mut tiles = vec![vec![TileWire::new("hidden", 0); 3]; 3];
        tiles[1].pop();

        let err = FieldModel::from_wire(&FieldWire {
            mines: 1,
            size: 3,
            tiles,
            status: status("running", None, None),
        })
        .unwrap_err();

        assert_eq!(err, FieldError::InvalidBoardShape { size: 3 });
    }

    #[test]
    fn snapshot_with_unknown_tile_state_is_rejected() {
        let mut tiles = vec![vec![TileWire::new("hidden", 0); 2]; 2];
        tiles[1][0] = TileWire::new("exploded", 0);

        let err = FieldModel::from_wire(&FieldWire {
            mines: 1,
            size: 2,
            tiles,
            status: status("running", None, None),
        })
        .unwrap_err();

        assert_eq!(
            err,
            FieldError::from(ParseError::UnknownTileState("exploded".into()))
        );
    }

    #[test]
    fn delta_only_touches_listed_tiles() {
        let mut field = hidden_field(3);
        let before = field.clone();

        let written = field
            .apply_delta(
                &status("running", Some("2024-01-01T00:00:00Z"), None),
                &[([1, 2], TileWire::new("revealed", 3))],
            )
            .unwrap();

        assert_eq!(written, vec![Pos::new(1, 2)]);
        assert_eq!(field.tile(Pos::new(1, 2)), Some(&Tile::new(TileState::Revealed, 3)));
        for row in 0..3 {
            for col in 0..3 {
                if (row, col) != (1, 2) {
                    assert_eq!(field.tile(Pos::new(row, col)), before.tile(Pos::new(row, col)));
                }
            }
        }
        assert_eq!(field.mines(), before.mines());
        assert_eq!(field.size(), before.size());
    }

    #[test]
    fn later_change_for_same_position_wins() {
        let mut field = hidden_field(2);

        field
            .apply_delta(
                &status("running", None, None),
                &[
                    ([0, 1], TileWire::new("mark", 0)),
                    ([0, 1], TileWire::new("hidden", 0)),
                ],
            )
            .unwrap();

        assert_eq!(field.tile_at(0, 1), Some(&Tile::HIDDEN));
    }

    #[test]
    fn out_of_range_change_leaves_field_untouched() {
        let mut field = hidden_field(2);
        let before = field.clone();

        let err = field
            .apply_delta(
                &status("lost", Some("2024-01-01T00:00:00Z"), Some("2024-01-01T00:01:00Z")),
                &[
                    ([0, 0], TileWire::new("mine", 0)),
                    ([2, 0], TileWire::new("revealed", 1)),
                ],
            )
            .unwrap_err();

        assert_eq!(err, FieldError::InvalidPosition { row: 2, col: 0, size: 2 });
        assert_eq!(field, before);
    }

    #[test]
    fn terminal_state_cannot_revert_without_new_game() {
        let mut field = hidden_field(2);
        field
            .apply_delta(
                &status("won", Some("2024-01-01T00:00:00Z"), Some("2024-01-01T00:00:10Z")),
                &[],
            )
            .unwrap();

        let err = field
            .apply_delta(&status("running", Some("2024-01-01T00:00:00Z"), None), &[])
            .unwrap_err();

        assert_eq!(
            err,
            FieldError::InvalidTransition {
                from: FieldState::Won,
                to: FieldState::Running,
            }
        );
        assert_eq!(field.state(), FieldState::Won);
    }

    #[test]
    fn inconsistent_timestamps_are_rejected() {
        let mut field = hidden_field(2);

        assert_eq!(
            field.apply_delta(
                &status("running", Some("2024-01-01T00:00:00Z"), Some("2024-01-01T00:00:01Z")),
                &[],
            ),
            Err(FieldError::FinishedWhileRunning)
        );
        assert_eq!(
            field.apply_delta(
                &status("lost", Some("2024-01-01T00:00:05Z"), Some("2024-01-01T00:00:01Z")),
                &[],
            ),
            Err(FieldError::FinishedBeforeStart)
        );
        assert_eq!(field.state(), FieldState::Running);
    }

    #[test]
    fn new_game_rebuilds_grid_at_new_size() {
        let mut field = hidden_field(2);
        field
            .apply_delta(
                &status("lost", Some("2024-01-01T00:00:00Z"), Some("2024-01-01T00:00:03Z")),
                &[([0, 0], TileWire::new("mine", 0))],
            )
            .unwrap();

        field
            .reset_for_new_game(&NewGameWire {
                mines: 7,
                size: 5,
                status: status("running", None, None),
            })
            .unwrap();

        assert_eq!(field.mines(), 7);
        assert_eq!(field.size(), 5);
        assert_eq!(field.state(), FieldState::Running);
        assert_eq!(field.tiles().len(), 5);
        assert!(field.rows().all(|row| row.len() == 5));
        assert_eq!(field.count_tiles(), HashMap::from([(TileState::Hidden, 25)]));
        assert_eq!(field.game_seconds(), 0);
    }

    #[test]
    fn new_game_must_start_running() {
        let mut field = hidden_field(2);
        let before = field.clone();

        let err = field
            .reset_for_new_game(&NewGameWire {
                mines: 1,
                size: 2,
                status: status("won", None, None),
            })
            .unwrap_err();

        assert!(matches!(err, FieldError::InvalidTransition { to: FieldState::Won, .. }));
        assert_eq!(field, before);
    }

    #[test]
    fn new_game_with_inconsistent_timestamps_is_rejected() {
        let mut field = hidden_field(2);
        let before = field.clone();

        for (status, expected) in [
            (
                status("running", Some("2024-01-01T00:00:00Z"), Some("2024-01-01T00:00:01Z")),
                FieldError::FinishedWhileRunning,
            ),
            (
                status("running", None, Some("not a time")),
                FieldError::Parse(parse_timestamp(Some("not a time")).unwrap_err()),
            ),
        ] {
            let err = field
                .reset_for_new_game(&NewGameWire {
                    mines: 9,
                    size: 4,
                    status,
                })
                .unwrap_err();
            assert_eq!(err, expected);
            assert_eq!(field, before);
        }
    }

    #[test]
    fn new_game_with_huge_size_is_rejected() {
        let mut field = hidden_field(2);
        let before = field.clone();

        for size in [1 << 40, usize::MAX, 1025] {
            let err = field
                .reset_for_new_game(&NewGameWire {
                    mines: 1,
                    size,
                    status: status("running", None, None),
                })
                .unwrap_err();
            assert_eq!(err, FieldError::InvalidBoardShape { size });
            assert_eq!(field, before);
        }

        field
            .reset_for_new_game(&NewGameWire {
                mines: 1,
                size: 1024,
                status: status("running", None, None),
            })
            .unwrap();
        assert_eq!(field.size(), 1024);
    }

    #[test]
    fn snapshot_with_inconsistent_timestamps_is_rejected() {
        let snapshot = |status| FieldWire {
            mines: 1,
            size: 1,
            tiles: vec![vec![TileWire::new("hidden", 0)]],
            status,
        };

        assert_eq!(
            FieldModel::from_wire(&snapshot(status(
                "running",
                Some("2024-01-01T00:00:00Z"),
                Some("2024-01-01T00:00:09Z"),
            ))),
            Err(FieldError::FinishedWhileRunning)
        );
        assert_eq!(
            FieldModel::from_wire(&snapshot(status(
                "won",
                Some("2024-01-01T00:00:09Z"),
                Some("2024-01-01T00:00:00Z"),
            ))),
            Err(FieldError::FinishedBeforeStart)
        );
    }

    #[test]
    fn mines_left_goes_negative_when_overmarked() {
        let mut field = hidden_field(2);
        let mut overmarked = status("running", None, None);
        overmarked.mines_left = -1;

        field
            .apply_delta(
                &overmarked,
                &[
                    ([0, 0], TileWire::new("mark", 0)),
                    ([0, 1], TileWire::new("mark", 0)),
                    ([1, 0], TileWire::new("mark", 0)),
                ],
            )
            .unwrap();

        assert_eq!(field.mines_left(), -1);
        assert_eq!(field.count_tiles().get(&TileState::Mark), Some(&3));
    }

    #[test]
    fn position_validity_covers_negative_and_edge_coordinates() {
        let field = hidden_field(3);

        for row in -2..=4_i64 {
            for col in -2..=4_i64 {
                let expected = (0..3).contains(&row) && (0..3).contains(&col);
                assert_eq!(field.is_valid_position(row, col), expected, "({row}, {col})");
            }
        }
        assert!(!field.is_valid_position(i64::MIN, 0));
        assert_eq!(field.tile_at(-1, 0), None);
    }

    #[test]
    fn game_seconds_follows_clock_while_running() {
        let mut field = hidden_field(2);
        field
            .apply_delta(&status("running", Some("2024-01-01T00:00:00Z"), None), &[])
            .unwrap();
        let start = at(1_704_067_200, 0);

        assert_eq!(field.game_seconds_with(&FixedClock(start)), 0);
        assert_eq!(field.game_seconds_with(&FixedClock(at(1_704_067_212, 999))), 12);
        assert_eq!(field.game_seconds_with(&FixedClock(at(1_704_067_213, 0))), 13);
    }

    #[test]
    fn game_seconds_ignores_clock_once_finished() {
        let mut field = hidden_field(2);
        field
            .apply_delta(
                &status("won", Some("2024-01-01T00:00:00.500Z"), Some("2024-01-01T00:00:07.400Z")),
                &[],
            )
            .unwrap();

        assert_eq!(field.game_seconds_with(&FixedClock(at(0, 0))), 6);
        assert_eq!(field.game_seconds(), 6);
    }
}
