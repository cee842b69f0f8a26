use minesweeper_common::{ParseError, models::FieldState};
use thiserror::Error;

/// Reasons a snapshot, delta or new game was refused.
///
/// The model is never modified when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("tiles do not form a valid {size}x{size} board")]
    InvalidBoardShape { size: usize },
    #[error("position ({row}, {col}) is outside a {size}x{size} field")]
    InvalidPosition { row: i64, col: i64, size: usize },
    #[error("field cannot go from {from} to {to} without a new game")]
    InvalidTransition { from: FieldState, to: FieldState },
    #[error("running field has a finish time")]
    FinishedWhileRunning,
    #[error("field finished before it started")]
    FinishedBeforeStart,
}
