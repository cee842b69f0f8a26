use thiserror::Error;

/// A wire value the producer should never have sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown tile state {0:?}")]
    UnknownTileState(String),
    #[error("unknown field state {0:?}")]
    UnknownFieldState(String),
    #[error("invalid timestamp {raw:?}: {source}")]
    InvalidTimestamp {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },
}
