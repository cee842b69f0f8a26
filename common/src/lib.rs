//! Value types and wire payloads shared between the minesweeper field client
//! and anything that produces or inspects its messages.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::ParseError;
