//! Minesweeper Field Client
//!
//! Keeps a client-side copy of a multiplayer minesweeper board in sync with
//! the server. The server sends one full snapshot when a client joins, then
//! a small delta after every move and a tile-less message when a new game
//! starts.
//!
//! ## Usage
//!
//! ### Session
//!
//! [`FieldSession`] connects to a field, applies every incoming message to
//! its [`FieldModel`] and reports what changed:
//!
//! ```rust,no_run
//! use minesweeper_client::{ClientConfig, FieldEvent, FieldSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let session = FieldSession::new(ClientConfig::from_env()?);
//!     let mut events = session.subscribe_to_events().await;
//!     session.connect("lobby").await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let FieldEvent::Initialized { .. } = event {
//!             session.reveal(0, 0).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Model only
//!
//! The model does no I/O and can be driven by any transport:
//!
//! ```rust
//! use minesweeper_client::{FieldModel, FieldState, FieldWire};
//!
//! let snapshot: FieldWire = serde_json::from_str(r#"{
//!     "mines": 1, "size": 1, "mines_left": 1,
//!     "tiles": [[{"state": "hidden", "mines_close": 0}]],
//!     "state": "running", "started_at": null, "finished_at": null,
//!     "recent_player": "a"
//! }"#).unwrap();
//!
//! let field = FieldModel::from_wire(&snapshot).unwrap();
//! assert_eq!(field.state(), FieldState::Running);
//! assert!(field.is_valid_position(0, 0));
//! ```

mod clock;
mod config;
mod error;
mod field;
mod session;
mod websocket;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ClientConfig, SOCKET_URL_VAR, TOPIC_PREFIX_VAR};
pub use error::FieldError;
pub use field::FieldModel;
pub use session::{FieldEvent, FieldSession, SharedField, apply_server_message};
pub use websocket::{FieldSocket, FieldWriter, connect as connect_socket};

// Re-export common types for convenience
pub use minesweeper_common::{ParseError, models::*, protocol::*};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
