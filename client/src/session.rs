use std::sync::Arc;

use futures_util::Stream;
use minesweeper_common::{
    models::{FieldState, Pos},
    protocol::{ClientMessage, ServerMessage},
};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use crate::{
    ClientConfig, FieldError, FieldModel, Result,
    websocket::{self, FieldSocket, FieldWriter},
};

/// Handle to the field model that stays valid across new games.
pub type SharedField = Arc<RwLock<Option<FieldModel>>>;

/// Events emitted after the field model changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEvent {
    /// A full snapshot was loaded
    Initialized { size: usize, mines: u32 },
    /// Tiles were overwritten by a delta
    TilesChanged { positions: Vec<Pos> },
    /// The game was won or lost
    StateChanged { from: FieldState, to: FieldState },
    /// A new blank game replaced the previous one
    NewGame { size: usize, mines: u32 },
    ConnectionLost,
}

/// Applies one server message to the model.
///
/// This is the only place the model is written. A rejected message leaves
/// the model untouched. Deltas and new games that arrive before any snapshot
/// have nothing to apply to and are dropped.
pub fn apply_server_message(
    field: &mut Option<FieldModel>,
    message: &ServerMessage,
) -> std::result::Result<Vec<FieldEvent>, FieldError> {
    match message {
        ServerMessage::Field { field: snapshot } => {
            let model = FieldModel::from_wire(snapshot)?;
            info!(
                "Loaded field: {}x{} with {} mines",
                model.size(),
                model.size(),
                model.mines()
            );
            let event = FieldEvent::Initialized {
                size: model.size(),
                mines: model.mines(),
            };
            *field = Some(model);
            Ok(vec![event])
        }
        ServerMessage::Changes {
            field: status,
            changes,
        } => {
            let Some(model) = field.as_mut() else {
                warn!("Dropping {} changes received before the field", changes.len());
                return Ok(Vec::new());
            };
            debug!(
                "Applying {} changes, state: {}, mines left: {}",
                changes.len(),
                status.state,
                status.mines_left
            );

            let old_state = model.state();
            let positions = model.apply_delta(status, changes)?;

            let mut events = Vec::new();
            if !positions.is_empty() {
                events.push(FieldEvent::TilesChanged { positions });
            }
            if model.state() != old_state {
                events.push(FieldEvent::StateChanged {
                    from: old_state,
                    to: model.state(),
                });
            }
            Ok(events)
        }
        ServerMessage::PlayAgain { field: new_game } => {
            let Some(model) = field.as_mut() else {
                warn!("Dropping new game received before the field");
                return Ok(Vec::new());
            };
            model.reset_for_new_game(new_game)?;
            info!(
                "New game: {}x{} with {} mines",
                model.size(),
                model.size(),
                model.mines()
            );
            Ok(vec![FieldEvent::NewGame {
                size: model.size(),
                mines: model.mines(),
            }])
        }
    }
}

struct Connection {
    writer: FieldWriter,
    field_id: String,
    listener: JoinHandle<()>,
}

impl Connection {
    /// Stops the listener, then lets the writer flush and close the socket.
    async fn shutdown(self) {
        self.listener.abort();
        let _ = self.listener.await;
        self.writer.close().await;
    }
}

/// Owns the field model for one connected board and keeps it in sync.
pub struct FieldSession {
    config: ClientConfig,
    connection: Arc<RwLock<Option<Connection>>>,
    event_sender: Arc<RwLock<Option<mpsc::UnboundedSender<FieldEvent>>>>,
    field: SharedField,
}

impl FieldSession {
    /// Create a session that is not yet connected to any field
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connection: Arc::new(RwLock::new(None)),
            event_sender: Arc::new(RwLock::new(None)),
            field: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a session configured from the environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    /// Subscribe to field events. Replaces any previous subscriber.
    pub async fn subscribe_to_events(&self) -> mpsc::UnboundedReceiver<FieldEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.event_sender.write().await = Some(sender);
        receiver
    }

    /// Join a field, dropping any previous connection and model.
    ///
    /// The model is loaded once the server sends its snapshot, which is
    /// reported as [`FieldEvent::Initialized`].
    pub async fn connect(&self, field_id: &str) -> Result<()> {
        info!("Joining field {}", field_id);

        let mut connection = self.connection.write().await;
        if let Some(existing) = connection.take() {
            existing.shutdown().await;
        }
        self.field.write().await.take();

        let (socket, writer) = websocket::connect(&self.config.field_url(field_id)).await?;
        let listener = self.start_listener(socket);

        *connection = Some(Connection {
            writer,
            field_id: field_id.to_owned(),
            listener,
        });

        Ok(())
    }

    /// Checks the position against the current field before sending.
    async fn send_at(
        &self,
        row: i64,
        col: i64,
        message: fn(usize, usize) -> ClientMessage,
    ) -> Result<()> {
        {
            let field = self.field.read().await;
            let Some(model) = field.as_ref() else {
                return Err("Field not loaded yet".into());
            };
            if !model.is_valid_position(row, col) {
                return Err(FieldError::InvalidPosition {
                    row,
                    col,
                    size: model.size(),
                }
                .into());
            }
        }
        self.send_client_message(message(row as usize, col as usize)).await
    }

    async fn send_client_message(&self, message: ClientMessage) -> Result<()> {
        match self.connection.read().await.as_ref() {
            Some(connection) => connection.writer.send(message),
            None => Err("Not connected to a field. Call connect() first.".into()),
        }
    }

    /// Reveal the tile at the given position
    pub async fn reveal(&self, row: i64, col: i64) -> Result<()> {
        debug!("Revealing tile at ({}, {})", row, col);
        self.send_at(row, col, |row, col| ClientMessage::Reveal { row, col })
            .await
    }

    /// Mark/unmark the tile at the given position
    pub async fn mark(&self, row: i64, col: i64) -> Result<()> {
        debug!("Marking tile at ({}, {})", row, col);
        self.send_at(row, col, |row, col| ClientMessage::Mark { row, col })
            .await
    }

    /// Ask the server to start a new game on this field
    pub async fn play_again(&self) -> Result<()> {
        info!("Requesting a new game");
        self.send_client_message(ClientMessage::PlayAgain).await
    }

    /// Copy of the current model.
    pub async fn field(&self) -> Option<FieldModel> {
        self.field.read().await.clone()
    }

    /// Run `f` against the current model under the read lock
    pub async fn with_field<R>(&self, f: impl FnOnce(&FieldModel) -> R) -> Option<R> {
        self.field.read().await.as_ref().map(f)
    }

    /// Handle to the model that stays valid across new games
    pub fn shared_field(&self) -> SharedField {
        self.field.clone()
    }

    /// Get the id of the joined field
    pub async fn field_id(&self) -> Option<String> {
        self.connection
            .read()
            .await
            .as_ref()
            .map(|connection| connection.field_id.clone())
    }

    /// Check if we're connected to a field
    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Close the connection and clear the model
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(connection) = self.connection.write().await.take() {
            connection.shutdown().await;
        }
        *self.event_sender.write().await = None;
        *self.field.write().await = None;

        info!("Disconnected from field");
        Ok(())
    }

    fn start_listener(&self, mut socket: FieldSocket) -> JoinHandle<()> {
        let field = self.field.clone();
        let event_sender = self.event_sender.clone();

        tokio::spawn(async move {
            Self::listen(&mut socket, field, event_sender).await;
        })
    }

    /// Applies messages until the socket closes or fails.
    ///
    /// A message the model rejects is logged and skipped; later deltas are
    /// still applied.
    async fn listen<R>(
        socket: &mut FieldSocket<R>,
        field: SharedField,
        event_sender: Arc<RwLock<Option<mpsc::UnboundedSender<FieldEvent>>>>,
    ) where
        R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    {
        loop {
            let message = match socket.receive_message().await {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(e) => {
                    warn!("Field socket failed: {}", e);
                    break;
                }
            };

            let applied = apply_server_message(&mut *field.write().await, &message);
            match applied {
                Ok(events) => {
                    if let Some(ref sender) = *event_sender.read().await {
                        for event in events {
                            let _ = sender.send(event);
                        }
                    }
                }
                Err(e) => warn!("Rejected field message: {}", e),
            }
        }

        if let Some(ref sender) = *event_sender.read().await {
            let _ = sender.send(FieldEvent::ConnectionLost);
        }
    }
}
