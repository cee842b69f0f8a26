use std::fmt::Display;

use futures_util::{Sink, SinkExt, Stream, StreamExt, stream::SplitStream};
use minesweeper_common::protocol::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, info, warn};

use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsReader = SplitStream<WsStream>;

/// Opens the socket for one field and splits it into the incoming message
/// stream and the outgoing action writer.
pub async fn connect(url: &str) -> Result<(FieldSocket, FieldWriter)> {
    info!("Connecting to field socket: {}", url);

    let (ws_stream, _) = connect_async(url).await?;
    info!("Field socket connected");

    let (sink, reader) = ws_stream.split();
    Ok((FieldSocket::new(reader), FieldWriter::spawn(sink)))
}

/// Incoming half of a field socket.
///
/// Frames are decoded one at a time in arrival order. A text frame that is
/// not a valid [`ServerMessage`] is logged and skipped so the next delta can
/// still be applied. Only transport errors end the stream.
pub struct FieldSocket<R = WsReader> {
    reader: R,
    skipped: usize,
}

impl<R> FieldSocket<R>
where
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    /// Wraps any stream of websocket frames.
    pub fn new(reader: R) -> Self {
        Self { reader, skipped: 0 }
    }

    /// Next decodable server message, or `None` once the server closed the
    /// socket or the stream ended.
    pub async fn receive_message(&mut self) -> Result<Option<ServerMessage>> {
        while let Some(frame) = self.reader.next().await {
            match frame? {
                Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        debug!("Received message: {}", text);
                        return Ok(Some(message));
                    }
                    Err(e) => {
                        self.skipped += 1;
                        warn!("Skipping undecodable field frame ({}): {}", e, text);
                    }
                },
                Message::Close(frame) => {
                    match frame {
                        Some(frame) => {
                            info!("Field socket closed: {} {}", u16::from(frame.code), frame.reason)
                        }
                        None => info!("Field socket closed"),
                    }
                    return Ok(None);
                }
                // ping/pong and binary frames carry no field data
                _ => {}
            }
        }
        Ok(None)
    }

    /// Number of text frames dropped because they did not decode.
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }
}

/// Outgoing half of a field socket.
///
/// Actions are queued and written by a single background task, so callers
/// never wait on the network.
pub struct FieldWriter {
    sender: mpsc::UnboundedSender<ClientMessage>,
    task: JoinHandle<()>,
}

impl FieldWriter {
    /// Starts the writer task on any sink of websocket frames.
    pub fn spawn<W>(sink: W) -> Self
    where
        W: Sink<Message> + Send + 'static,
        W::Error: Display + Send,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ClientMessage>();

        let task = tokio::spawn(async move {
            let mut sink = std::pin::pin!(sink);
            while let Some(action) = receiver.recv().await {
                let json = match serde_json::to_string(&action) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode {:?}: {}", action, e);
                        continue;
                    }
                };

                debug!("Sending action: {}", json);
                if let Err(e) = sink.send(Message::text(json)).await {
                    warn!("Field socket write failed, dropping queued actions: {}", e);
                    return;
                }
            }

            if let Err(e) = sink.close().await {
                debug!("Field socket close failed: {}", e);
            }
        });

        Self { sender, task }
    }

    /// Queues an action for the server.
    pub fn send(&self, action: ClientMessage) -> Result<()> {
        self.sender
            .send(action)
            .map_err(|_| "Field socket writer has stopped")?;
        Ok(())
    }

    /// Flushes queued actions and closes the socket.
    pub async fn close(self) {
        drop(self.sender);
        let _ = self.task.await;
    }
}
