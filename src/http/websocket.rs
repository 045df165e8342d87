//! WebSocket-backed duplex connections.
//!
//! # Responsibilities
//! - Wrap an upgraded axum `WebSocket` as a `DuplexConnection`
//! - Map WebSocket messages onto data frames
//! - Bound the close handshake
//!
//! # Design Decisions
//! - Sink and stream are split so a write never waits on a pending read
//! - `close` fires a watch flag first: a read or write still pending on the
//!   old socket returns `Closed` and gives up its half
//! - Ping/pong is answered by the protocol layer and never surfaces as a frame
//! - The outbound (send route) side never carries data from the consumer;
//!   `drain_inbound` keeps reading it so pings and close frames are handled
//! - A dropped peer is only noticed on the next read or write

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{watch, Mutex};

use crate::net::{ConnectionError, ConnectionId, DuplexConnection, Frame};

/// Time allowed for the close handshake, including waiting for a stuck write.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A consumer connection accepted by the relay server.
pub struct WsConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    closed: watch::Sender<bool>,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        let (closed, _) = watch::channel(false);
        Self {
            id: ConnectionId::new(),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once `close` has been called.
    async fn close_requested(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Keep reading a connection nobody reads from, discarding data frames,
    /// until it is closed locally or by the peer.
    pub fn drain_inbound(self: &Arc<Self>) {
        let connection = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match connection.read().await {
                    Ok(frame) => {
                        tracing::debug!(
                            connection_id = %connection.id,
                            kind = %frame.kind,
                            len = frame.data.len(),
                            "Discarding frame on outbound connection"
                        );
                    }
                    Err(e) => {
                        tracing::debug!(
                            connection_id = %connection.id,
                            error = %e,
                            "Outbound connection inbound side finished"
                        );
                        break;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl DuplexConnection for WsConnection {
    async fn write(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        let send = async {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Binary(payload.to_vec().into()))
                .await
                .map_err(|e| ConnectionError::Transport(e.to_string()))
        };

        tokio::select! {
            biased;
            _ = self.close_requested() => Err(ConnectionError::Closed),
            result = send => result,
        }
    }

    async fn read(&self) -> Result<Frame, ConnectionError> {
        let receive = async {
            let mut stream = self.stream.lock().await;
            loop {
                match stream.next().await {
                    Some(Ok(Message::Binary(data))) => return Ok(Frame::binary(data.to_vec())),
                    Some(Ok(Message::Text(text))) => {
                        return Ok(Frame::text(text.as_str().as_bytes().to_vec()))
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => return Err(ConnectionError::Closed),
                    Some(Err(e)) => return Err(ConnectionError::Transport(e.to_string())),
                }
            }
        };

        tokio::select! {
            biased;
            _ = self.close_requested() => Err(ConnectionError::Closed),
            result = receive => result,
        }
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.closed.send_replace(true);

        let handshake = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };

        match tokio::time::timeout(CLOSE_TIMEOUT, handshake).await {
            Ok(Ok(())) => {
                tracing::debug!(connection_id = %self.id, "Connection closed");
                Ok(())
            }
            Ok(Err(e)) => Err(ConnectionError::Transport(e.to_string())),
            Err(_) => Err(ConnectionError::CloseTimeout(CLOSE_TIMEOUT.as_millis() as u64)),
        }
    }
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
