// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel Adapter: one duplex message connection per project.
//!
//! The [`Transport`] trait keeps the session independent of the socket so
//! tests can drive it with an in-memory channel.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use otfs_core::protocol::{ClientMessage, ServerMessage};

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame could not be encoded or decoded. The connection stays usable.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// Duplex message channel to the sequencing server.
///
/// Object safe so a session can own a `Box<dyn Transport>`.
pub trait Transport: Send + Sync {
    /// Open the connection.
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()>;

    /// Close the connection. Closing twice is a no-op.
    fn disconnect(&mut self) -> TransportFuture<'_, ()>;

    /// Send one frame.
    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()>;

    /// Receive the next frame.
    ///
    /// Returns `None` once the peer has closed the connection.
    /// Must be cancel safe: a dropped call loses no frame.
    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>>;

    /// Check if connected.
    fn is_connected(&self) -> bool;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport implementation using tokio-tungstenite.
#[derive(Default)]
pub struct WebSocketTransport {
    sink: Option<SplitSink<WsStream, Message>>,
    stream: Option<SplitStream<WsStream>>,
}

impl WebSocketTransport {
    /// Create a new, unconnected WebSocket transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn drop_connection(&mut self) {
        self.sink = None;
        self.stream = None;
    }
}

/// What a single inbound WebSocket frame means for the reader.
#[derive(Debug)]
pub(crate) enum Frame {
    Message(ServerMessage),
    Closed,
    Skip,
}

/// Interprets one inbound WebSocket frame.
pub(crate) fn decode_frame(frame: Message) -> TransportResult<Frame> {
    match frame {
        Message::Text(text) => ServerMessage::from_json(&text)
            .map(Frame::Message)
            .map_err(|e| TransportError::SerializationError(e.to_string())),
        Message::Close(_) => Ok(Frame::Closed),
        // Ping/pong are answered by tungstenite; binary frames are not part
        // of the protocol.
        _ => Ok(Frame::Skip),
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let (sink, stream) = ws_stream.split();
            self.sink = Some(sink);
            self.stream = Some(stream);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if let Some(mut sink) = self.sink.take() {
                // The peer may already be gone.
                let _ = sink.close().await;
            }
            self.stream = None;
            Ok(())
        })
    }

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let json = msg
                .to_json()
                .map_err(|e| TransportError::SerializationError(e.to_string()))?;
            let sink = self.sink.as_mut().ok_or(TransportError::ConnectionClosed)?;

            // Flush so a broken connection surfaces here rather than later.
            let sent = match sink.send(Message::Text(json.into())).await {
                Ok(()) => sink.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                self.drop_connection();
                return Err(TransportError::SendFailed(e.to_string()));
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move {
            loop {
                let stream = self.stream.as_mut().ok_or(TransportError::ConnectionClosed)?;
                match stream.next().await {
                    Some(Ok(frame)) => match decode_frame(frame)? {
                        Frame::Message(msg) => return Ok(Some(msg)),
                        Frame::Skip => continue,
                        Frame::Closed => {
                            self.drop_connection();
                            return Ok(None);
                        }
                    },
                    Some(Err(e)) => {
                        self.drop_connection();
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                    None => {
                        self.drop_connection();
                        return Ok(None);
                    }
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.sink.is_some()
    }
}
