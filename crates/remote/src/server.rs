// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles client connections, request answers, and batch fanout.
//!
//! Answers to `get-snapshot` and `register-document` are preceded by any
//! batches already queued for the connection, so a client never receives a
//! batch that its snapshot or document payload already includes.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use otfs_core::protocol::{ClientMessage, ServerMessage};

use crate::state::{BoxError, Sequenced, ServerState};

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    serve(listener, state).await
}

/// Accepts connections on `listener` until it fails.
pub(crate) async fn serve(listener: TcpListener, state: ServerState) -> Result<(), BoxError> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let conn = state.connection_id();
    info!(conn, "New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    // Subscribe before answering anything so no batch is missed
    let mut broadcast_rx = state.subscribe();

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let replies = handle_client_message(&text, &state, conn, &mut broadcast_rx).await?;
                        for reply in replies {
                            ws_sink.send(Message::Text(reply.to_json()?.into())).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {
                        // Ignore other message types (Binary, Pong, Frame)
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            sequenced = broadcast_rx.recv() => {
                match sequenced {
                    Ok(seq) => {
                        let json = seq.message_for(conn).to_json()?;
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            warn!("Failed to send batch to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        // The replica can no longer be kept in step; make it reconnect.
                        warn!("Client {} lagged by {} batches, closing", peer_addr, n);
                        break;
                    }
                    Err(RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

fn with_queued(queued: Vec<Sequenced>, conn: u64, reply: Option<ServerMessage>) -> Vec<ServerMessage> {
    queued
        .iter()
        .map(|seq| seq.message_for(conn))
        .chain(reply)
        .collect()
}

/// Process a client message and return the frames to send, in order.
pub(crate) async fn handle_client_message(
    text: &str,
    state: &ServerState,
    conn: u64,
    rx: &mut broadcast::Receiver<Sequenced>,
) -> Result<Vec<ServerMessage>, BoxError> {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(conn, error = %e, "ignoring undecodable frame");
            return Ok(Vec::new());
        }
    };
    debug!(conn, "Received message: {:?}", msg);

    match msg {
        ClientMessage::GetSnapshot { client_id } => {
            let (queued, version, root_id) = state.snapshot(rx).await?;
            debug!(conn, client_id = %client_id, version, "Snapshot response");
            Ok(with_queued(queued, conn, Some(ServerMessage::snapshot(version, root_id))))
        }

        ClientMessage::RegisterDocument { doc_id } => {
            let (queued, doc) = state.document(&doc_id, rx).await?;
            if doc.is_none() {
                warn!(conn, doc_id = %doc_id, "register for unknown document");
            }
            Ok(with_queued(queued, conn, doc.map(ServerMessage::document)))
        }

        ClientMessage::SubmitBatch { batch } => {
            let id = batch.id.clone();
            match state.submit(conn, batch).await {
                // Acceptance travels with the broadcast, in sequence order
                Ok(()) => Ok(Vec::new()),
                Err(e) => {
                    info!(conn, batch_id = %id, reason = %e, "batch rejected");
                    Ok(vec![ServerMessage::batch_rejected(id)])
                }
            }
        }

        ClientMessage::Broadcast { payload } => {
            info!(conn, %payload, "announcement");
            Ok(Vec::new())
        }
    }
}
