// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use otfs_core::protocol::{ClientMessage, ServerMessage};
use otfs_core::{DocKind, Document, Op, OpBatch, Tree};

use super::registry::TransportFactory;
use super::transport::{Transport, TransportError, TransportFuture};

/// A UUID-shaped project id.
pub const PROJECT: &str = "3f2b8c1e-7d4a-4e5f-9a0b-1c2d3e4f5a6b";

/// Id of the project directory in test trees.
pub const ROOT: &str = "root-dir";

/// Mock transport for testing without real sockets.
///
/// Frames flow through channels to a [`MockRemote`] held by the test.
pub struct MockTransport {
    connected: bool,
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    urls: Arc<Mutex<Vec<String>>>,
    connect_should_fail: bool,
    connect_should_hang: bool,
}

/// The test's end of a [`MockTransport`].
pub struct MockRemote {
    incoming: Option<mpsc::UnboundedSender<ServerMessage>>,
    outgoing: mpsc::UnboundedReceiver<ClientMessage>,
    urls: Arc<Mutex<Vec<String>>>,
}

/// Creates a connected-on-demand transport and its remote end.
pub fn mock_pair() -> (MockTransport, MockRemote) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let urls = Arc::new(Mutex::new(Vec::new()));
    let transport = MockTransport {
        connected: false,
        incoming: in_rx,
        outgoing: out_tx,
        urls: Arc::clone(&urls),
        connect_should_fail: false,
        connect_should_hang: false,
    };
    let remote = MockRemote {
        incoming: Some(in_tx),
        outgoing: out_rx,
        urls,
    };
    (transport, remote)
}

impl MockTransport {
    /// Set whether connect should fail.
    pub fn set_connect_fail(&mut self, fail: bool) {
        self.connect_should_fail = fail;
    }

    /// Set whether connect should never complete.
    pub fn set_connect_hang(&mut self, hang: bool) {
        self.connect_should_hang = hang;
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            if self.connect_should_hang {
                std::future::pending::<()>().await;
            }
            if self.connect_should_fail {
                return Err(TransportError::ConnectionFailed("mock failure".into()));
            }
            self.urls.lock().unwrap().push(url);
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            self.outgoing
                .send(msg)
                .map_err(|_| TransportError::SendFailed("remote dropped".into()))
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            Ok(self.incoming.recv().await)
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl MockRemote {
    /// Delivers a frame to the client.
    pub fn deliver(&self, msg: ServerMessage) {
        if let Some(incoming) = &self.incoming {
            let _ = incoming.send(msg);
        }
    }

    /// Closes the connection from the server side.
    pub fn close(&mut self) {
        self.incoming = None;
    }

    /// Waits for the next frame the client sent.
    pub async fn next_frame(&mut self) -> ClientMessage {
        tokio::time::timeout(Duration::from_secs(2), self.outgoing.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client transport dropped")
    }

    /// Waits until the client drops its transport, discarding frames.
    pub async fn wait_dropped(&mut self) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.outgoing.recv().await.is_some() {}
        })
        .await
        .expect("client transport still alive");
    }

    /// The next frame if one was already sent.
    pub fn try_frame(&mut self) -> Option<ClientMessage> {
        self.outgoing.try_recv().ok()
    }

    /// URLs the transport was connected to.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

/// A tree with the super-root and an empty project directory [`ROOT`].
pub fn project_tree() -> Tree {
    Tree::new_project(ROOT, 0)
}

/// Validates and applies `ops` as the next batch of `tree`.
pub fn seed(tree: &mut Tree, ops: Vec<Op>) {
    let batch = OpBatch::new(format!("seed-{}", tree.version()), tree.version(), ops);
    tree.check_batch(&batch).unwrap();
    tree.apply_batch(&batch, 0, &mut ());
}

/// Adds a binary file: sequenced as an empty file, then its body swapped.
pub fn seed_binary(tree: &mut Tree, parent_id: &str, name: &str, doc_id: &str, bytes: &[u8]) {
    seed(tree, vec![Op::add(DocKind::File, name, parent_id, doc_id)]);
    tree.insert_document(Document::binary_file(doc_id, name, Some(parent_id.to_string()), 0, bytes));
}

/// Polls `f` until it holds.
pub async fn wait_until(mut f: impl FnMut() -> bool) {
    for _ in 0..400 {
        if f() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

/// An in-process sequencer answering over mock transports.
#[derive(Clone)]
pub struct FakeServer {
    tree: Arc<Mutex<Tree>>,
    frames: Arc<Mutex<Vec<ClientMessage>>>,
    clients: Arc<Mutex<Vec<mpsc::UnboundedSender<ServerMessage>>>>,
    urls: Arc<Mutex<Vec<String>>>,
    reject_next: Arc<AtomicBool>,
    silent: Arc<AtomicBool>,
}

impl FakeServer {
    pub fn new(tree: Tree) -> Self {
        FakeServer {
            tree: Arc::new(Mutex::new(tree)),
            frames: Arc::new(Mutex::new(Vec::new())),
            clients: Arc::new(Mutex::new(Vec::new())),
            urls: Arc::new(Mutex::new(Vec::new())),
            reject_next: Arc::new(AtomicBool::new(false)),
            silent: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A server holding [`project_tree`].
    pub fn with_project() -> Self {
        Self::new(project_tree())
    }

    /// A new client transport; its frames are answered by a spawned task.
    pub fn transport(&self) -> MockTransport {
        let (mut transport, mut remote) = mock_pair();
        transport.urls = Arc::clone(&self.urls);
        let server = self.clone();
        let index = {
            let mut clients = self.clients.lock().unwrap();
            clients.push(remote.incoming.clone().unwrap());
            clients.len() - 1
        };
        tokio::spawn(async move {
            while let Some(frame) = remote.outgoing.recv().await {
                server.answer(index, frame);
            }
        });
        transport
    }

    /// A factory handing out [`FakeServer::transport`]s.
    pub fn factory(&self) -> Arc<dyn TransportFactory> {
        let server = self.clone();
        Arc::new(move || Box::new(server.transport()) as Box<dyn Transport>)
    }

    /// Rejects the next submitted batch regardless of validity.
    pub fn reject_next(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    /// Stops answering anything.
    pub fn go_silent(&self) {
        self.silent.store(true, Ordering::SeqCst);
    }

    /// Every frame received so far, across clients.
    pub fn frames(&self) -> Vec<ClientMessage> {
        self.frames.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> usize {
        self.frames()
            .iter()
            .filter(|f| matches!(f, ClientMessage::SubmitBatch { .. }))
            .count()
    }

    pub fn registrations(&self, doc_id: &str) -> usize {
        self.frames()
            .iter()
            .filter(|f| matches!(f, ClientMessage::RegisterDocument { doc_id: id } if id == doc_id))
            .count()
    }

    /// URLs every transport connected to.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn with_tree<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> R {
        f(&mut self.tree.lock().unwrap())
    }

    /// Sequences `ops` as if another collaborator submitted them.
    pub fn push_remote(&self, ops: Vec<Op>) {
        let batch = {
            let mut tree = self.tree.lock().unwrap();
            let batch = OpBatch::new(format!("remote-{}", tree.version()), tree.version(), ops);
            tree.check_batch(&batch).unwrap();
            tree.apply_batch(&batch, 0, &mut ());
            batch
        };
        for client in self.clients.lock().unwrap().iter() {
            let _ = client.send(ServerMessage::remote_batch(batch.clone()));
        }
    }

    fn reply(&self, index: usize, msg: ServerMessage) {
        if let Some(client) = self.clients.lock().unwrap().get(index) {
            let _ = client.send(msg);
        }
    }

    fn answer(&self, index: usize, frame: ClientMessage) {
        self.frames.lock().unwrap().push(frame.clone());
        if self.silent.load(Ordering::SeqCst) {
            return;
        }
        match frame {
            ClientMessage::GetSnapshot { .. } => {
                let tree = self.tree.lock().unwrap();
                let root = tree.root_id().unwrap().to_string();
                let version = tree.version();
                drop(tree);
                self.reply(index, ServerMessage::snapshot(version, root));
            }
            ClientMessage::RegisterDocument { doc_id } => {
                let doc = self.tree.lock().unwrap().document(&doc_id).cloned();
                if let Some(doc) = doc {
                    self.reply(index, ServerMessage::document(doc));
                }
            }
            ClientMessage::SubmitBatch { batch } => {
                let accepted = {
                    let mut tree = self.tree.lock().unwrap();
                    let forced = self.reject_next.swap(false, Ordering::SeqCst);
                    if !forced && tree.check_batch(&batch).is_ok() {
                        tree.apply_batch(&batch, 0, &mut ());
                        true
                    } else {
                        false
                    }
                };
                if !accepted {
                    self.reply(index, ServerMessage::batch_rejected(batch.id));
                    return;
                }
                let clients = self.clients.lock().unwrap().clone();
                for (i, client) in clients.iter().enumerate() {
                    let msg = if i == index {
                        ServerMessage::batch_accepted(batch.id.clone())
                    } else {
                        ServerMessage::remote_batch(batch.clone())
                    };
                    let _ = client.send(msg);
                }
            }
            ClientMessage::Broadcast { .. } => {}
        }
    }
}
