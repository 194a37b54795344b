// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Wraps the canonical tree for shared access. Every accepted batch is
//! published on one broadcast channel while the tree lock is held, so all
//! connections observe batches in the order they were sequenced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::Mutex;
use tracing::debug;

use otfs_core::protocol::ServerMessage;
use otfs_core::{ClockSource, DocId, Document, OpBatch, Result, SystemClock, Tree};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const BROADCAST_CAPACITY: usize = 1024;

/// An accepted batch and the connection that submitted it.
#[derive(Debug, Clone)]
pub struct Sequenced {
    pub origin: u64,
    pub batch: OpBatch,
}

impl Sequenced {
    /// The frame connection `conn` should see for this batch.
    pub fn message_for(&self, conn: u64) -> ServerMessage {
        if conn == self.origin {
            ServerMessage::batch_accepted(self.batch.id.clone())
        } else {
            ServerMessage::remote_batch(self.batch.clone())
        }
    }
}

/// Shared server state containing the canonical tree.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    tree: Mutex<Tree>,
    clock: Arc<dyn ClockSource>,
    broadcast_tx: broadcast::Sender<Sequenced>,
    next_connection: AtomicU64,
}

/// Takes everything already queued on `rx`.
///
/// Called with the tree lock held: every batch sequenced before the caller's
/// read of the tree is then in hand, and nothing after it is.
fn drain(rx: &mut broadcast::Receiver<Sequenced>) -> std::result::Result<Vec<Sequenced>, BoxError> {
    let mut queued = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(seq) => queued.push(seq),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(queued),
            Err(e @ TryRecvError::Lagged(_)) => return Err(e.into()),
        }
    }
}

impl ServerState {
    /// Creates a state holding an empty project rooted at `root_id`.
    pub fn new(root_id: &str) -> Self {
        let clock: Arc<dyn ClockSource> = Arc::new(SystemClock);
        let tree = Tree::new_project(root_id, clock.now_ms());
        Self::with_tree(tree, clock)
    }

    pub fn with_tree(tree: Tree, clock: Arc<dyn ClockSource>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        ServerState {
            inner: Arc::new(ServerStateInner {
                tree: Mutex::new(tree),
                clock,
                broadcast_tx,
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// Allocates an id for a new connection.
    pub fn connection_id(&self) -> u64 {
        self.inner.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe to sequenced batches.
    pub fn subscribe(&self) -> broadcast::Receiver<Sequenced> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Validates `batch` and, if valid, applies and publishes it.
    pub async fn submit(&self, origin: u64, batch: OpBatch) -> Result<()> {
        let mut tree = self.inner.tree.lock().await;
        tree.check_batch(&batch)?;
        tree.apply_batch(&batch, self.inner.clock.now_ms(), &mut ());
        debug!(batch_id = %batch.id, version = tree.version(), "batch sequenced");
        let _ = self.inner.broadcast_tx.send(Sequenced { origin, batch });
        Ok(())
    }

    /// The current version and root, plus batches queued ahead of them on `rx`.
    pub async fn snapshot(
        &self,
        rx: &mut broadcast::Receiver<Sequenced>,
    ) -> std::result::Result<(Vec<Sequenced>, u64, DocId), BoxError> {
        let tree = self.inner.tree.lock().await;
        let queued = drain(rx)?;
        let root_id = tree.root_id().ok_or("server tree has no root")?.to_string();
        Ok((queued, tree.version(), root_id))
    }

    /// The current payload of `doc_id`, plus batches queued ahead of it on `rx`.
    pub async fn document(
        &self,
        doc_id: &str,
        rx: &mut broadcast::Receiver<Sequenced>,
    ) -> std::result::Result<(Vec<Sequenced>, Option<Document>), BoxError> {
        let tree = self.inner.tree.lock().await;
        let queued = drain(rx)?;
        Ok((queued, tree.document(doc_id).cloned()))
    }

    pub async fn version(&self) -> u64 {
        self.inner.tree.lock().await.version()
    }

    /// Runs `f` against the tree, for inspection.
    pub async fn inspect<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        f(&*self.inner.tree.lock().await)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
