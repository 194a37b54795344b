// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request correlation and inbound dispatch for one replica.
//!
//! A [`Session`] is a cheap cloneable handle. The replica state lives behind
//! a mutex that is only ever held for synchronous sections; a single driver
//! task owns the [`Transport`] and feeds inbound frames to [`Session::dispatch`]
//! in delivery order.
//!
//! ```text
//! caller ──► Session ──outbound──► driver ──► Transport ──► server
//!              ▲                     │
//!              └────── dispatch ◄────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use otfs_core::protocol::{snapshot_root_id, ClientMessage, ServerMessage};
use otfs_core::{BatchId, ClockSource, DocId, Document, Op, OpBatch, OpObserver, SystemClock, Tree};

use super::submit::Precheck;
use super::transport::{Transport, TransportError};
use crate::error::{Error, Result};
use crate::id::generate_id;

/// Options for opening a [`Session`].
#[derive(Clone)]
pub struct SessionOptions {
    /// Per-request wait limit. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Clock used to stamp loaded and mutated documents.
    pub clock: Arc<dyn ClockSource>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            request_timeout: None,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Handle to one live replica and its channel.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: Mutex<SessionState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    clock: Arc<dyn ClockSource>,
    request_timeout: Option<Duration>,
    client_id: String,
}

enum Outbound {
    Frame(ClientMessage),
    Close,
}

enum SnapshotState {
    Idle,
    Pending(Vec<oneshot::Sender<Result<()>>>),
    Ready,
}

struct Submission {
    batch: OpBatch,
    waiter: oneshot::Sender<Result<bool>>,
}

struct SessionState {
    tree: Tree,
    observers: Vec<Box<dyn OpObserver + Send>>,
    snapshot: SnapshotState,
    /// Every doc id a registration was ever sent for or an applied `Add` introduced.
    registered: HashSet<DocId>,
    registrations: HashMap<DocId, Vec<oneshot::Sender<Result<Document>>>>,
    submissions: HashMap<BatchId, Submission>,
    closed: Option<String>,
}

impl SessionState {
    fn ensure_open(&self) -> Result<()> {
        match &self.closed {
            Some(reason) => Err(Error::ConnectionClosed(reason.clone())),
            None => Ok(()),
        }
    }

    /// Applies `batch` and remembers the ids it introduced, so a later
    /// lookup of one that is gone again never reaches the server.
    fn apply(&mut self, batch: &OpBatch, now: u64) {
        for op in &batch.ops {
            if let Op::Add { new_doc_id, .. } = op {
                self.registered.insert(new_doc_id.clone());
            }
        }
        self.tree.apply_batch(batch, now, &mut self.observers);
    }
}

/// A submitted batch awaiting its verdict.
pub(super) struct PendingBatch {
    pub(super) id: BatchId,
    verdict: oneshot::Receiver<Result<bool>>,
}

impl Session {
    /// Connects `transport` to `url` and starts the driver task.
    pub async fn open(
        url: &str,
        mut transport: Box<dyn Transport>,
        options: SessionOptions,
    ) -> Result<Session> {
        transport.connect(url).await?;

        let (outbound, rx) = mpsc::unbounded_channel();
        let session = Session {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState {
                    tree: Tree::new(),
                    observers: Vec::new(),
                    snapshot: SnapshotState::Idle,
                    registered: HashSet::new(),
                    registrations: HashMap::new(),
                    submissions: HashMap::new(),
                    closed: None,
                }),
                outbound,
                clock: options.clock,
                request_timeout: options.request_timeout,
                client_id: generate_id(),
            }),
        };
        debug!(client_id = %session.inner.client_id, "channel open");
        tokio::spawn(drive(Arc::downgrade(&session.inner), transport, rx));
        Ok(session)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn send(&self, msg: ClientMessage) -> Result<()> {
        trace!(?msg, "queueing frame");
        self.inner
            .outbound
            .send(Outbound::Frame(msg))
            .map_err(|_| Error::ConnectionClosed("driver stopped".to_string()))
    }

    async fn wait<T>(&self, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        let outcome = match self.inner.request_timeout {
            Some(limit) => tokio::time::timeout(limit, rx)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => rx.await,
        };
        outcome.unwrap_or_else(|_| Err(Error::ConnectionClosed("request abandoned".to_string())))
    }

    /// Fetches the tree version and root once; later calls reuse the result.
    pub async fn snapshot(&self) -> Result<()> {
        let rx = {
            let mut guard = self.lock();
            let state = &mut *guard;
            state.ensure_open()?;
            let (tx, rx) = oneshot::channel();
            match &mut state.snapshot {
                SnapshotState::Ready => return Ok(()),
                SnapshotState::Pending(waiters) => waiters.push(tx),
                SnapshotState::Idle => {
                    self.send(ClientMessage::get_snapshot(self.inner.client_id.clone()))?;
                    state.snapshot = SnapshotState::Pending(vec![tx]);
                }
            }
            rx
        };
        self.wait(rx).await
    }

    /// Returns the document, loading it from the server on first use.
    ///
    /// Concurrent calls for the same id share one request. A document that
    /// was loaded or added once and has since been unlinked is `NotFound`.
    pub async fn register(&self, doc_id: &str) -> Result<Document> {
        let rx = {
            let mut guard = self.lock();
            let state = &mut *guard;
            state.ensure_open()?;
            if let Some(doc) = state.tree.document(doc_id) {
                return Ok(doc.clone());
            }
            let (tx, rx) = oneshot::channel();
            if let Some(waiters) = state.registrations.get_mut(doc_id) {
                waiters.push(tx);
            } else if state.registered.contains(doc_id) {
                return Err(Error::NotFound(doc_id.to_string()));
            } else {
                self.send(ClientMessage::register_document(doc_id))?;
                state.registered.insert(doc_id.to_string());
                state.registrations.insert(doc_id.to_string(), vec![tx]);
            }
            rx
        };
        self.wait(rx).await
    }

    /// Submits `ops` as one batch without any pre-check.
    pub async fn submit(&self, ops: Vec<Op>) -> Result<()> {
        self.submit_with(move |_| Ok(Precheck::Submit(ops))).await
    }

    /// Runs `precheck` against the replica and, unless it finds the change
    /// redundant, sends one batch stamped with the current version.
    pub(super) fn enqueue_batch<F>(&self, precheck: F) -> Result<Option<PendingBatch>>
    where
        F: FnOnce(&Tree) -> Result<Precheck>,
    {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.ensure_open()?;
        let ops = match precheck(&state.tree)? {
            Precheck::Redundant => return Ok(None),
            Precheck::Submit(ops) => ops,
        };
        let batch = OpBatch::new(generate_id(), state.tree.version(), ops);
        let id = batch.id.clone();
        debug!(batch_id = %id, version = batch.baseline_version, ops = batch.ops.len(), "submitting batch");
        self.send(ClientMessage::submit_batch(batch.clone()))?;
        let (waiter, verdict) = oneshot::channel();
        state.submissions.insert(id.clone(), Submission { batch, waiter });
        Ok(Some(PendingBatch { id, verdict }))
    }

    /// Waits for the server's verdict on a submitted batch.
    pub(super) async fn await_verdict(&self, pending: PendingBatch) -> Result<()> {
        match self.wait(pending.verdict).await? {
            true => Ok(()),
            false => Err(Error::Rejected(pending.id)),
        }
    }

    /// Sends an out-of-band announcement. Nothing is reconciled.
    pub fn broadcast(&self, payload: serde_json::Value) -> Result<()> {
        self.lock().ensure_open()?;
        self.send(ClientMessage::broadcast(payload))
    }

    /// Closes the channel and fails every pending request.
    pub fn dispose(&self) {
        self.close("session disposed");
        let _ = self.inner.outbound.send(Outbound::Close);
    }

    /// Returns true once the channel has closed for any reason.
    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    /// The current replica version.
    pub fn version(&self) -> u64 {
        self.lock().tree.version()
    }

    /// The project directory id, once the snapshot has arrived.
    pub fn root_id(&self) -> Option<DocId> {
        self.lock().tree.root_id().map(str::to_string)
    }

    /// A copy of a resident document.
    pub fn document(&self, doc_id: &str) -> Option<Document> {
        self.lock().tree.document(doc_id).cloned()
    }

    /// Names from the project root down to `doc_id`.
    pub fn path_of(&self, doc_id: &str) -> Result<Vec<String>> {
        Ok(self.lock().tree.path_of(doc_id)?)
    }

    /// Runs `f` with read access to the replica.
    pub fn with_tree<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        f(&self.lock().tree)
    }

    /// Adds hooks run around every applied op.
    pub fn add_observer(&self, observer: Box<dyn OpObserver + Send>) {
        self.lock().observers.push(observer);
    }

    /// Applies one inbound frame.
    pub(crate) fn dispatch(&self, msg: ServerMessage) {
        let now = self.inner.clock.now_ms();
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.closed.is_some() {
            trace!("dropping frame for closed session");
            return;
        }

        match msg {
            ServerMessage::Snapshot { version, documents } => {
                let waiters = match std::mem::replace(&mut state.snapshot, SnapshotState::Idle) {
                    SnapshotState::Pending(waiters) => waiters,
                    other => {
                        warn!(version, "ignoring unsolicited snapshot");
                        state.snapshot = other;
                        return;
                    }
                };
                match snapshot_root_id(&documents) {
                    Ok(root_id) => {
                        info!(version, root_id = %root_id, "snapshot received");
                        state.tree.set_snapshot(version, root_id);
                        state.snapshot = SnapshotState::Ready;
                        for waiter in waiters {
                            let _ = waiter.send(Ok(()));
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "unusable snapshot");
                        for waiter in waiters {
                            let _ = waiter.send(Err(Error::Protocol(e.to_string())));
                        }
                    }
                }
            }

            ServerMessage::Document { mut document } => {
                document.create_time = now;
                document.modify_time = now;
                let doc_id = document.doc_id.clone();
                let resident = state.tree.load_document(document).clone();
                state.registered.insert(doc_id.clone());
                match state.registrations.remove(&doc_id) {
                    Some(waiters) => {
                        debug!(doc_id = %doc_id, waiters = waiters.len(), "document registered");
                        for waiter in waiters {
                            let _ = waiter.send(Ok(resident.clone()));
                        }
                    }
                    None => debug!(doc_id = %doc_id, "unsolicited document loaded"),
                }
            }

            ServerMessage::BatchAccepted { id } => match state.submissions.remove(&id) {
                Some(Submission { batch, waiter }) => {
                    state.apply(&batch, now);
                    debug!(batch_id = %id, version = state.tree.version(), "batch accepted");
                    let _ = waiter.send(Ok(true));
                }
                None => warn!(batch_id = %id, "acceptance for unknown batch"),
            },

            ServerMessage::BatchRejected { id } => match state.submissions.remove(&id) {
                Some(Submission { waiter, .. }) => {
                    info!(batch_id = %id, "batch rejected");
                    let _ = waiter.send(Ok(false));
                }
                None => warn!(batch_id = %id, "rejection for unknown batch"),
            },

            ServerMessage::RemoteBatch { batch } => {
                if batch.baseline_version != state.tree.version() {
                    warn!(
                        batch_id = %batch.id,
                        baseline = batch.baseline_version,
                        version = state.tree.version(),
                        "remote batch baseline differs from replica version"
                    );
                }
                state.apply(&batch, now);
                debug!(batch_id = %batch.id, version = state.tree.version(), "remote batch applied");
            }

            ServerMessage::Unknown => trace!("ignoring unknown frame"),
        }
    }

    /// Marks the session dead and fails every pending request once.
    ///
    /// Returns false if it was already closed.
    pub(crate) fn close(&self, reason: &str) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.closed.is_some() {
            return false;
        }
        state.closed = Some(reason.to_string());
        info!(reason, "session closed");

        let closed = || Error::ConnectionClosed(reason.to_string());
        if let SnapshotState::Pending(waiters) = std::mem::replace(&mut state.snapshot, SnapshotState::Idle) {
            for waiter in waiters {
                let _ = waiter.send(Err(closed()));
            }
        }
        for (_, waiters) in state.registrations.drain() {
            for waiter in waiters {
                let _ = waiter.send(Err(closed()));
            }
        }
        for (_, submission) in state.submissions.drain() {
            let _ = submission.waiter.send(Err(closed()));
        }
        true
    }
}

enum Event {
    Inbound(std::result::Result<Option<ServerMessage>, TransportError>),
    Outbound(Option<Outbound>),
}

/// Pumps frames between the transport and the session until either side ends.
async fn drive(
    inner: Weak<SessionInner>,
    mut transport: Box<dyn Transport>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    loop {
        let event = tokio::select! {
            inbound = transport.recv() => Event::Inbound(inbound),
            next = outbound.recv() => Event::Outbound(next),
        };

        let Some(session) = inner.upgrade().map(|inner| Session { inner }) else {
            let _ = transport.disconnect().await;
            return;
        };

        match event {
            Event::Inbound(Ok(Some(msg))) => {
                trace!(?msg, "frame received");
                session.dispatch(msg);
            }
            Event::Inbound(Ok(None)) => {
                session.close("connection closed by server");
                return;
            }
            Event::Inbound(Err(TransportError::SerializationError(e))) => {
                warn!(error = %e, "skipping undecodable frame");
            }
            Event::Inbound(Err(e)) => {
                session.close(&e.to_string());
                return;
            }
            Event::Outbound(Some(Outbound::Frame(msg))) => {
                if let Err(e) = transport.send(msg).await {
                    session.close(&e.to_string());
                    return;
                }
            }
            Event::Outbound(Some(Outbound::Close)) | Event::Outbound(None) => {
                let _ = transport.disconnect().await;
                session.close("session disposed");
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
