// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! At most one live replica per project.
//!
//! Each project id maps to a `OnceCell` so concurrent callers share one
//! in-flight connect. A session that has since closed is evicted on the
//! next lookup and a fresh one is opened in its place.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::join_all;
use tokio::sync::{broadcast, OnceCell};
use tracing::{debug, info, warn};

use otfs_core::{ClockSource, SystemClock};

use super::bridge::{ChangeBridge, FileChange};
use super::resolve::split_path;
use super::session::{Session, SessionOptions};
use super::transport::{Transport, WebSocketTransport};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Creates a fresh, unconnected transport per session.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Box<dyn Transport> + Send + Sync,
{
    fn create(&self) -> Box<dyn Transport> {
        self()
    }
}

/// Opens WebSocket transports.
pub struct WebSocketFactory;

impl TransportFactory for WebSocketFactory {
    fn create(&self) -> Box<dyn Transport> {
        Box::new(WebSocketTransport::new())
    }
}

#[derive(Default)]
struct Watches {
    next_id: u64,
    paths: HashMap<String, Vec<(u64, String)>>,
}

/// Project id to shared replica handle.
pub struct Registry {
    config: Config,
    credentials: Arc<dyn CredentialStore>,
    transports: Arc<dyn TransportFactory>,
    clock: Arc<dyn ClockSource>,
    changes: broadcast::Sender<FileChange>,
    sessions: Mutex<HashMap<String, Arc<OnceCell<Session>>>>,
    watches: Mutex<Watches>,
}

impl Registry {
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialStore>,
        transports: Arc<dyn TransportFactory>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Registry {
            config,
            credentials,
            transports,
            clock: Arc::new(SystemClock),
            changes,
            sessions: Mutex::new(HashMap::new()),
            watches: Mutex::new(Watches::default()),
        }
    }

    /// Replaces the clock handed to new sessions.
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Change notifications from every project's replica.
    pub fn subscribe(&self) -> broadcast::Receiver<FileChange> {
        self.changes.subscribe()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<OnceCell<Session>>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn watches(&self) -> MutexGuard<'_, Watches> {
        self.watches.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the live session for `project_id`, connecting on first use.
    pub async fn get(&self, project_id: &str) -> Result<Session> {
        let cell = {
            let mut sessions = self.sessions();
            let dead = sessions
                .get(project_id)
                .and_then(|cell| cell.get())
                .is_some_and(Session::is_closed);
            if dead {
                debug!(project_id, "evicting closed session");
                sessions.remove(project_id);
            }
            Arc::clone(sessions.entry(project_id.to_string()).or_default())
        };
        let session = cell.get_or_try_init(|| self.connect(project_id)).await?.clone();

        // A dispose while connecting unmaps the cell; the session it produced is orphaned.
        let still_mapped = self
            .sessions()
            .get(project_id)
            .is_some_and(|current| Arc::ptr_eq(current, &cell));
        if !still_mapped {
            debug!(project_id, "disposed while connecting");
            session.dispose();
            return Err(Error::ConnectionClosed("disposed while connecting".to_string()));
        }
        Ok(session)
    }

    /// The session for `project_id` if one is open, without connecting.
    pub fn peek(&self, project_id: &str) -> Option<Session> {
        self.sessions()
            .get(project_id)
            .and_then(|cell| cell.get().cloned())
            .filter(|session| !session.is_closed())
    }

    async fn connect(&self, project_id: &str) -> Result<Session> {
        let token = self.credentials.get()?.ok_or(Error::NotAuthenticated)?;
        let url = self.config.channel_url(project_id, &token);
        let options = SessionOptions {
            request_timeout: self.config.request_timeout(),
            clock: Arc::clone(&self.clock),
        };

        let limit = self.config.connect_timeout();
        let opening = Session::open(&url, self.transports.create(), options);
        let session = tokio::time::timeout(limit, opening)
            .await
            .map_err(|_| Error::Timeout(limit))??;
        session.add_observer(Box::new(ChangeBridge::new(project_id, self.changes.clone())));

        if let Err(e) = session.snapshot().await {
            session.dispose();
            return Err(e);
        }
        info!(project_id, version = session.version(), "replica ready");

        let primes = self.watched_paths(project_id).into_iter().map(|path| {
            let session = session.clone();
            async move {
                if let Err(e) = session.resolve(&split_path(&path)).await {
                    warn!(project_id, path = %path, error = %e, "failed to prime watched path");
                }
            }
        });
        join_all(primes).await;

        Ok(session)
    }

    /// Closes and forgets the session for `project_id`.
    pub fn dispose(&self, project_id: &str) {
        let cell = self.sessions().remove(project_id);
        if let Some(session) = cell.and_then(|cell| cell.get().cloned()) {
            session.dispose();
        }
    }

    /// Closes every session.
    pub fn dispose_all(&self) {
        let cells: Vec<_> = self.sessions().drain().map(|(_, cell)| cell).collect();
        for session in cells.iter().filter_map(|cell| cell.get()) {
            session.dispose();
        }
    }

    /// Records a watched path, primed on every (re)connect. Returns its id.
    pub fn add_watch(&self, project_id: &str, path: &str) -> u64 {
        let mut watches = self.watches();
        watches.next_id += 1;
        let id = watches.next_id;
        watches
            .paths
            .entry(project_id.to_string())
            .or_default()
            .push((id, path.to_string()));
        id
    }

    pub fn remove_watch(&self, project_id: &str, id: u64) {
        let mut watches = self.watches();
        if let Some(paths) = watches.paths.get_mut(project_id) {
            paths.retain(|(watch_id, _)| *watch_id != id);
            if paths.is_empty() {
                watches.paths.remove(project_id);
            }
        }
    }

    pub fn watched_paths(&self, project_id: &str) -> Vec<String> {
        self.watches()
            .paths
            .get(project_id)
            .map(|paths| paths.iter().map(|(_, path)| path.clone()).collect())
            .unwrap_or_default()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
