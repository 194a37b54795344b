// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mutation Submitter.
//!
//! Every mutation follows one template: pre-check the current replica, send
//! one batch if the change is still needed, then wait for the verdict. Local
//! state only changes when the server accepts.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use otfs_core::{DocKind, Op, Tree};

use super::session::Session;
use crate::error::{Error, Result};
use crate::id::generate_id;

/// Outcome of a pre-check.
#[derive(Debug, PartialEq)]
pub enum Precheck {
    /// The desired end state already holds; nothing is sent.
    Redundant,
    /// Submit these ops as one batch.
    Submit(Vec<Op>),
}

/// Whether a name under a parent is free for a new document of `kind`.
#[derive(Debug, PartialEq)]
enum Slot {
    Free,
    /// Parent gone, or a sibling of the same kind already holds the name.
    Settled,
}

fn slot(tree: &Tree, parent_id: &str, name: &str, kind: DocKind) -> Result<Slot> {
    let Some(parent) = tree.document(parent_id) else {
        return Ok(Slot::Settled);
    };
    let Some(children) = parent.children() else {
        return Err(Error::NotADirectory(parent.name.clone()));
    };
    match children.get(name) {
        None => Ok(Slot::Free),
        Some(existing) if existing.kind == kind => Ok(Slot::Settled),
        Some(_) => Err(Error::AlreadyExists(name.to_string())),
    }
}

impl Session {
    /// The submission template shared by every mutation.
    pub(crate) async fn submit_with<F>(&self, precheck: F) -> Result<()>
    where
        F: FnOnce(&Tree) -> Result<Precheck>,
    {
        self.snapshot().await?;
        match self.enqueue_batch(precheck)? {
            Some(pending) => self.await_verdict(pending).await,
            None => {
                debug!("change already holds, nothing submitted");
                Ok(())
            }
        }
    }

    /// Creates an empty directory `name` under `parent_id`.
    pub async fn create_directory(&self, parent_id: &str, name: &str) -> Result<()> {
        let doc_id = generate_id();
        self.submit_with(|tree| {
            Ok(match slot(tree, parent_id, name, DocKind::Directory)? {
                Slot::Settled => Precheck::Redundant,
                Slot::Free => Precheck::Submit(vec![Op::add(DocKind::Directory, name, parent_id, doc_id)]),
            })
        })
        .await
    }

    /// Creates text file `name` under `parent_id` holding `content`.
    pub async fn create_file(&self, parent_id: &str, name: &str, content: &str) -> Result<()> {
        let doc_id = generate_id();
        self.submit_with(|tree| {
            Ok(match slot(tree, parent_id, name, DocKind::File)? {
                Slot::Settled => Precheck::Redundant,
                Slot::Free => Precheck::Submit(vec![
                    Op::add(DocKind::File, name, parent_id, doc_id.clone()),
                    Op::insert(doc_id, 0, content),
                ]),
            })
        })
        .await
    }

    /// Unlinks a document and everything under it.
    pub async fn delete(&self, doc_id: &str) -> Result<()> {
        self.submit_with(|tree| {
            if tree.root_id() == Some(doc_id) {
                return Err(Error::Unsupported("the project root cannot be deleted".to_string()));
            }
            if !tree.contains(doc_id) {
                return Ok(Precheck::Redundant);
            }
            Ok(Precheck::Submit(vec![Op::unlink(doc_id)]))
        })
        .await
    }

    /// Moves a document under `new_parent_id` as `new_name`.
    pub async fn rename(&self, doc_id: &str, new_parent_id: &str, new_name: &str) -> Result<()> {
        self.submit_with(|tree| {
            if !tree.contains(doc_id) {
                return Ok(Precheck::Redundant);
            }
            let Some(parent) = tree.document(new_parent_id) else {
                return Ok(Precheck::Redundant);
            };
            let Some(children) = parent.children() else {
                return Err(Error::NotADirectory(parent.name.clone()));
            };
            match children.get(new_name) {
                Some(existing) if existing.doc_id == doc_id => Ok(Precheck::Redundant),
                Some(_) => Err(Error::AlreadyExists(new_name.to_string())),
                None => Ok(Precheck::Submit(vec![Op::rename(doc_id, new_name, new_parent_id)])),
            }
        })
        .await
    }

    /// Replaces the whole content of a text file.
    pub async fn replace_text(&self, doc_id: &str, content: &str) -> Result<()> {
        self.submit_with(|tree| {
            let Some(doc) = tree.document(doc_id) else {
                return Ok(Precheck::Redundant);
            };
            if doc.is_directory() {
                return Err(Error::NotAFile(doc.name.clone()));
            }
            let Some(current) = doc.text() else {
                return Err(Error::Unsupported(format!("{} holds binary content", doc.name)));
            };
            if current == content {
                return Ok(Precheck::Redundant);
            }
            Ok(Precheck::Submit(vec![
                Op::remove(doc_id, 0, current),
                Op::insert(doc_id, 0, content),
            ]))
        })
        .await
    }

    /// Replaces a binary file with a text file of the same name.
    ///
    /// Binary payloads cannot be spliced, so the old document is unlinked and
    /// a new one created under a fresh id.
    pub async fn replace_binary(&self, doc_id: &str, content: &str) -> Result<()> {
        let new_id = generate_id();
        self.submit_with(|tree| {
            let Some(doc) = tree.document(doc_id) else {
                return Ok(Precheck::Redundant);
            };
            if doc.is_directory() {
                return Err(Error::NotAFile(doc.name.clone()));
            }
            let Some(parent_id) = doc.parent_id.clone() else {
                return Err(Error::Unsupported(format!("{} has no parent", doc.name)));
            };
            Ok(Precheck::Submit(vec![
                Op::unlink(doc_id),
                Op::add(DocKind::File, doc.name.clone(), parent_id, new_id.clone()),
                Op::insert(new_id, 0, content),
            ]))
        })
        .await
    }
}

const RETRY_INITIAL_DELAY_MS: u64 = 100;
const RETRY_MAX_DELAY_MS: u64 = 2_000;

/// Re-runs `op` up to `attempts` more times while it fails with
/// [`Error::Rejected`], backing off exponentially between attempts.
///
/// `op` must rebuild the whole pre-check-then-submit call so each attempt
/// sees the replica as it is now.
pub async fn retry_rejected<F, Fut, T>(attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay_ms = RETRY_INITIAL_DELAY_MS;
    loop {
        match op().await {
            Err(Error::Rejected(batch_id)) if attempt < attempts => {
                attempt += 1;
                warn!(batch_id = %batch_id, attempt, "batch rejected, retrying");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = std::cmp::min(delay_ms * 2, RETRY_MAX_DELAY_MS);
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
#[path = "submit_tests.rs"]
mod tests;
