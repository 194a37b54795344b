// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem facade over the per-project replicas.
//!
//! Every call names a project and a slash-separated path inside it. Reads
//! go through the Path Resolver; mutations through the Mutation Submitter,
//! wrapped in the configured retry policy.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use otfs_core::{DocKind, Document};

use crate::error::{Error, Result};
use crate::id::is_project_id;
use crate::sync::{join_path, retry_rejected, split_path, FileChange, Registry, Session};

/// Entry type as seen by a filesystem consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Directory,
}

impl From<DocKind> for FileType {
    fn from(kind: DocKind) -> Self {
        match kind {
            DocKind::Directory => FileType::Directory,
            DocKind::File => FileType::File,
        }
    }
}

/// Metadata returned by [`RemoteFs::stat`]. Times are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub file_type: FileType,
    pub ctime: u64,
    pub mtime: u64,
    pub size: u64,
}

/// Flags for [`RemoteFs::write`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create the file if it does not exist.
    pub create: bool,
    /// Replace the content if the file exists.
    pub overwrite: bool,
}

/// Keeps a path primed on every reconnect until dropped.
pub struct WatchGuard {
    registry: Arc<Registry>,
    project_id: String,
    id: u64,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.registry.remove_watch(&self.project_id, self.id);
    }
}

/// Filesystem operations across projects.
#[derive(Clone)]
pub struct RemoteFs {
    registry: Arc<Registry>,
}

fn require_directory(doc: &Document, path: &str) -> Result<()> {
    if doc.is_directory() {
        Ok(())
    } else {
        Err(Error::NotADirectory(path.to_string()))
    }
}

fn require_file(doc: &Document, path: &str) -> Result<()> {
    if doc.is_directory() {
        Err(Error::NotAFile(path.to_string()))
    } else {
        Ok(())
    }
}

impl RemoteFs {
    pub fn new(registry: Arc<Registry>) -> Self {
        RemoteFs { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Change notifications for every project.
    pub fn subscribe(&self) -> broadcast::Receiver<FileChange> {
        self.registry.subscribe()
    }

    async fn session(&self, project_id: &str) -> Result<Session> {
        if !is_project_id(project_id) {
            return Err(Error::NotFound(format!("{}: not a project id", project_id)));
        }
        self.registry.get(project_id).await
    }

    fn retries(&self) -> u32 {
        self.registry.config().submit_retries
    }

    /// Watches `path`: primes it now, and again whenever the project reconnects.
    ///
    /// Changes themselves arrive through [`RemoteFs::subscribe`] whether or
    /// not anything is watched.
    pub fn watch(&self, project_id: &str, path: &str) -> Result<WatchGuard> {
        if !is_project_id(project_id) {
            return Err(Error::NotFound(format!("{}: not a project id", project_id)));
        }
        let id = self.registry.add_watch(project_id, path);

        let registry = Arc::clone(&self.registry);
        let project = project_id.to_string();
        let segments = split_path(path);
        tokio::spawn(async move {
            let primed = match registry.get(&project).await {
                Ok(session) => session.resolve(&segments).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = primed {
                debug!(project_id = %project, path = %join_path(&segments), error = %e, "watch prime failed");
            }
        });

        Ok(WatchGuard {
            registry: Arc::clone(&self.registry),
            project_id: project_id.to_string(),
            id,
        })
    }

    pub async fn stat(&self, project_id: &str, path: &str) -> Result<FileStat> {
        let session = self.session(project_id).await?;
        let doc = session.resolve(&split_path(path)).await?;
        Ok(FileStat {
            file_type: doc.kind().into(),
            ctime: doc.create_time,
            mtime: doc.modify_time,
            size: doc.size()?,
        })
    }

    /// Entries of a directory, sorted by name.
    pub async fn list(&self, project_id: &str, path: &str) -> Result<Vec<(String, FileType)>> {
        let session = self.session(project_id).await?;
        let doc = session.resolve(&split_path(path)).await?;
        let children = doc
            .children()
            .ok_or_else(|| Error::NotADirectory(path.to_string()))?;
        Ok(children
            .iter()
            .map(|(name, child)| (name.clone(), child.kind.into()))
            .collect())
    }

    pub async fn mkdir(&self, project_id: &str, path: &str) -> Result<()> {
        let mut segments = split_path(path);
        let Some(name) = segments.pop() else {
            return Err(Error::AlreadyExists("/".to_string()));
        };
        let session = self.session(project_id).await?;
        let parent = session.resolve(&segments).await?;
        require_directory(&parent, &join_path(&segments))?;
        retry_rejected(self.retries(), || session.create_directory(&parent.doc_id, &name)).await
    }

    pub async fn read(&self, project_id: &str, path: &str) -> Result<Vec<u8>> {
        let session = self.session(project_id).await?;
        let doc = session.resolve(&split_path(path)).await?;
        require_file(&doc, path)?;
        Ok(doc.bytes()?)
    }

    /// Writes `content` (which must be UTF-8) to a file.
    pub async fn write(
        &self,
        project_id: &str,
        path: &str,
        content: &[u8],
        options: WriteOptions,
    ) -> Result<()> {
        let mut segments = split_path(path);
        let Some(name) = segments.pop() else {
            return Err(Error::NotAFile("/".to_string()));
        };
        let text = std::str::from_utf8(content)
            .map_err(|e| Error::InvalidContent(format!("{}: {}", path, e)))?;

        let session = self.session(project_id).await?;
        let parent = session.resolve(&segments).await?;
        require_directory(&parent, &join_path(&segments))?;
        let existing = parent.children().and_then(|children| children.get(&name)).cloned();

        let Some(existing) = existing else {
            if !options.create {
                return Err(Error::NotFound(path.to_string()));
            }
            return retry_rejected(self.retries(), || session.create_file(&parent.doc_id, &name, text))
                .await;
        };
        if !options.overwrite {
            return Err(Error::AlreadyExists(path.to_string()));
        }
        let doc = session.require_document(&existing.doc_id).await?;
        require_file(&doc, path)?;
        if doc.is_binary() {
            retry_rejected(self.retries(), || session.replace_binary(&doc.doc_id, text)).await
        } else {
            retry_rejected(self.retries(), || session.replace_text(&doc.doc_id, text)).await
        }
    }

    pub async fn delete(&self, project_id: &str, path: &str) -> Result<()> {
        let session = self.session(project_id).await?;
        let doc = session.resolve(&split_path(path)).await?;
        retry_rejected(self.retries(), || session.delete(&doc.doc_id)).await
    }

    /// Moves `old_path` to `new_path`. Both must be in the same project.
    pub async fn rename(
        &self,
        old_project_id: &str,
        old_path: &str,
        new_project_id: &str,
        new_path: &str,
    ) -> Result<()> {
        if old_project_id != new_project_id {
            return Err(Error::Unsupported("cannot move between projects".to_string()));
        }
        let mut target = split_path(new_path);
        let Some(new_name) = target.pop() else {
            return Err(Error::AlreadyExists("/".to_string()));
        };
        let session = self.session(old_project_id).await?;
        let doc = session.resolve(&split_path(old_path)).await?;
        let parent = session.resolve(&target).await?;
        require_directory(&parent, &join_path(&target))?;
        retry_rejected(self.retries(), || session.rename(&doc.doc_id, &parent.doc_id, &new_name)).await
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
