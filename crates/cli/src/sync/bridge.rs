// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Change Bridge: applied ops become file change notifications.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use otfs_core::{Op, OpObserver, Tree};

use super::resolve::join_path;

/// What happened at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Changed => "changed",
            ChangeKind::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

/// A change notification for one path in one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub project_id: String,
    pub path: String,
    pub kind: ChangeKind,
}

/// Reports every applied op, watched or not.
pub struct ChangeBridge {
    project_id: String,
    sender: broadcast::Sender<FileChange>,
}

impl ChangeBridge {
    pub fn new(project_id: impl Into<String>, sender: broadcast::Sender<FileChange>) -> Self {
        ChangeBridge {
            project_id: project_id.into(),
            sender,
        }
    }

    fn emit(&self, tree: &Tree, doc_id: &str, kind: ChangeKind) {
        let names = match tree.path_of(doc_id) {
            Ok(names) => names,
            Err(e) => {
                debug!(doc_id, %kind, error = %e, "skipping change notification");
                return;
            }
        };
        // No receivers is fine.
        let _ = self.sender.send(FileChange {
            project_id: self.project_id.clone(),
            path: join_path(&names),
            kind,
        });
    }
}

impl OpObserver for ChangeBridge {
    fn before_op(&mut self, tree: &Tree, op: &Op) {
        if let Op::Unlink { doc_id } | Op::Rename { doc_id, .. } = op {
            self.emit(tree, doc_id, ChangeKind::Deleted);
        }
    }

    fn after_op(&mut self, tree: &Tree, op: &Op) {
        match op {
            Op::Add { .. } | Op::Rename { .. } => self.emit(tree, op.doc_id(), ChangeKind::Created),
            Op::Insert { doc_id, .. } | Op::Remove { doc_id, .. } => {
                self.emit(tree, doc_id, ChangeKind::Changed)
            }
            Op::Unlink { .. } => {}
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
