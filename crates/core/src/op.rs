// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operations on the document tree.
//!
//! Every mutation, local or remote, travels as an [`OpBatch`]: an ordered list
//! of ops built against a baseline version. The sequencing server accepts or
//! rejects a submitted batch as a whole, and every replica applies accepted
//! batches in the server's emission order.
//!
//! Text positions and lengths are counted in Unicode scalar values.

use serde::{Deserialize, Serialize};

use crate::document::{DocId, DocKind};

/// Submitter-chosen correlation token, unique per batch.
pub type BatchId = String;

/// A single tree mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    /// Create an empty directory or an empty text file.
    #[serde(rename_all = "camelCase")]
    Add {
        #[serde(rename = "docType")]
        kind: DocKind,
        name: String,
        parent_id: DocId,
        #[serde(rename = "docId")]
        new_doc_id: DocId,
    },

    /// Remove a document from its parent and from the tree.
    #[serde(rename_all = "camelCase")]
    Unlink { doc_id: DocId },

    /// Move and/or rename a document.
    #[serde(rename_all = "camelCase")]
    Rename {
        doc_id: DocId,
        new_name: String,
        new_parent_id: DocId,
    },

    /// Splice `text` into a text file at `position`.
    #[serde(rename_all = "camelCase")]
    Insert {
        doc_id: DocId,
        position: usize,
        text: String,
    },

    /// Delete `text` from a text file at `position`.
    ///
    /// `text` must equal the removed range exactly.
    #[serde(rename_all = "camelCase")]
    Remove {
        doc_id: DocId,
        position: usize,
        text: String,
    },
}

impl Op {
    /// Returns the document this op addresses (the new id for `Add`).
    pub fn doc_id(&self) -> &str {
        match self {
            Op::Add { new_doc_id, .. } => new_doc_id,
            Op::Unlink { doc_id }
            | Op::Rename { doc_id, .. }
            | Op::Insert { doc_id, .. }
            | Op::Remove { doc_id, .. } => doc_id,
        }
    }

    /// Returns the wire name of this op's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Op::Add { .. } => "add",
            Op::Unlink { .. } => "unlink",
            Op::Rename { .. } => "rename",
            Op::Insert { .. } => "insert",
            Op::Remove { .. } => "remove",
        }
    }

    /// Creates an Add op.
    pub fn add(kind: DocKind, name: impl Into<String>, parent_id: impl Into<DocId>, new_doc_id: impl Into<DocId>) -> Self {
        Op::Add {
            kind,
            name: name.into(),
            parent_id: parent_id.into(),
            new_doc_id: new_doc_id.into(),
        }
    }

    /// Creates an Unlink op.
    pub fn unlink(doc_id: impl Into<DocId>) -> Self {
        Op::Unlink { doc_id: doc_id.into() }
    }

    /// Creates a Rename op.
    pub fn rename(doc_id: impl Into<DocId>, new_name: impl Into<String>, new_parent_id: impl Into<DocId>) -> Self {
        Op::Rename {
            doc_id: doc_id.into(),
            new_name: new_name.into(),
            new_parent_id: new_parent_id.into(),
        }
    }

    /// Creates an Insert op.
    pub fn insert(doc_id: impl Into<DocId>, position: usize, text: impl Into<String>) -> Self {
        Op::Insert {
            doc_id: doc_id.into(),
            position,
            text: text.into(),
        }
    }

    /// Creates a Remove op.
    pub fn remove(doc_id: impl Into<DocId>, position: usize, text: impl Into<String>) -> Self {
        Op::Remove {
            doc_id: doc_id.into(),
            position,
            text: text.into(),
        }
    }
}

/// An ordered set of ops applied atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpBatch {
    pub id: BatchId,
    /// Replica version the submitter believed current.
    #[serde(rename = "version")]
    pub baseline_version: u64,
    pub ops: Vec<Op>,
}

impl OpBatch {
    /// Creates a new batch.
    pub fn new(id: impl Into<BatchId>, baseline_version: u64, ops: Vec<Op>) -> Self {
        OpBatch {
            id: id.into(),
            baseline_version,
            ops,
        }
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
