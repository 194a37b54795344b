// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Batch validation for the sequencing server.
//!
//! Replicas trust every batch they are handed; the sequencer is the one place
//! that checks them. A batch is checked op by op against a scratch copy of the
//! tree, so later ops see the effects of earlier ones.

use crate::document::DocKind;
use crate::error::{Error, Result};
use crate::op::{Op, OpBatch};
use crate::tree::{byte_offset, Tree, SUPER_ROOT_ID};

impl Tree {
    /// Checks that `batch` is current and well-formed against this tree.
    ///
    /// The tree must be fully resident (as on the server).
    pub fn check_batch(&self, batch: &OpBatch) -> Result<()> {
        let invalid = |reason: String| Error::InvalidBatch {
            batch_id: batch.id.clone(),
            reason,
        };

        if batch.baseline_version != self.version() {
            return Err(invalid(format!(
                "stale baseline {} (current version {})",
                batch.baseline_version,
                self.version()
            )));
        }

        let mut scratch = self.clone();
        for (index, op) in batch.ops.iter().enumerate() {
            scratch.check_op(op).map_err(|reason| invalid(format!("op {index} ({}): {reason}", op.type_name())))?;
            scratch.apply_op(op, 0);
        }
        Ok(())
    }

    fn check_op(&self, op: &Op) -> std::result::Result<(), String> {
        match op {
            Op::Add {
                name,
                parent_id,
                new_doc_id,
                ..
            } => {
                if self.contains(new_doc_id) {
                    return Err(format!("document id {new_doc_id} already in use"));
                }
                self.check_free_slot(parent_id, name, None)
            }

            Op::Unlink { doc_id } => {
                self.require(doc_id)?;
                self.require_movable(doc_id)
            }

            Op::Rename {
                doc_id,
                new_name,
                new_parent_id,
            } => {
                self.require(doc_id)?;
                self.require_movable(doc_id)?;
                self.check_free_slot(new_parent_id, new_name, Some(doc_id))?;
                if self.is_ancestor_or_self(doc_id, new_parent_id) {
                    return Err("cannot move a directory into itself".to_string());
                }
                Ok(())
            }

            Op::Insert { doc_id, position, .. } => {
                let content = self.require_text(doc_id)?;
                if *position > content.chars().count() {
                    return Err(format!("position {position} out of range"));
                }
                Ok(())
            }

            Op::Remove { doc_id, position, text } => {
                let content = self.require_text(doc_id)?;
                if position + text.chars().count() > content.chars().count() {
                    return Err(format!("range at {position} out of range"));
                }
                let start = byte_offset(content, *position);
                if !content[start..].starts_with(text.as_str()) {
                    return Err("removed text does not match content".to_string());
                }
                Ok(())
            }
        }
    }

    fn require(&self, doc_id: &str) -> std::result::Result<(), String> {
        if self.contains(doc_id) {
            Ok(())
        } else {
            Err(format!("document {doc_id} not found"))
        }
    }

    fn require_movable(&self, doc_id: &str) -> std::result::Result<(), String> {
        if doc_id == SUPER_ROOT_ID || Some(doc_id) == self.root_id() {
            Err("the project root cannot be moved or removed".to_string())
        } else {
            Ok(())
        }
    }

    fn require_text(&self, doc_id: &str) -> std::result::Result<&str, String> {
        let doc = self.document(doc_id).ok_or_else(|| format!("document {doc_id} not found"))?;
        doc.text().ok_or_else(|| format!("document {doc_id} is not a text file"))
    }

    /// Checks that `name` under `parent_id` is valid and free (or already
    /// held by `moving`).
    fn check_free_slot(&self, parent_id: &str, name: &str, moving: Option<&String>) -> std::result::Result<(), String> {
        if !is_valid_name(name) {
            return Err(format!("invalid name {name:?}"));
        }
        let parent = self.document(parent_id).ok_or_else(|| format!("parent {parent_id} not found"))?;
        if parent.kind() != DocKind::Directory {
            return Err(format!("parent {parent_id} is not a directory"));
        }
        match self.child(parent_id, name) {
            Some(child) if Some(&child.doc_id) != moving => Err(format!("{name} already exists")),
            _ => Ok(()),
        }
    }

    fn is_ancestor_or_self(&self, ancestor: &str, doc_id: &str) -> bool {
        let mut current = Some(doc_id);
        for _ in 0..=self.len() {
            match current {
                Some(id) if id == ancestor => return true,
                Some(id) => current = self.document(id).and_then(|doc| doc.parent_id.as_deref()),
                None => return false,
            }
        }
        false
    }
}

/// Returns true if `name` can be a single path segment.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
