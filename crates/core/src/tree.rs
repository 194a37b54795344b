// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The document tree replica and its op applier.
//!
//! A [`Tree`] is a partial mirror of the remote tree: only documents that were
//! registered or learned about through ops are resident. Applying a batch is
//! total and deterministic. Ops that address documents which are not resident
//! update whatever part of the tree is, and never fail.
//!
//! Applier rules:
//! - Add: creates the document and links it under its parent if resident
//! - Unlink: drops the parent's entry and the document itself
//! - Rename: moves the parent entry, then updates name and parent
//! - Insert/Remove: splice text content
//!
//! Every touched directory or file has its `modify_time` bumped.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::document::{ChildRef, DocId, DocKind, Document};
use crate::error::{Error, Result};
use crate::op::{Op, OpBatch};

/// Identifier of the synthetic super-root in server snapshots.
pub const SUPER_ROOT_ID: &str = "root";

/// Name of the project directory under the super-root.
pub const ROOT_NAME: &str = ".";

/// Hooks invoked around every applied op.
///
/// `before_op` sees the tree as it was, `after_op` as it now is.
pub trait OpObserver {
    fn before_op(&mut self, _tree: &Tree, _op: &Op) {}
    fn after_op(&mut self, _tree: &Tree, _op: &Op) {}
}

impl OpObserver for () {}

impl OpObserver for Vec<Box<dyn OpObserver + Send>> {
    fn before_op(&mut self, tree: &Tree, op: &Op) {
        for observer in self.iter_mut() {
            observer.before_op(tree, op);
        }
    }

    fn after_op(&mut self, tree: &Tree, op: &Op) {
        for observer in self.iter_mut() {
            observer.after_op(tree, op);
        }
    }
}

/// In-memory replica of the document tree.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    version: u64,
    root_id: Option<DocId>,
    documents: HashMap<DocId, Document>,
}

impl Tree {
    /// Creates an empty replica with no snapshot yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fully resident tree holding only an empty project directory.
    ///
    /// The project directory is named `.` and hangs under the super-root.
    pub fn new_project(root_id: impl Into<DocId>, now: u64) -> Self {
        let root_id = root_id.into();
        let mut super_root = Document::directory(SUPER_ROOT_ID, "", None, now);
        if let Some(children) = super_root.children_mut() {
            children.insert(ROOT_NAME.to_string(), ChildRef::new(root_id.clone(), DocKind::Directory));
        }
        let root = Document::directory(root_id.clone(), ROOT_NAME, Some(SUPER_ROOT_ID.to_string()), now);

        let mut documents = HashMap::new();
        documents.insert(SUPER_ROOT_ID.to_string(), super_root);
        documents.insert(root_id.clone(), root);

        Tree {
            version: 0,
            root_id: Some(root_id),
            documents,
        }
    }

    /// Returns the number of batches applied since the snapshot baseline.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the project directory id, once a snapshot has been taken.
    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    /// Establishes version and root from a snapshot.
    pub fn set_snapshot(&mut self, version: u64, root_id: impl Into<DocId>) {
        self.version = version;
        self.root_id = Some(root_id.into());
    }

    /// Loads a document fetched from the server.
    ///
    /// A resident document is never replaced by a fresh fetch; ops keep it
    /// current. Returns the resident copy.
    pub fn load_document(&mut self, doc: Document) -> &Document {
        self.documents.entry(doc.doc_id.clone()).or_insert(doc)
    }

    /// Inserts or replaces a document without touching its parent.
    pub fn insert_document(&mut self, doc: Document) {
        self.documents.insert(doc.doc_id.clone(), doc);
    }

    pub fn document(&self, doc_id: &str) -> Option<&Document> {
        self.documents.get(doc_id)
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.documents.contains_key(doc_id)
    }

    /// Returns the number of resident documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns the child reference `name` under directory `parent_id`.
    pub fn child(&self, parent_id: &str, name: &str) -> Option<&ChildRef> {
        self.documents.get(parent_id)?.children()?.get(name)
    }

    /// Returns the path segments from the root to `doc_id`.
    ///
    /// Fails with [`Error::AncestryIncomplete`] when any ancestor is not
    /// resident, or when no snapshot has established the root.
    pub fn path_of(&self, doc_id: &str) -> Result<Vec<String>> {
        let incomplete = || Error::AncestryIncomplete(doc_id.to_string());
        let root_id = self.root_id.as_deref().ok_or_else(incomplete)?;

        let mut names = Vec::new();
        let mut current = doc_id;
        // Any chain longer than the number of resident documents is a cycle.
        for _ in 0..=self.documents.len() {
            if current == root_id {
                names.reverse();
                return Ok(names);
            }
            let doc = self.documents.get(current).ok_or_else(incomplete)?;
            names.push(doc.name.clone());
            current = doc.parent_id.as_deref().ok_or_else(incomplete)?;
        }
        Err(incomplete())
    }

    /// Applies a batch: advances the version, then applies every op in order.
    pub fn apply_batch(&mut self, batch: &OpBatch, now: u64, observer: &mut dyn OpObserver) {
        self.version = batch.baseline_version.saturating_add(1);
        debug!(batch_id = %batch.id, version = self.version, ops = batch.ops.len(), "applying batch");

        for op in &batch.ops {
            observer.before_op(self, op);
            self.apply_op(op, now);
            observer.after_op(self, op);
        }
    }

    pub(crate) fn apply_op(&mut self, op: &Op, now: u64) {
        match op {
            Op::Add {
                kind,
                name,
                parent_id,
                new_doc_id,
            } => {
                let parent = Some(parent_id.clone());
                let doc = match kind {
                    DocKind::Directory => Document::directory(new_doc_id.clone(), name.clone(), parent, now),
                    DocKind::File => Document::text_file(new_doc_id.clone(), name.clone(), parent, now, ""),
                };
                self.attach(parent_id, name, ChildRef::new(new_doc_id.clone(), *kind), now);
                self.documents.insert(new_doc_id.clone(), doc);
            }

            Op::Unlink { doc_id } => {
                self.detach(doc_id, now);
                self.prune(doc_id);
            }

            Op::Rename {
                doc_id,
                new_name,
                new_parent_id,
            } => {
                let detached = self.detach(doc_id, now);
                let kind = match self.documents.get_mut(doc_id) {
                    Some(doc) => {
                        doc.name = new_name.clone();
                        doc.parent_id = Some(new_parent_id.clone());
                        Some(doc.kind())
                    }
                    None => detached.map(|child| child.kind),
                };
                match kind {
                    Some(kind) => self.attach(new_parent_id, new_name, ChildRef::new(doc_id.clone(), kind), now),
                    None if self.contains(new_parent_id) => {
                        warn!(doc_id = %doc_id, "rename of unknown document into a resident directory");
                    }
                    None => {}
                }
            }

            Op::Insert { doc_id, position, text } => {
                if let Some(content) = self.text_mut(doc_id) {
                    let at = byte_offset(content, *position);
                    content.insert_str(at, text);
                    self.touch(doc_id, now);
                }
            }

            Op::Remove { doc_id, position, text } => {
                if let Some(content) = self.text_mut(doc_id) {
                    let start = byte_offset(content, *position);
                    let end = start + byte_offset(&content[start..], text.chars().count());
                    if content[start..end] != *text {
                        warn!(doc_id = %doc_id, position, "removed text does not match op");
                    }
                    content.replace_range(start..end, "");
                    self.touch(doc_id, now);
                }
            }
        }
    }

    /// Links `child` under `parent_id` if that directory is resident.
    fn attach(&mut self, parent_id: &str, name: &str, child: ChildRef, now: u64) {
        let Some(parent) = self.documents.get_mut(parent_id) else {
            debug!(parent_id, name, "parent not resident, skipping link");
            return;
        };
        match parent.children_mut() {
            Some(children) => {
                children.insert(name.to_string(), child);
                parent.touch(now);
            }
            None => warn!(parent_id, name, "cannot link under a file"),
        }
    }

    /// Unlinks `doc_id` from whichever resident directory references it.
    fn detach(&mut self, doc_id: &str, now: u64) -> Option<ChildRef> {
        let location = match self.documents.get(doc_id) {
            Some(doc) => doc.parent_id.clone().map(|parent_id| (parent_id, doc.name.clone())),
            None => self.find_reference(doc_id),
        };
        let (parent_id, name) = location?;
        let parent = self.documents.get_mut(&parent_id)?;
        let children = parent.children_mut()?;
        if children.get(&name).is_some_and(|child| child.doc_id == doc_id) {
            let removed = children.remove(&name);
            parent.touch(now);
            removed
        } else {
            None
        }
    }

    /// Drops `doc_id` and every resident document below it.
    fn prune(&mut self, doc_id: &str) {
        let mut pending = vec![doc_id.to_string()];
        while let Some(id) = pending.pop() {
            if let Some(doc) = self.documents.remove(&id) {
                if let Some(children) = doc.children() {
                    pending.extend(children.values().map(|child| child.doc_id.clone()));
                }
            }
            // Residents whose parent entry was never loaded.
            pending.extend(
                self.documents
                    .values()
                    .filter(|doc| doc.parent_id.as_deref() == Some(id.as_str()))
                    .map(|doc| doc.doc_id.clone()),
            );
        }
    }

    /// Scans resident directories for the entry referencing `doc_id`.
    fn find_reference(&self, doc_id: &str) -> Option<(DocId, String)> {
        self.documents.values().find_map(|dir| {
            let (name, _) = dir.children()?.iter().find(|(_, child)| child.doc_id == doc_id)?;
            Some((dir.doc_id.clone(), name.clone()))
        })
    }

    fn text_mut(&mut self, doc_id: &str) -> Option<&mut String> {
        let doc = self.documents.get_mut(doc_id)?;
        if doc.text().is_none() {
            warn!(doc_id, kind = %doc.kind(), "splice on a document without text content");
        }
        doc.text_mut()
    }

    fn touch(&mut self, doc_id: &str, now: u64) {
        if let Some(doc) = self.documents.get_mut(doc_id) {
            doc.touch(now);
        }
    }
}

/// Converts a char position into a byte offset, clamped to the end.
pub(crate) fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
