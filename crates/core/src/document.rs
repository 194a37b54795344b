// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Documents in the replicated tree.
//!
//! A document is a directory, a text file, or a binary file. On the wire all
//! three share one flat JSON shape tagged by `docType`; a `file` carrying
//! `base64Content` is binary, any other `file` is text.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Opaque document identifier, unique for the document's whole lifetime.
pub type DocId = String;

/// Coarse document kind as carried by child references and `Add` ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    Directory,
    File,
}

impl DocKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocKind::Directory => "directory",
            DocKind::File => "file",
        }
    }
}

impl fmt::Display for DocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lightweight reference stored in a directory's `children` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    #[serde(rename = "docId")]
    pub doc_id: DocId,
    #[serde(rename = "docType")]
    pub kind: DocKind,
}

impl ChildRef {
    pub fn new(doc_id: impl Into<DocId>, kind: DocKind) -> Self {
        ChildRef { doc_id: doc_id.into(), kind }
    }
}

/// Variant-specific document payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocBody {
    /// Directory entries keyed by name.
    Directory { children: BTreeMap<String, ChildRef> },
    /// Spliceable text content.
    Text { content: String },
    /// Opaque base64-encoded bytes; only ever replaced wholesale.
    Binary { base64_content: String },
}

/// A document in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireDocument", into = "WireDocument")]
pub struct Document {
    pub doc_id: DocId,
    /// Single path segment, unique among siblings.
    pub name: String,
    /// Containing directory; `None` only for the super-root.
    pub parent_id: Option<DocId>,
    /// Milliseconds since Unix epoch.
    pub create_time: u64,
    /// Milliseconds since Unix epoch, never decreasing.
    pub modify_time: u64,
    pub body: DocBody,
}

impl Document {
    /// Creates an empty directory.
    pub fn directory(doc_id: impl Into<DocId>, name: impl Into<String>, parent_id: Option<DocId>, now: u64) -> Self {
        Self::with_body(doc_id, name, parent_id, now, DocBody::Directory { children: BTreeMap::new() })
    }

    /// Creates a text file with the given content.
    pub fn text_file(
        doc_id: impl Into<DocId>,
        name: impl Into<String>,
        parent_id: Option<DocId>,
        now: u64,
        content: impl Into<String>,
    ) -> Self {
        Self::with_body(doc_id, name, parent_id, now, DocBody::Text { content: content.into() })
    }

    /// Creates a binary file from raw bytes.
    pub fn binary_file(
        doc_id: impl Into<DocId>,
        name: impl Into<String>,
        parent_id: Option<DocId>,
        now: u64,
        bytes: &[u8],
    ) -> Self {
        let base64_content = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::with_body(doc_id, name, parent_id, now, DocBody::Binary { base64_content })
    }

    fn with_body(
        doc_id: impl Into<DocId>,
        name: impl Into<String>,
        parent_id: Option<DocId>,
        now: u64,
        body: DocBody,
    ) -> Self {
        Document {
            doc_id: doc_id.into(),
            name: name.into(),
            parent_id,
            create_time: now,
            modify_time: now,
            body,
        }
    }

    /// Returns the coarse kind used in child references.
    pub fn kind(&self) -> DocKind {
        match self.body {
            DocBody::Directory { .. } => DocKind::Directory,
            DocBody::Text { .. } | DocBody::Binary { .. } => DocKind::File,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.body, DocBody::Directory { .. })
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.body, DocBody::Binary { .. })
    }

    /// Returns a reference suitable for the parent's `children` map.
    pub fn child_ref(&self) -> ChildRef {
        ChildRef::new(self.doc_id.clone(), self.kind())
    }

    /// Returns the directory entries, or `None` for files.
    pub fn children(&self) -> Option<&BTreeMap<String, ChildRef>> {
        match &self.body {
            DocBody::Directory { children } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut BTreeMap<String, ChildRef>> {
        match &mut self.body {
            DocBody::Directory { children } => Some(children),
            _ => None,
        }
    }

    /// Returns the text content, or `None` for directories and binary files.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            DocBody::Text { content } => Some(content),
            _ => None,
        }
    }

    pub(crate) fn text_mut(&mut self) -> Option<&mut String> {
        match &mut self.body {
            DocBody::Text { content } => Some(content),
            _ => None,
        }
    }

    /// Returns the file contents as bytes. Directories have no bytes.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        match &self.body {
            DocBody::Directory { .. } => Ok(Vec::new()),
            DocBody::Text { content } => Ok(content.as_bytes().to_vec()),
            DocBody::Binary { base64_content } => {
                Ok(base64::engine::general_purpose::STANDARD.decode(base64_content)?)
            }
        }
    }

    /// Returns the file size in bytes (0 for directories).
    pub fn size(&self) -> Result<u64> {
        match &self.body {
            DocBody::Text { content } => Ok(content.len() as u64),
            _ => Ok(self.bytes()?.len() as u64),
        }
    }

    /// Bumps `modify_time` without ever moving it backwards.
    pub(crate) fn touch(&mut self, now: u64) {
        self.modify_time = self.modify_time.max(now);
    }
}

/// Flat wire representation shared by all document variants.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument {
    doc_id: DocId,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<DocId>,
    #[serde(default)]
    create_time: u64,
    #[serde(default)]
    modify_time: u64,
    doc_type: DocKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children: Option<BTreeMap<String, ChildRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base64_content: Option<String>,
}

impl From<WireDocument> for Document {
    fn from(wire: WireDocument) -> Self {
        let body = match (wire.doc_type, wire.base64_content) {
            (DocKind::Directory, _) => DocBody::Directory { children: wire.children.unwrap_or_default() },
            (DocKind::File, Some(base64_content)) => DocBody::Binary { base64_content },
            (DocKind::File, None) => DocBody::Text { content: wire.content.unwrap_or_default() },
        };
        Document {
            doc_id: wire.doc_id,
            name: wire.name,
            parent_id: wire.parent_id,
            create_time: wire.create_time,
            modify_time: wire.modify_time,
            body,
        }
    }
}

impl From<Document> for WireDocument {
    fn from(doc: Document) -> Self {
        let doc_type = doc.kind();
        let (children, content, base64_content) = match doc.body {
            DocBody::Directory { children } => (Some(children), None, None),
            DocBody::Text { content } => (None, Some(content), None),
            DocBody::Binary { base64_content } => (None, None, Some(base64_content)),
        };
        WireDocument {
            doc_id: doc.doc_id,
            name: doc.name,
            parent_id: doc.parent_id,
            create_time: doc.create_time,
            modify_time: doc.modify_time,
            doc_type,
            children,
            content,
            base64_content,
        }
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
