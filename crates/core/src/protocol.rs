// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages for client-server communication.
//!
//! The protocol is simple:
//! - Client requests a snapshot, registers documents, and submits batches
//! - Server answers those requests and broadcasts batches accepted from others
//!
//! Every message is a JSON object tagged by `type`. Message types this client
//! does not know are decoded as [`ServerMessage::Unknown`] and ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::{ChildRef, DocId, DocKind, Document};
use crate::error::{Error, Result};
use crate::op::{BatchId, OpBatch};
use crate::tree::{ROOT_NAME, SUPER_ROOT_ID};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Request the current version and root of the tree.
    #[serde(rename_all = "camelCase")]
    GetSnapshot {
        /// Client-chosen identifier for this session.
        client_id: String,
    },

    /// Request the full payload of a document.
    #[serde(rename_all = "camelCase")]
    RegisterDocument { doc_id: DocId },

    /// Submit a batch for sequencing.
    SubmitBatch { batch: OpBatch },

    /// Out-of-band announcement to other collaborators.
    Broadcast { payload: serde_json::Value },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Response to GetSnapshot.
    Snapshot {
        version: u64,
        /// Top-level entries; the project directory is `root` / `.`.
        documents: BTreeMap<String, SnapshotEntry>,
    },

    /// Response to RegisterDocument.
    Document { document: Document },

    /// The submitted batch with this id was sequenced.
    BatchAccepted { id: BatchId },

    /// The submitted batch with this id was refused.
    BatchRejected { id: BatchId },

    /// A batch accepted from another collaborator.
    RemoteBatch { batch: OpBatch },

    /// Any message type this client does not understand.
    #[serde(other)]
    Unknown,
}

/// A top-level entry in a snapshot. Only `children` is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotEntry {
    #[serde(default)]
    pub children: BTreeMap<String, ChildRef>,
}

impl ClientMessage {
    /// Creates a GetSnapshot message.
    pub fn get_snapshot(client_id: impl Into<String>) -> Self {
        ClientMessage::GetSnapshot { client_id: client_id.into() }
    }

    /// Creates a RegisterDocument message.
    pub fn register_document(doc_id: impl Into<DocId>) -> Self {
        ClientMessage::RegisterDocument { doc_id: doc_id.into() }
    }

    /// Creates a SubmitBatch message.
    pub fn submit_batch(batch: OpBatch) -> Self {
        ClientMessage::SubmitBatch { batch }
    }

    /// Creates a Broadcast message.
    pub fn broadcast(payload: serde_json::Value) -> Self {
        ClientMessage::Broadcast { payload }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates a Snapshot message for a tree rooted at `root_id`.
    pub fn snapshot(version: u64, root_id: impl Into<DocId>) -> Self {
        let mut super_root = SnapshotEntry::default();
        super_root
            .children
            .insert(ROOT_NAME.to_string(), ChildRef::new(root_id, DocKind::Directory));
        let mut documents = BTreeMap::new();
        documents.insert(SUPER_ROOT_ID.to_string(), super_root);
        ServerMessage::Snapshot { version, documents }
    }

    /// Creates a Document message.
    pub fn document(document: Document) -> Self {
        ServerMessage::Document { document }
    }

    /// Creates a BatchAccepted message.
    pub fn batch_accepted(id: impl Into<BatchId>) -> Self {
        ServerMessage::BatchAccepted { id: id.into() }
    }

    /// Creates a BatchRejected message.
    pub fn batch_rejected(id: impl Into<BatchId>) -> Self {
        ServerMessage::BatchRejected { id: id.into() }
    }

    /// Creates a RemoteBatch message.
    pub fn remote_batch(batch: OpBatch) -> Self {
        ServerMessage::RemoteBatch { batch }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Extracts the project directory id from a snapshot's top-level entries.
pub fn snapshot_root_id(documents: &BTreeMap<String, SnapshotEntry>) -> Result<DocId> {
    documents
        .get(SUPER_ROOT_ID)
        .and_then(|entry| entry.children.get(ROOT_NAME))
        .map(|child| child.doc_id.clone())
        .ok_or_else(|| Error::MalformedSnapshot(format!("missing {SUPER_ROOT_ID}/{ROOT_NAME} entry")))
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
