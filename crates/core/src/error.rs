// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for otfs-core operations.

use thiserror::Error;

use crate::document::DocId;

/// All possible errors that can occur in otfs-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("document not found: {0}")]
    NotFound(DocId),

    #[error("not a directory: {0}")]
    NotADirectory(DocId),

    #[error("not a file: {0}")]
    NotAFile(DocId),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("ancestry of {0} is not loaded\n  hint: register its parent directories first")]
    AncestryIncomplete(DocId),

    #[error("invalid batch {batch_id}: {reason}")]
    InvalidBatch { batch_id: String, reason: String },

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for otfs-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
