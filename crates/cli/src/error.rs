// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use thiserror::Error;

use crate::sync::TransportError;

/// All possible errors that can occur in the otfs library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("batch {0} rejected by server\n  hint: the tree changed concurrently, retry the operation")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    NotAFile(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("not signed in\n  hint: run 'otfs login --token <token>' first")]
    NotAuthenticated,

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Core(otfs_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Filesystem-shaped classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    FileNotFound,
    FileExists,
    FileNotADirectory,
    FileIsADirectory,
    Unavailable,
    Other,
}

impl Error {
    /// Maps this error onto the standard filesystem error families.
    pub fn kind(&self) -> FsErrorKind {
        match self {
            Error::NotFound(_) => FsErrorKind::FileNotFound,
            Error::AlreadyExists(_) => FsErrorKind::FileExists,
            Error::NotADirectory(_) => FsErrorKind::FileNotADirectory,
            Error::NotAFile(_) => FsErrorKind::FileIsADirectory,
            Error::ConnectionClosed(_)
            | Error::Timeout(_)
            | Error::Transport(_)
            | Error::NotAuthenticated => FsErrorKind::Unavailable,
            _ => FsErrorKind::Other,
        }
    }
}

impl From<otfs_core::Error> for Error {
    fn from(err: otfs_core::Error) -> Self {
        match err {
            otfs_core::Error::NotFound(id) => Error::NotFound(id),
            otfs_core::Error::NotADirectory(id) => Error::NotADirectory(id),
            otfs_core::Error::NotAFile(id) => Error::NotAFile(id),
            otfs_core::Error::AlreadyExists(name) => Error::AlreadyExists(name),
            other => Error::Core(other),
        }
    }
}

/// A specialized Result type for otfs operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
