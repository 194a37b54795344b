// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Path Resolver: slash-separated paths to documents.

use otfs_core::Document;

use super::session::Session;
use crate::error::{Error, Result};

/// Splits `/a/b/` into `["a", "b"]`. Empty segments are dropped.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins names into an absolute path; no names is `/`.
pub fn join_path<S: AsRef<str>>(names: &[S]) -> String {
    let mut path = String::new();
    for name in names {
        path.push('/');
        path.push_str(name.as_ref());
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

impl Session {
    /// Loads a document by id, registering it with the server if needed.
    pub async fn require_document(&self, doc_id: &str) -> Result<Document> {
        self.register(doc_id).await
    }

    /// Walks `segments` from the project root.
    pub async fn resolve<S: AsRef<str>>(&self, segments: &[S]) -> Result<Document> {
        self.snapshot().await?;
        let root_id = self
            .root_id()
            .ok_or_else(|| Error::Protocol("snapshot carried no root".to_string()))?;
        let mut doc = self.require_document(&root_id).await?;

        for (depth, segment) in segments.iter().enumerate() {
            let here = || join_path(&segments[..=depth]);
            let Some(children) = doc.children() else {
                return Err(Error::NotADirectory(join_path(&segments[..depth])));
            };
            let Some(child) = children.get(segment.as_ref()) else {
                return Err(Error::NotFound(here()));
            };
            let child_id = child.doc_id.clone();
            doc = self.require_document(&child_id).await.map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(here()),
                other => other,
            })?;
        }
        Ok(doc)
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
