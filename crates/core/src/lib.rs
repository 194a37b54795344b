// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! otfs-core: Shared library for the otfs document tree replica
//!
//! This crate provides the document model, the operations that mutate it, the
//! deterministic op applier, and the wire protocol spoken between replicas and
//! the sequencing server.

pub mod clock;
pub mod document;
pub mod error;
pub mod op;
pub mod protocol;
pub mod tree;
pub mod validate;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use document::{ChildRef, DocBody, DocId, DocKind, Document};
pub use error::{Error, Result};
pub use op::{BatchId, Op, OpBatch};
pub use tree::{OpObserver, Tree};
