// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Replication client for a remote document tree.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Submitter  │────►│   Session   │────►│  Transport  │────► server
//! │  Resolver   │◄────│ (correlator)│◄────│   (trait)   │◄────
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │ Tree (core) │────►│ChangeBridge │────► FileChange
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! # Features
//!
//! - One WebSocket channel and one replica per project ([`Registry`])
//! - Snapshot, registration and submission requests matched to responses
//! - Idempotency pre-checks before every mutation
//! - Local effects only after the server accepts a batch
//! - Injectable transport trait for testing

mod bridge;
mod registry;
mod resolve;
mod session;
mod submit;
mod transport;

pub use bridge::{ChangeBridge, ChangeKind, FileChange};
pub use registry::{Registry, TransportFactory, WebSocketFactory};
pub use resolve::{join_path, split_path};
pub use session::{Session, SessionOptions};
pub use submit::{retry_rejected, Precheck};
pub use transport::{Transport, TransportError, TransportFuture, TransportResult, WebSocketTransport};

#[cfg(test)]
pub(crate) mod test_helpers;
