// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! otfs-remote: reference sequencing server for otfs project trees.
//!
//! This server holds the canonical tree of one project in memory, validates
//! submitted batches against it, and fans accepted batches out to every
//! connected replica in the order they were sequenced.

mod server;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use state::BoxError;

/// otfs-remote: Reference sequencing server
#[derive(Parser, Debug)]
#[command(name = "otfs-remote")]
#[command(about = "WebSocket sequencing server for otfs project trees")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Document id of the project directory
    #[arg(long, default_value = "project-root")]
    root_id: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting otfs-remote server");
    info!("  Bind address: {}", args.bind);
    info!("  Project root: {}", args.root_id);

    let state = state::ServerState::new(&args.root_id);
    server::run(args.bind, state).await
}
