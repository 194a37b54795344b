// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! otfs - A replication client for collaboratively edited document trees.
//!
//! This crate keeps a partial, lazily loaded replica of a remote project tree
//! and exposes it as a filesystem. Every mutation is sent to a single
//! sequencing server and applied locally only once the server accepts it.
//!
//! # Main Components
//!
//! - [`RemoteFs`] - filesystem facade: stat, list, read, write, rename, watch
//! - [`sync::Registry`] - at most one live replica per project
//! - [`sync::Session`] - one replica: request correlation, op application, submission
//! - [`Config`] - server URL, timeouts and retry policy
//! - [`Error`] - error types for all operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use otfs::{Config, RemoteFs};
//! use otfs::credentials::FileCredentialStore;
//! use otfs::sync::{Registry, WebSocketFactory};
//!
//! let config = Config::load(&Config::default_path()?)?;
//! let store = FileCredentialStore::new(FileCredentialStore::default_path()?);
//! let registry = Registry::new(config, Arc::new(store), Arc::new(WebSocketFactory));
//! let fs = RemoteFs::new(Arc::new(registry));
//!
//! let bytes = fs.read(project_id, "/src/main.rs").await?;
//! ```

mod cli;
mod commands;

pub mod config;
pub mod credentials;
pub mod error;
pub mod fs;
pub mod id;
pub mod sync;

pub use cli::{Cli, Command, OutputArgs, OutputFormat, RemotePath};
pub use config::Config;
pub use error::{Error, FsErrorKind, Result};
pub use fs::{FileStat, FileType, RemoteFs, WatchGuard, WriteOptions};

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = commands::config_path(cli.config.as_deref())?;
    match cli.command {
        Command::Login { token, server } => {
            commands::auth::login(&config_path, &token, server.as_deref())
        }
        Command::Logout => commands::auth::logout(),
        Command::Ls { path, output } => commands::files::ls(&config_path, &path, output.output).await,
        Command::Stat { path, output } => {
            commands::files::stat(&config_path, &path, output.output).await
        }
        Command::Cat { path } => commands::files::cat(&config_path, &path).await,
        Command::Mkdir { path } => commands::files::mkdir(&config_path, &path).await,
        Command::Write {
            path,
            from,
            create,
            overwrite,
        } => commands::files::write(&config_path, &path, from, create, overwrite).await,
        Command::Rm { path } => commands::files::rm(&config_path, &path).await,
        Command::Mv { from, to } => commands::files::mv(&config_path, &from, &to).await,
        Command::Watch { paths, output } => {
            commands::watch::run(&config_path, &paths, output.output).await
        }
    }
}
