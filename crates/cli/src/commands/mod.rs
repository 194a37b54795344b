// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod auth;
pub mod files;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::credentials::FileCredentialStore;
use crate::error::Result;
use crate::fs::RemoteFs;
use crate::sync::{Registry, WebSocketFactory};

/// The config file to use: `explicit` if given, else the per-user default.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::default_path(),
    }
}

/// The token store shared by every command.
pub fn credential_store() -> Result<FileCredentialStore> {
    Ok(FileCredentialStore::new(FileCredentialStore::default_path()?))
}

/// Helper to open the filesystem facade from the current context.
pub fn open_fs(config_path: &Path) -> Result<RemoteFs> {
    let config = Config::load(config_path)?;
    let registry = Registry::new(
        config,
        Arc::new(credential_store()?),
        Arc::new(WebSocketFactory),
    );
    Ok(RemoteFs::new(Arc::new(registry)))
}
