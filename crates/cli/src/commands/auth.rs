// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Token management commands.

use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};

use super::credential_store;

pub fn login(config_path: &Path, token: &str, server: Option<&str>) -> Result<()> {
    let store = credential_store()?;
    login_impl(&store, config_path, token, server, &mut std::io::stdout())
}

/// Internal implementation that accepts the store for testing.
pub(crate) fn login_impl(
    store: &dyn CredentialStore,
    config_path: &Path,
    token: &str,
    server: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if let Some(server) = server {
        config.server_url = server.to_string();
        if let Some(problem) = config.validate_url() {
            return Err(Error::Config(problem));
        }
        config.save(config_path)?;
    }
    store.set(token.trim())?;
    writeln!(out, "Logged in to {}", config.server_url)?;
    Ok(())
}

pub fn logout() -> Result<()> {
    let store = credential_store()?;
    logout_impl(&store, &mut std::io::stdout())
}

pub(crate) fn logout_impl(store: &dyn CredentialStore, out: &mut impl Write) -> Result<()> {
    if store.get()?.is_none() {
        writeln!(out, "Not logged in")?;
        return Ok(());
    }
    store.delete()?;
    writeln!(out, "Logged out")?;
    Ok(())
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
