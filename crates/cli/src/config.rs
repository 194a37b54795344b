// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Stored in `$XDG_CONFIG_HOME/otfs/config.toml`; every key is optional:
//! - `server_url`: base WebSocket URL of the sequencing server
//! - `connect_timeout_secs`: limit on opening a channel
//! - `request_timeout_ms`: limit on each snapshot/register/submit wait
//! - `submit_retries`: how often a rejected mutation is re-attempted

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

const CONFIG_DIR_NAME: &str = "otfs";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Client configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL; channels open at `{server_url}/{project}/ot`.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Max time to wait for a channel to open in seconds (default: 5).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Max time to wait for any single response in milliseconds.
    /// Absent means wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    /// Extra attempts after a batch is rejected (default: 0).
    #[serde(default)]
    pub submit_retries: u32,
}

fn default_server_url() -> String {
    "ws://localhost:7890".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: default_server_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_ms: None,
            submit_retries: 0,
        }
    }
}

impl Config {
    /// The per-user config file location.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| Error::Config("cannot determine config directory".to_string()))
    }

    /// Loads configuration from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        if let Some(problem) = config.validate_url() {
            return Err(Error::Config(problem));
        }
        Ok(config)
    }

    /// Saves configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns an error message if `server_url` is not a WebSocket URL.
    pub fn validate_url(&self) -> Option<String> {
        let url = &self.server_url;
        if url.starts_with("ws://") || url.starts_with("wss://") {
            return None;
        }
        Some(format!("invalid server URL '{}': must be ws:// or wss://", url))
    }

    /// The channel URL for one project.
    pub fn channel_url(&self, project_id: &str, token: &str) -> String {
        format!(
            "{}/{}/ot?authorization={}",
            self.server_url.trim_end_matches('/'),
            project_id,
            token
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
