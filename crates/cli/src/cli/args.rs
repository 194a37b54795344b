// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared argument types for CLI commands.

use std::fmt;
use std::str::FromStr;

use clap::{Args, ValueEnum};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Shared `--output` flag.
#[derive(Args, Clone, Debug, Default)]
pub struct OutputArgs {
    /// Output format (text, json)
    #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// A location written as `<project-id>:/path`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemotePath {
    pub project_id: String,
    pub path: String,
}

impl FromStr for RemotePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((project, path)) = s.split_once(':') else {
            return Err("expected <project-id>:/path".to_string());
        };
        if project.trim().is_empty() {
            return Err("missing project id".to_string());
        }
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Ok(RemotePath {
            project_id: project.to_string(),
            path,
        })
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.path)
    }
}
