// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod args;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use args::{OutputArgs, OutputFormat, RemotePath};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

#[derive(Parser)]
#[command(name = "otfs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Work with collaboratively edited project trees from the shell")]
#[command(
    long_about = "Work with collaboratively edited project trees from the shell.\n\n\
    Every path is written as <project-id>:/path. Changes are sequenced by the server and\n\
    become visible to every other collaborator of the project."
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store the access token used to connect
    Login {
        /// Bearer token issued by the server
        #[arg(long, value_parser = non_empty_string)]
        token: String,

        /// Also save this server URL to the config file
        #[arg(long, value_name = "URL")]
        server: Option<String>,
    },

    /// Forget the stored access token
    Logout,

    /// List a directory
    Ls {
        /// Directory, as <project-id>:/path
        path: RemotePath,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show type, size and times of an entry
    Stat {
        /// Entry, as <project-id>:/path
        path: RemotePath,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print a file to stdout
    Cat {
        /// File, as <project-id>:/path
        path: RemotePath,
    },

    /// Create a directory
    Mkdir {
        /// Directory to create, as <project-id>:/path
        path: RemotePath,
    },

    /// Write stdin (or a local file) to a remote file
    #[command(after_help = "\
Examples:
  otfs write <project>:/notes.md < notes.md            Create or replace
  otfs write <project>:/notes.md --from notes.md --create
                                                       Fail if it already exists
  echo hi | otfs write <project>:/a.txt --overwrite    Fail if it does not exist")]
    Write {
        /// Target file, as <project-id>:/path
        path: RemotePath,

        /// Read content from this local file instead of stdin
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,

        /// Only create; fail if the file exists
        #[arg(long, conflicts_with = "overwrite")]
        create: bool,

        /// Only replace; fail if the file does not exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a file or directory (directories recursively)
    Rm {
        /// Entry, as <project-id>:/path
        path: RemotePath,
    },

    /// Move or rename an entry within a project
    Mv {
        /// Source, as <project-id>:/path
        from: RemotePath,

        /// Destination, as <project-id>:/path
        to: RemotePath,
    },

    /// Print change events until interrupted
    Watch {
        /// Paths to keep loaded, as <project-id>:/path
        #[arg(required = true)]
        paths: Vec<RemotePath>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
