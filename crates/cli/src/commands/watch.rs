// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Streams change events for watched projects.

use std::collections::HashSet;
use std::future::Future;
use std::io::Write;
use std::path::Path;

use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::cli::{OutputFormat, RemotePath};
use crate::error::Result;
use crate::fs::RemoteFs;
use crate::sync::FileChange;

use super::open_fs;

pub async fn run(config_path: &Path, paths: &[RemotePath], format: OutputFormat) -> Result<()> {
    let fs = open_fs(config_path)?;
    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    run_impl(&fs, paths, format, &mut std::io::stdout(), interrupted).await
}

/// Prints changes to projects named in `paths` until `shutdown` resolves.
pub(crate) async fn run_impl(
    fs: &RemoteFs,
    paths: &[RemotePath],
    format: OutputFormat,
    out: &mut impl Write,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut changes = fs.subscribe();
    let mut guards = Vec::with_capacity(paths.len());
    for path in paths {
        guards.push(fs.watch(&path.project_id, &path.path)?);
    }
    let projects: HashSet<&str> = paths.iter().map(|p| p.project_id.as_str()).collect();

    tokio::pin!(shutdown);
    loop {
        // Pending changes are printed before shutdown is honoured.
        tokio::select! {
            biased;
            change = changes.recv() => match change {
                Ok(change) if projects.contains(change.project_id.as_str()) => {
                    print_change(&change, format, out)?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("dropped {} change events", n),
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => break,
        }
    }
    drop(guards);
    Ok(())
}

fn print_change(change: &FileChange, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let kind = change.kind.to_string();
            writeln!(out, "{:<8} {}:{}", kind, change.project_id, change.path)?;
        }
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(change)?)?,
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
