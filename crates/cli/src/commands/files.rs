// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! File and directory commands: ls, stat, cat, mkdir, write, rm, mv.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::{OutputFormat, RemotePath};
use crate::error::Result;
use crate::fs::{FileStat, FileType, RemoteFs, WriteOptions};

use super::open_fs;

#[derive(Serialize)]
struct Entry {
    name: String,
    #[serde(rename = "type")]
    file_type: FileType,
}

fn format_time(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

pub async fn ls(config_path: &Path, path: &RemotePath, format: OutputFormat) -> Result<()> {
    let fs = open_fs(config_path)?;
    ls_impl(&fs, path, format, &mut std::io::stdout()).await
}

/// Internal implementation that accepts the facade for testing.
pub(crate) async fn ls_impl(
    fs: &RemoteFs,
    path: &RemotePath,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let entries = fs.list(&path.project_id, &path.path).await?;
    match format {
        OutputFormat::Text => {
            for (name, file_type) in entries {
                match file_type {
                    FileType::Directory => writeln!(out, "{}/", name)?,
                    FileType::File => writeln!(out, "{}", name)?,
                }
            }
        }
        OutputFormat::Json => {
            let entries: Vec<Entry> = entries
                .into_iter()
                .map(|(name, file_type)| Entry { name, file_type })
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
        }
    }
    Ok(())
}

pub async fn stat(config_path: &Path, path: &RemotePath, format: OutputFormat) -> Result<()> {
    let fs = open_fs(config_path)?;
    stat_impl(&fs, path, format, &mut std::io::stdout()).await
}

pub(crate) async fn stat_impl(
    fs: &RemoteFs,
    path: &RemotePath,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let stat = fs.stat(&path.project_id, &path.path).await?;
    match format {
        OutputFormat::Text => write_stat(&stat, path, out)?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&stat)?)?,
    }
    Ok(())
}

fn write_stat(stat: &FileStat, path: &RemotePath, out: &mut impl Write) -> Result<()> {
    let kind = match stat.file_type {
        FileType::Directory => "directory",
        FileType::File => "file",
    };
    writeln!(out, "Path: {}", path)?;
    writeln!(out, "Type: {}", kind)?;
    writeln!(out, "Size: {}", stat.size)?;
    writeln!(out, "Created: {}", format_time(stat.ctime))?;
    writeln!(out, "Modified: {}", format_time(stat.mtime))?;
    Ok(())
}

pub async fn cat(config_path: &Path, path: &RemotePath) -> Result<()> {
    let fs = open_fs(config_path)?;
    cat_impl(&fs, path, &mut std::io::stdout()).await
}

pub(crate) async fn cat_impl(fs: &RemoteFs, path: &RemotePath, out: &mut impl Write) -> Result<()> {
    let content = fs.read(&path.project_id, &path.path).await?;
    out.write_all(&content)?;
    out.flush()?;
    Ok(())
}

pub async fn mkdir(config_path: &Path, path: &RemotePath) -> Result<()> {
    let fs = open_fs(config_path)?;
    fs.mkdir(&path.project_id, &path.path).await
}

/// Picks the write flags: with neither `--create` nor `--overwrite`, both apply.
pub(crate) fn write_options(create: bool, overwrite: bool) -> WriteOptions {
    if !create && !overwrite {
        return WriteOptions {
            create: true,
            overwrite: true,
        };
    }
    WriteOptions { create, overwrite }
}

pub async fn write(
    config_path: &Path,
    path: &RemotePath,
    from: Option<PathBuf>,
    create: bool,
    overwrite: bool,
) -> Result<()> {
    let content = match from {
        Some(file) => std::fs::read(file)?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    let fs = open_fs(config_path)?;
    write_impl(&fs, path, &content, write_options(create, overwrite)).await
}

pub(crate) async fn write_impl(
    fs: &RemoteFs,
    path: &RemotePath,
    content: &[u8],
    options: WriteOptions,
) -> Result<()> {
    fs.write(&path.project_id, &path.path, content, options).await
}

pub async fn rm(config_path: &Path, path: &RemotePath) -> Result<()> {
    let fs = open_fs(config_path)?;
    fs.delete(&path.project_id, &path.path).await
}

pub async fn mv(config_path: &Path, from: &RemotePath, to: &RemotePath) -> Result<()> {
    let fs = open_fs(config_path)?;
    mv_impl(&fs, from, to).await
}

pub(crate) async fn mv_impl(fs: &RemoteFs, from: &RemotePath, to: &RemotePath) -> Result<()> {
    fs.rename(&from.project_id, &from.path, &to.project_id, &to.path)
        .await
}

#[cfg(test)]
#[path = "files_tests.rs"]
mod tests;
