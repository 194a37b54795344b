// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

pub const PROJECT: &str = "3f2b8c1e-7d4a-4e5f-9a0b-1c2d3e4f5a6b";

/// The binary with its config and token confined to `home`.
pub fn otfs(home: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("otfs");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env_remove("RUST_LOG");
    cmd
}

/// Helper to create a home directory with a stored token.
pub fn logged_in() -> TempDir {
    let home = TempDir::new().unwrap();
    otfs(&home)
        .args(["login", "--token", "secret"])
        .assert()
        .success();
    home
}
