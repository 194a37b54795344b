// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

static PROJECT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    }
});

/// Generate a document or batch id: 128 random bits as 32 lowercase hex chars.
pub fn generate_id() -> String {
    let bits: u128 = rand::thread_rng().gen();
    format!("{:032x}", bits)
}

/// Validate that a project id is a lowercase UUID.
pub fn is_project_id(id: &str) -> bool {
    PROJECT_ID_RE.is_match(id)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
