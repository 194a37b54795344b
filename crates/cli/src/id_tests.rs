// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use std::collections::HashSet;
use yare::parameterized;

#[test]
fn test_generate_id_shape() {
    let id = generate_id();
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_generate_id_unique() {
    let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
    assert_eq!(ids.len(), 1000);
}

#[parameterized(
    lowercase = { "3f2b8c1e-7d4a-4e5f-9a0b-1c2d3e4f5a6b", true },
    uppercase = { "3F2B8C1E-7D4A-4E5F-9A0B-1C2D3E4F5A6B", false },
    missing_group = { "3f2b8c1e-7d4a-4e5f-1c2d3e4f5a6b", false },
    not_hex = { "zf2b8c1e-7d4a-4e5f-9a0b-1c2d3e4f5a6b", false },
    trailing = { "3f2b8c1e-7d4a-4e5f-9a0b-1c2d3e4f5a6b/x", false },
    empty = { "", false },
)]
fn test_is_project_id(id: &str, expected: bool) {
    assert_eq!(is_project_id(id), expected);
}
