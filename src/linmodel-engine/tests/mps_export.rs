// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Tests for MPS export of complete models.
//!
//! These tests verify that:
//! 1. The text for a small LP matches a hand-written MPS file
//! 2. Exporting is deterministic, in memory and through a file on disk

use std::fs;

use linmodel_engine::test_common::{transport_model, two_variable_lp};
use linmodel_engine::to_mps;

#[test]
fn two_variable_lp_text() {
    let text = to_mps(&two_variable_lp()).unwrap();
    let expected = "\
NAME          two_variable_lp
ROWS
 N  O0
 L  C0
 L  C1
COLUMNS
    V0        O0        -40
    V0        C0        1
    V0        C1        2
    V1        O0        -30
    V1        C0        1
    V1        C1        1
RHS
    RHS       C0        12
    RHS       C1        16
ENDATA
";
    assert_eq!(text, expected);
}

#[test]
fn export_is_deterministic() {
    let first = to_mps(&transport_model(5, 7)).unwrap();
    let second = to_mps(&transport_model(5, 7)).unwrap();
    assert_eq!(first, second);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transport.mps");
    fs::write(&path, &first).unwrap();
    let read_back = fs::read_to_string(&path).unwrap();
    assert_eq!(read_back, second);

    let rows = read_back
        .lines()
        .filter(|l| l.starts_with(" L  ") || l.starts_with(" E  "))
        .count();
    assert_eq!(rows, 5 + 7);
    assert!(read_back.ends_with("ENDATA\n"));
}
