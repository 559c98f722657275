// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Fixed-format MPS export.
//!
//! Output depends only on the lowered matrices, which are themselves a
//! function of declaration order, so exporting the same model twice gives
//! byte-identical text.

use crate::common::Result;
use crate::constraint::Relation;
use crate::lower::{SparseMatrices, lower_sparse};
use crate::model::Model;
use crate::variable::VarKind;

const MARKER_START: &str = "    MARKER                 'MARKER'                 'INTORG'";
const MARKER_END: &str = "    MARKER                 'MARKER'                 'INTEND'";

fn field_line(name: &str, row: &str, value: f64) -> String {
    format!("    {name:<8}  {row:<8}  {value}")
}

pub fn to_mps(model: &Model) -> Result<String> {
    let lowered = lower_sparse(model)?;
    Ok(render(model.name(), &lowered))
}

pub fn render(name: &str, m: &SparseMatrices) -> String {
    let mut lines = vec![format!("NAME          {name}")];

    lines.push("ROWS".to_string());
    for objective in m.objectives.iter() {
        lines.push(format!(" N  {}", objective.label));
    }
    for row in m.rows.iter() {
        let tag = match row.relation {
            Relation::Leq => "L",
            Relation::Eq => "E",
        };
        lines.push(format!(" {tag}  {}", row.label));
    }

    // transpose into per-column entries, objectives first
    let mut entries: Vec<Vec<(&str, f64)>> = vec![Vec::new(); m.columns.len()];
    for objective in m.objectives.iter() {
        let row = &objective.row;
        for (&pos, &coeff) in row.positions.iter().zip(row.coefficients.iter()) {
            entries[pos].push((objective.label.as_str(), coeff));
        }
    }
    for (row, sparse) in m.rows.iter().zip(m.a.iter()) {
        for (&pos, &coeff) in sparse.positions.iter().zip(sparse.coefficients.iter()) {
            entries[pos].push((row.label.as_str(), coeff));
        }
    }

    // a column without coefficients gets a zero entry on the first row so
    // solvers still see it; with no rows at all it is left out
    let anchor = m
        .objectives
        .first()
        .map(|o| o.label.as_str())
        .or_else(|| m.rows.first().map(|r| r.label.as_str()));

    lines.push("COLUMNS".to_string());
    let mut listed = vec![false; m.columns.len()];
    let mut in_marker = false;
    for ((column, column_entries), shown) in m
        .columns
        .iter()
        .zip(entries.iter())
        .zip(listed.iter_mut())
    {
        let nonzero: Vec<(&str, f64)> = column_entries
            .iter()
            .copied()
            .filter(|(_, c)| *c != 0.0)
            .collect();
        let column_lines = match (nonzero.is_empty(), anchor) {
            (false, _) => nonzero,
            (true, Some(row)) => vec![(row, 0.0)],
            (true, None) => continue,
        };
        *shown = true;
        let integer = column.kind != VarKind::Continuous;
        if integer != in_marker {
            lines.push(if integer { MARKER_START } else { MARKER_END }.to_string());
            in_marker = integer;
        }
        for (row, coeff) in column_lines {
            lines.push(field_line(&column.label, row, coeff));
        }
    }
    if in_marker {
        lines.push(MARKER_END.to_string());
    }

    lines.push("RHS".to_string());
    for objective in m.objectives.iter().filter(|o| o.offset != 0.0) {
        lines.push(field_line("RHS", &objective.label, -objective.offset));
    }
    for (row, &rhs) in m.rows.iter().zip(m.b.iter()) {
        if rhs != 0.0 {
            lines.push(field_line("RHS", &row.label, rhs));
        }
    }

    let bounds: Vec<String> = m
        .columns
        .iter()
        .zip(listed.iter())
        .filter(|(_, listed)| **listed)
        .filter_map(|(column, _)| {
            let kind = match (column.kind, column.nonneg) {
                (VarKind::Binary, _) => "BV",
                (_, false) => "FR",
                (VarKind::Integer, true) => "PL",
                (VarKind::Continuous, true) => return None,
            };
            Some(format!(" {kind} BND       {}", column.label))
        })
        .collect();
    if !bounds.is_empty() {
        lines.push("BOUNDS".to_string());
        lines.extend(bounds);
    }

    lines.push("ENDATA".to_string());
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
