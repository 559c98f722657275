// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Lowering a model to coefficient matrices.
//!
//! Columns are the variable elements of every active collection, in
//! declaration order. Rows are the scalar constraints of every active
//! constraint collection, in declaration order, each in the form
//! `a · x (<= | =) b`. Non-negativity constraints become column bounds
//! instead of rows unless `keep_nonneg_rows` is set.

use std::collections::HashMap;

use serde::Serialize;

use crate::common::{Result, Value};
use crate::constraint::Relation;
use crate::decl_err;
use crate::expr::Flat;
use crate::index::Key;
use crate::model::Model;
use crate::objective::Sense;
use crate::variable::{VarId, VarKind};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    /// `V{n}` for continuous and integer columns, `X{n}` for binary ones.
    pub label: String,
    pub name: String,
    pub kind: VarKind,
    pub nonneg: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Row {
    /// `C{n}`, numbered in emission order.
    pub label: String,
    pub name: String,
    pub relation: Relation,
}

/// The touched columns of one row and their coefficients, by ascending
/// column position.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SparseRow {
    pub positions: Vec<usize>,
    pub coefficients: Vec<f64>,
}

impl SparseRow {
    pub fn densify(&self, width: usize) -> Vec<f64> {
        let mut dense = vec![0.0; width];
        for (&pos, &coeff) in self.positions.iter().zip(self.coefficients.iter()) {
            dense[pos] = coeff;
        }
        dense
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObjectiveRow {
    /// `O{n}`, where `n` is the objective's ordinal.
    pub label: String,
    pub name: String,
    pub sense: Sense,
    pub row: SparseRow,
    /// Constant term of the minimized expression.
    pub offset: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SparseMatrices {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub a: Vec<SparseRow>,
    pub b: Vec<f64>,
    pub objectives: Vec<ObjectiveRow>,
}

/// Dense solver-facing form: minimize `c · x` subject to `A x (<= | =) b`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Matrices {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub a: Vec<Vec<f64>>,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
    /// The column positions each row actually touches.
    pub x: Vec<Vec<usize>>,
    pub objective_offset: f64,
}

fn entity_label(model: &Model, name: &str, key: &Key) -> String {
    if key.is_empty() {
        name.to_string()
    } else {
        format!("{name}[{}]", model.registry().key_label(key))
    }
}

fn sparse_row(flat: &Flat, columns: &HashMap<VarId, usize>, big_m: f64) -> Result<SparseRow> {
    let mut totals: HashMap<usize, f64> = HashMap::new();
    for (coeff, id) in flat.terms() {
        let Some(&pos) = columns.get(&id) else {
            return decl_err!(
                UnknownName,
                format!("variable v{} belongs to a replaced collection", id.index())
            );
        };
        *totals.entry(pos).or_default() += coeff.resolve(big_m);
    }
    let mut merged: Vec<(usize, f64)> = totals.into_iter().filter(|(_, c)| *c != 0.0).collect();
    merged.sort_unstable_by_key(|(p, _)| *p);
    Ok(SparseRow {
        positions: merged.iter().map(|(p, _)| *p).collect(),
        coefficients: merged.iter().map(|(_, c)| *c).collect(),
    })
}

pub fn lower_sparse(model: &Model) -> Result<SparseMatrices> {
    let big_m = model.options().big_m;

    let mut columns = Vec::new();
    let mut column_of: HashMap<VarId, usize> = HashMap::new();
    let (mut continuous, mut binary) = (0, 0);
    for entry in model.vars() {
        for id in entry.value().view().vars().iter().flatten() {
            let element = model.element(*id);
            let label = if element.kind() == VarKind::Binary {
                binary += 1;
                format!("X{}", binary - 1)
            } else {
                continuous += 1;
                format!("V{}", continuous - 1)
            };
            column_of.insert(*id, columns.len());
            columns.push(Column {
                label,
                name: entity_label(model, entry.name(), element.key()),
                kind: element.kind(),
                nonneg: element.is_nonneg(),
            });
        }
    }

    let keep_nonneg_rows = model.options().keep_nonneg_rows;
    let (mut rows, mut a, mut b) = (Vec::new(), Vec::new(), Vec::new());
    for entry in model.constraints() {
        for c in entry.value().constraints() {
            if let (Some(id), false) = (c.nonneg_var(), keep_nonneg_rows) {
                if let Some(&pos) = column_of.get(&id) {
                    columns[pos].nonneg = true;
                    continue;
                }
            }
            a.push(sparse_row(c.flat(), &column_of, big_m)?);
            b.push(c.bias().unwrap_or(Value::ZERO).resolve(big_m));
            rows.push(Row {
                label: format!("C{}", rows.len()),
                name: entity_label(model, entry.name(), c.key()),
                relation: c.relation(),
            });
        }
    }

    let objectives = model
        .objectives()
        .map(|entry| {
            let objective = entry.value();
            Ok(ObjectiveRow {
                label: format!("O{}", entry.n()),
                name: entry.name().to_string(),
                sense: objective.sense(),
                row: sparse_row(objective.flat(), &column_of, big_m)?,
                offset: objective.offset().resolve(big_m),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SparseMatrices {
        columns,
        rows,
        a,
        b,
        objectives,
    })
}

impl SparseMatrices {
    /// The objective vector of the first active objective, zeros when
    /// there is none.
    pub fn c(&self) -> Vec<f64> {
        match self.objectives.first() {
            Some(objective) => objective.row.densify(self.columns.len()),
            None => vec![0.0; self.columns.len()],
        }
    }

    pub fn x(&self) -> Vec<Vec<usize>> {
        self.a.iter().map(|row| row.positions.clone()).collect()
    }

    pub fn densify(self) -> Matrices {
        let width = self.columns.len();
        let c = self.c();
        let x = self.x();
        let objective_offset = self.objectives.first().map_or(0.0, |o| o.offset);
        Matrices {
            a: self.a.iter().map(|row| row.densify(width)).collect(),
            columns: self.columns,
            rows: self.rows,
            b: self.b,
            c,
            x,
            objective_offset,
        }
    }
}

pub fn lower(model: &Model) -> Result<Matrices> {
    Ok(lower_sparse(model)?.densify())
}
