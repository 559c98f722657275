// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use serde::{Deserialize, Serialize};

use crate::common::{Result, Value};
use crate::expr::{self, Flat, Operand, Term};
use crate::variable::VarId;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

/// A scalar linear objective, always minimized. `maximize(e)` is stored as
/// `minimize(-e)`; `sense` only remembers what the caller asked for.
#[derive(Clone, Debug, PartialEq)]
pub struct Objective {
    expr: Term,
    flat: Flat,
    sense: Sense,
}

impl Objective {
    fn new(expr: Term, sense: Sense) -> Objective {
        let flat = expr.flatten();
        Objective { expr, flat, sense }
    }

    pub fn expr(&self) -> &Term {
        &self.expr
    }

    pub fn flat(&self) -> &Flat {
        &self.flat
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn coefficients(&self) -> Vec<Value> {
        self.flat.coefficients()
    }

    pub fn variable_positions(&self) -> Vec<VarId> {
        self.flat.variable_positions()
    }

    pub fn bias(&self) -> Option<Value> {
        self.flat.bias()
    }

    /// The constant term of the minimized expression.
    pub fn offset(&self) -> Value {
        -self.flat.bias_or_zero()
    }
}

/// Minimize `a`; an indexed operand is summed over its present positions.
pub fn minimize<'a>(a: impl Into<Operand<'a>>) -> Result<Objective> {
    let total = expr::sum(a)?;
    let term = total.get(0).cloned().unwrap_or(Term::Const(Value::ZERO));
    Ok(Objective::new(term, Sense::Minimize))
}

pub fn maximize<'a>(a: impl Into<Operand<'a>>) -> Result<Objective> {
    let total = expr::sum(a)?;
    let term = total.get(0).cloned().unwrap_or(Term::Const(Value::ZERO));
    Ok(Objective::new(term.neg()?, Sense::Maximize))
}
