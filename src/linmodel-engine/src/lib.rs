// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod common;
pub mod constraint;
pub mod entity;
pub mod expr;
pub mod handoff;
pub mod index;
pub mod json;
pub mod lower;
pub mod model;
pub mod mps;
pub mod objective;
pub mod param;
pub mod variable;

#[cfg(any(test, feature = "testing"))]
pub mod test_common;

#[cfg(test)]
mod algebra_proptest;

pub use self::common::{Error, ErrorCode, ErrorKind, Ident, Result, Value, canonicalize};
pub use self::constraint::{Constraint, ConstraintSet, Relation, eq, geq, leq};
pub use self::expr::{ExprSet, Operand, Term};
pub use self::index::{SetDecl, SetId};
pub use self::lower::{Matrices, SparseMatrices, lower, lower_sparse};
pub use self::model::{Model, ModelOptions, Selector};
pub use self::mps::to_mps;
pub use self::objective::{Objective, Sense, maximize, minimize};
pub use self::param::Param;
pub use self::variable::{VarKind, VarView};
