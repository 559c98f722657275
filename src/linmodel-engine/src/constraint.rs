// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Relational facts over expressions.
//!
//! Every constraint is stored in the orientation `expr <= 0` or
//! `expr = 0`, where `expr` is the canonical form of `lhs - rhs` (and of
//! `rhs - lhs` for `>=`). A [`ConstraintSet`] built over an indexed
//! expression is expanded eagerly into one scalar [`Constraint`] per
//! present position.

use serde::{Deserialize, Serialize};

use crate::common::{Result, Value};
use crate::entity::Indexed;
use crate::expr::{self, Connective, ExprSet, Flat, Operand, Term};
use crate::index::Key;
use crate::variable::VarId;
use crate::{op_err, rel_err};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Leq,
    Eq,
}

/// `-1 * v <= 0` is how a non-negativity bound on `v` looks in canonical
/// form.
fn nonneg_target(expr: &Term, relation: Relation) -> Option<VarId> {
    if relation != Relation::Leq {
        return None;
    }
    let node = expr.as_expression()?;
    match (node.op(), node.one().value(), node.two()) {
        (Connective::Mul, Some(Value::Num(c)), Term::Var(id)) if c == -1.0 => Some(*id),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    expr: Term,
    flat: Flat,
    relation: Relation,
    nonneg: Option<VarId>,
    key: Key,
    position: usize,
}

impl Constraint {
    pub fn new(expr: Term, relation: Relation, key: Key, position: usize) -> Constraint {
        let flat = expr.flatten();
        let nonneg = nonneg_target(&expr, relation);
        Constraint {
            expr,
            flat,
            relation,
            nonneg,
            key,
            position,
        }
    }

    pub fn expr(&self) -> &Term {
        &self.expr
    }

    pub fn flat(&self) -> &Flat {
        &self.flat
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn is_nonneg(&self) -> bool {
        self.nonneg.is_some()
    }

    /// The variable bounded below by zero, for a non-negativity constraint.
    pub fn nonneg_var(&self) -> Option<VarId> {
        self.nonneg
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Position within the collection this constraint was expanded from.
    pub fn position(&self) -> usize {
        self.position
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
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintSet {
    relation: Relation,
    lhs: ExprSet,
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new(lhs: ExprSet, relation: Relation) -> ConstraintSet {
        let constraints = lhs
            .present()
            .map(|(pos, key, term)| Constraint::new(term.clone(), relation, key.clone(), pos))
            .collect();
        ConstraintSet {
            relation,
            lhs,
            constraints,
        }
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// The canonical left-hand side at every position, absent ones
    /// included.
    pub fn lhs(&self) -> &ExprSet {
        &self.lhs
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Elementwise sum of two constraint collections of the same family.
    pub fn add(&self, rhs: &ConstraintSet) -> Result<ConstraintSet> {
        if self.relation != rhs.relation {
            return rel_err!(format!(
                "cannot add {:?} and {:?} constraints",
                self.relation, rhs.relation
            ));
        }
        Ok(ConstraintSet::new(expr::add(&self.lhs, &rhs.lhs)?, self.relation))
    }

    /// Elementwise difference. Only equalities can be subtracted: the
    /// difference of two inequalities implies nothing.
    pub fn sub(&self, rhs: &ConstraintSet) -> Result<ConstraintSet> {
        if self.relation != rhs.relation {
            return rel_err!(format!(
                "cannot subtract {:?} and {:?} constraints",
                self.relation, rhs.relation
            ));
        }
        if self.relation == Relation::Leq {
            return op_err!(
                InequalityDifference,
                "cannot subtract one inequality from another".to_string()
            );
        }
        Ok(ConstraintSet::new(expr::sub(&self.lhs, &rhs.lhs)?, self.relation))
    }
}

impl Indexed for ConstraintSet {
    fn shape(&self) -> &crate::entity::Shape {
        self.lhs.shape()
    }
}

/// `a <= b`
pub fn leq<'a, 'b>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'b>>) -> Result<ConstraintSet> {
    Ok(ConstraintSet::new(expr::sub(a, b)?, Relation::Leq))
}

/// `a >= b`, stored as `-(a - b) <= 0`
pub fn geq<'a, 'b>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'b>>) -> Result<ConstraintSet> {
    let diff = expr::sub(a, b)?;
    Ok(ConstraintSet::new(expr::neg(&diff)?, Relation::Leq))
}

/// `a == b`
pub fn eq<'a, 'b>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'b>>) -> Result<ConstraintSet> {
    Ok(ConstraintSet::new(expr::sub(a, b)?, Relation::Eq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ErrorCode, ErrorKind};
    use crate::entity::Shape;
    use crate::index::{IndexRegistry, SetDecl};
    use crate::variable::{VarCollection, VarKind};

    fn vars(n: usize) -> (IndexRegistry, VarCollection) {
        let mut reg = IndexRegistry::new();
        let i = reg.create_set("i", &SetDecl::ordinal(n)).unwrap();
        let shape = Shape::over(&reg, &[i]);
        let (x, _) = VarCollection::realize("x", 0, shape, VarKind::Continuous, false, 0);
        (reg, x)
    }

    #[test]
    fn test_nonneg_detection() {
        let (_, x) = vars(2);
        let c = leq(&expr::neg(x.view()).unwrap(), 0.0).unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.constraints().iter().all(|c| c.is_nonneg()));
        assert_eq!(c.constraints()[1].nonneg_var(), x.view().get(1));

        let c = geq(x.view(), 0.0).unwrap();
        assert!(c.constraints()[0].is_nonneg());
        assert_eq!(c.relation(), Relation::Leq);

        // x <= 0 is an upper bound, not a non-negativity constraint
        let c = leq(x.view(), 0.0).unwrap();
        assert!(!c.constraints()[0].is_nonneg());
        // nor is an equality
        let c = eq(&expr::neg(x.view()).unwrap(), 0.0).unwrap();
        assert!(!c.constraints()[0].is_nonneg());
    }

    #[test]
    fn test_orientation_and_bias() {
        let (_, x) = vars(1);
        // x >= 3  ->  -x + 3 <= 0, rhs -3
        let c = geq(x.view(), 3.0).unwrap();
        let scalar = &c.constraints()[0];
        assert_eq!(scalar.coefficients(), vec![Value::Num(-1.0)]);
        assert_eq!(scalar.bias(), Some(Value::Num(-3.0)));

        let c = leq(x.view(), 12.0).unwrap();
        assert_eq!(c.constraints()[0].bias(), Some(Value::Num(12.0)));
    }

    #[test]
    fn test_skip_positions_not_expanded() {
        let mut reg = IndexRegistry::new();
        let t = reg.create_set("t", &SetDecl::ordinal(3)).unwrap();
        let shape = Shape::over(&reg, &[t]);
        let (x, _) = VarCollection::realize("x", 0, shape.clone(), VarKind::Continuous, false, 0);
        let positions: Vec<Option<usize>> = vec![None, Some(0), Some(1)];
        let prev = reg.shift(t, -1).unwrap();
        let lagged = x.view().select(Shape::over(&reg, &[prev]), &positions);

        let c = leq(x.view(), &lagged).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.lhs().items().len(), 3);
        assert_eq!(c.constraints()[0].position(), 1);
    }

    #[test]
    fn test_combining_constraints() {
        let (_, x) = vars(2);
        let a = leq(x.view(), 1.0).unwrap();
        let b = leq(x.view(), 2.0).unwrap();
        let e = eq(x.view(), 5.0).unwrap();

        let sum = a.add(&b).unwrap();
        assert_eq!(sum.relation(), Relation::Leq);
        assert_eq!(sum.constraints()[0].coefficients(), vec![Value::ONE, Value::ONE]);
        assert_eq!(sum.constraints()[0].bias(), Some(Value::Num(3.0)));

        let err = a.add(&e).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RelationTypeConflict);
        assert_eq!(err.code, ErrorCode::RelationConflict);

        let err = a.sub(&b).unwrap_err();
        assert_eq!(err.code, ErrorCode::InequalityDifference);

        let diff = e.sub(&e).unwrap();
        assert_eq!(diff.relation(), Relation::Eq);
    }
}
