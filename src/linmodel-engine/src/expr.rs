// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Linear expressions and their canonical form.
//!
//! A [`Term`] is a constant, a parameter element, a variable element or a
//! binary [`Expression`] node. Terms are only ever built through the
//! methods on `Term` (`add`, `sub`, `mul`, `div`, `neg`, `pow`), and each of
//! them returns an already-canonical tree:
//!
//! - every expression is a constant-free linear part followed by at most
//!   one trailing constant, `Add(linear, constant)`;
//! - in an `Add`/`Sub` node a numeric operand is always `two`, in a `Mul`
//!   node it is always `one` and `two` is a variable;
//! - subtracting a constant is stored as adding its negation;
//! - negation, including `0 - x`, is stored as `Mul(-1, x)`;
//! - scaling distributes over sums, and dividing by a constant scales by
//!   its reciprocal.
//!
//! Flattening such a tree gives a sequence of `(connective, atom)` pairs
//! from which the coefficients, variable positions and bias are read off.

use std::fmt;
use std::rc::Rc;

use crate::common::{Result, Value};
use crate::entity::{Indexed, Shape, broadcast_len, stretch};
use crate::index::Key;
use crate::op_err;
use crate::param::Param;
use crate::variable::{VarId, VarView};

/// A single element of a parameter collection, remembered by name so
/// exports can tell a parameter apart from a literal.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamRef {
    pub name: Rc<str>,
    pub position: usize,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Const(Value),
    Param(ParamRef),
    Var(VarId),
    Expr(Box<Expression>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Connective {
    Add,
    Sub,
    Mul,
}

impl Connective {
    fn flip(self) -> Connective {
        match self {
            Connective::Add => Connective::Sub,
            Connective::Sub => Connective::Add,
            Connective::Mul => Connective::Mul,
        }
    }

    fn sign(self) -> f64 {
        if self == Connective::Sub { -1.0 } else { 1.0 }
    }
}

/// The arithmetic operators a caller can apply; `Div` never survives into
/// a canonical tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    op: Connective,
    one: Term,
    two: Term,
}

impl Expression {
    pub fn op(&self) -> Connective {
        self.op
    }

    pub fn one(&self) -> &Term {
        &self.one
    }

    pub fn two(&self) -> &Term {
        &self.two
    }
}

fn node(op: Connective, one: Term, two: Term) -> Term {
    Term::Expr(Box::new(Expression { op, one, two }))
}

/// Split a canonical term into its linear part and trailing constant.
fn split(term: Term) -> (Option<Term>, Option<Term>) {
    match term {
        Term::Const(_) | Term::Param(_) => (None, Some(term)),
        Term::Expr(e) if e.op == Connective::Add && e.two.is_numeric() => {
            let Expression { one, two, .. } = *e;
            (Some(one), Some(two))
        }
        other => (Some(other), None),
    }
}

fn join(linear: Option<Term>, constant: Option<Term>) -> Term {
    match (linear, constant) {
        (None, None) => Term::Const(Value::ZERO),
        (None, Some(k)) => k,
        (Some(l), None) => l,
        (Some(l), Some(k)) if k.value().is_some_and(|v| v.is_zero()) => l,
        (Some(l), Some(k)) => node(Connective::Add, l, k),
    }
}

fn add_constants(a: Option<Term>, b: Option<Term>) -> Option<Term> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) => match (a.value(), b.value()) {
            (Some(x), Some(y)) => Some(Term::Const(x + y)),
            _ => None,
        },
    }
}

fn negate_constant(k: Option<Term>) -> Option<Term> {
    k.and_then(|k| k.value()).map(|v| Term::Const(-v))
}

/// `coefficient * term` for a constant-free linear `term`.
fn scale_linear(coefficient: &Term, c: Value, term: Term) -> Result<Term> {
    if c.is_one() {
        return Ok(term);
    }
    match term {
        Term::Var(_) => Ok(node(Connective::Mul, coefficient.clone(), term)),
        Term::Const(v) | Term::Param(ParamRef { value: v, .. }) => Ok(Term::Const(c.try_mul(v)?)),
        Term::Expr(e) => {
            let Expression { op, one, two } = *e;
            match op {
                Connective::Mul => {
                    let k = match one.value() {
                        Some(k) => c.try_mul(k)?,
                        None => c,
                    };
                    if k.is_one() {
                        Ok(two)
                    } else {
                        Ok(node(Connective::Mul, Term::Const(k), two))
                    }
                }
                Connective::Add | Connective::Sub => Ok(node(
                    op,
                    scale_linear(coefficient, c, one)?,
                    scale_linear(coefficient, c, two)?,
                )),
            }
        }
    }
}

/// `coefficient * term` where `coefficient` is numeric with value `c`.
fn scale(coefficient: Term, c: Value, term: Term) -> Result<Term> {
    if c.is_zero() {
        return Ok(Term::Const(Value::ZERO));
    }
    let (linear, constant) = split(term);
    let linear = match linear {
        Some(l) => Some(scale_linear(&coefficient, c, l)?),
        None => None,
    };
    let constant = match constant.and_then(|k| k.value()) {
        Some(k) => Some(Term::Const(c.try_mul(k)?)),
        None => None,
    };
    Ok(join(linear, constant))
}

impl Term {
    pub fn num(n: f64) -> Term {
        Term::Const(Value::Num(n))
    }

    /// The numeric value of a constant or parameter element.
    pub fn value(&self) -> Option<Value> {
        match self {
            Term::Const(v) => Some(*v),
            Term::Param(p) => Some(p.value),
            Term::Var(_) | Term::Expr(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.value().is_some()
    }

    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Term::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn add(self, rhs: Term) -> Result<Term> {
        let (la, ka) = split(self);
        let (lb, kb) = split(rhs);
        let linear = match (la, lb) {
            (Some(a), Some(b)) => Some(node(Connective::Add, a, b)),
            (a, None) => a,
            (None, b) => b,
        };
        Ok(join(linear, add_constants(ka, kb)))
    }

    pub fn sub(self, rhs: Term) -> Result<Term> {
        let (la, ka) = split(self);
        let (lb, kb) = split(rhs);
        let linear = match (la, lb) {
            (Some(a), Some(b)) => Some(node(Connective::Sub, a, b)),
            (a, None) => a,
            (None, Some(b)) => Some(scale_linear(&Term::num(-1.0), Value::Num(-1.0), b)?),
        };
        Ok(join(linear, add_constants(ka, negate_constant(kb))))
    }

    pub fn mul(self, rhs: Term) -> Result<Term> {
        match (self.value(), rhs.value()) {
            (Some(a), Some(b)) => Ok(Term::Const(a.try_mul(b)?)),
            (Some(c), None) => scale(self, c, rhs),
            (None, Some(c)) => scale(rhs, c, self),
            (None, None) => op_err!(NonlinearTerm, format!("{self} * {rhs}")),
        }
    }

    pub fn div(self, rhs: Term) -> Result<Term> {
        let Some(d) = rhs.value() else {
            return op_err!(DivisionByVariable, format!("{self} / {rhs}"));
        };
        if d.is_zero() {
            return op_err!(DivisionByZero, format!("{self} / 0"));
        }
        match self.value() {
            Some(n) => Ok(Term::Const(n.try_div(d)?)),
            None => {
                let r = Value::ONE.try_div(d)?;
                scale(Term::Const(r), r, self)
            }
        }
    }

    pub fn neg(self) -> Result<Term> {
        Term::num(-1.0).mul(self)
    }

    pub fn pow(self, n: i32) -> Result<Term> {
        match (self.value(), n) {
            (_, 0) => Ok(Term::Const(Value::ONE)),
            (_, 1) => Ok(self),
            (Some(v), n) if n < 0 && v.is_zero() => {
                op_err!(DivisionByZero, format!("({self})^{n}"))
            }
            (Some(v), n) => Ok(Term::Const(v.try_powi(n)?)),
            (None, n) => op_err!(UnsupportedPower, format!("({self})^{n}")),
        }
    }

    pub fn apply(self, op: BinaryOp, rhs: Term) -> Result<Term> {
        match op {
            BinaryOp::Add => self.add(rhs),
            BinaryOp::Sub => self.sub(rhs),
            BinaryOp::Mul => self.mul(rhs),
            BinaryOp::Div => self.div(rhs),
        }
    }

    pub fn flatten(&self) -> Flat {
        let mut entries = Vec::new();
        flatten_into(self, Connective::Add, &mut entries);
        Flat(entries)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Const(v) => write!(f, "{v}"),
            Term::Param(p) => write!(f, "{}[{}]", p.name, p.position),
            Term::Var(id) => write!(f, "v{}", id.index()),
            Term::Expr(e) => {
                let op = match e.op {
                    Connective::Add => "+",
                    Connective::Sub => "-",
                    Connective::Mul => "*",
                };
                write!(f, "({} {op} {})", e.one, e.two)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Atom {
    Num(Value),
    Var(VarId),
}

/// A flattened canonical expression.
///
/// Entries are `(connective, atom)` pairs. A sum-level atom carries `Add`
/// or `Sub`; a variable scaled by a coefficient appears as the coefficient
/// (with the sum-level sign) followed by `(Mul, Var)`. A numeric atom that
/// is not followed by `Mul` can only be the last entry: the constant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Flat(Vec<(Connective, Atom)>);

fn flatten_into(term: &Term, sign: Connective, out: &mut Vec<(Connective, Atom)>) {
    // `two` is pushed before `one` so entries come out left to right
    let mut pending = vec![(term, sign)];
    while let Some((term, sign)) = pending.pop() {
        match term {
            Term::Const(_) | Term::Param(_) => {
                if let Some(v) = term.value() {
                    out.push((sign, Atom::Num(v)));
                }
            }
            Term::Var(id) => out.push((sign, Atom::Var(*id))),
            Term::Expr(e) => {
                let second = match e.op {
                    Connective::Add => sign,
                    Connective::Sub => sign.flip(),
                    Connective::Mul => Connective::Mul,
                };
                pending.push((&e.two, second));
                pending.push((&e.one, sign));
            }
        }
    }
}

/// Combine neighbouring `(sign, term)` blocks pairwise until one is left,
/// so the tree depth grows with the log of the number of blocks.
fn balance(mut blocks: Vec<(Connective, Term)>) -> Option<(Connective, Term)> {
    while blocks.len() > 1 {
        let mut next = Vec::with_capacity(blocks.len().div_ceil(2));
        let mut iter = blocks.into_iter();
        while let Some((sa, ta)) = iter.next() {
            next.push(match iter.next() {
                Some((sb, tb)) => {
                    let op = if sb == sa { Connective::Add } else { Connective::Sub };
                    (sa, node(op, ta, tb))
                }
                None => (sa, ta),
            });
        }
        blocks = next;
    }
    blocks.pop()
}

fn signed(sign: Connective, v: Value) -> Value {
    if sign == Connective::Sub { -v } else { v }
}

impl Flat {
    pub fn entries(&self) -> &[(Connective, Atom)] {
        &self.0
    }

    fn trailing_constant(&self) -> Option<Value> {
        match self.0.last() {
            Some(&(sign, Atom::Num(v))) if sign != Connective::Mul => Some(signed(sign, v)),
            _ => None,
        }
    }

    fn linear_entries(&self) -> &[(Connective, Atom)] {
        if self.trailing_constant().is_some() {
            &self.0[..self.0.len() - 1]
        } else {
            &self.0
        }
    }

    /// The right-hand side of `expr <= 0` / `expr = 0` once the linear
    /// part is kept on the left: the negated trailing constant, or `None`
    /// when the expression has no constant.
    pub fn bias(&self) -> Option<Value> {
        self.trailing_constant().map(|k| -k)
    }

    pub fn bias_or_zero(&self) -> Value {
        self.bias().unwrap_or(Value::ZERO)
    }

    /// `(coefficient, variable)` pairs in order of appearance. A variable
    /// that appears more than once is reported more than once.
    pub fn terms(&self) -> Vec<(Value, VarId)> {
        let mut terms = Vec::new();
        let mut pending: Option<Value> = None;
        for &(sign, atom) in self.linear_entries() {
            match (sign, atom) {
                (Connective::Mul, Atom::Var(id)) => {
                    terms.push((pending.take().unwrap_or(Value::ONE), id));
                }
                (sign, Atom::Num(v)) => pending = Some(signed(sign, v)),
                (sign, Atom::Var(id)) => {
                    terms.push((Value::Num(sign.sign()), id));
                }
            }
        }
        terms
    }

    pub fn coefficients(&self) -> Vec<Value> {
        self.terms().into_iter().map(|(c, _)| c).collect()
    }

    pub fn variable_positions(&self) -> Vec<VarId> {
        self.terms().into_iter().map(|(_, id)| id).collect()
    }

    /// Rebuild a balanced tree from this sequence, keeping a trailing
    /// constant at the top. Flattening the result gives back the same
    /// sequence.
    pub fn to_term(&self) -> Term {
        let mut blocks = Vec::with_capacity(self.0.len());
        let mut entries = self.0.iter().peekable();
        while let Some(&(sign, atom)) = entries.next() {
            let group = match atom {
                Atom::Num(c) => match entries.peek() {
                    Some(&&(Connective::Mul, Atom::Var(id))) => {
                        entries.next();
                        node(Connective::Mul, Term::Const(c), Term::Var(id))
                    }
                    _ => Term::Const(c),
                },
                Atom::Var(id) => Term::Var(id),
            };
            blocks.push((sign, group));
        }
        let constant = match blocks.last() {
            Some((_, Term::Const(_))) if self.trailing_constant().is_some() => blocks.pop(),
            _ => None,
        };
        match (balance(blocks), constant) {
            (Some((sl, linear)), Some((sk, k))) => {
                let op = if sk == sl { Connective::Add } else { Connective::Sub };
                node(op, linear, k)
            }
            (Some((_, linear)), None) => linear,
            (None, Some((_, k))) => k,
            (None, None) => Term::Const(Value::ZERO),
        }
    }
}

/// An indexed expression: one (possibly absent) term per position.
#[derive(Clone, Debug, PartialEq)]
pub struct ExprSet {
    shape: Shape,
    items: Vec<Option<Term>>,
}

impl ExprSet {
    pub fn scalar(term: Term) -> ExprSet {
        ExprSet {
            shape: Shape::scalar(),
            items: vec![Some(term)],
        }
    }

    pub fn items(&self) -> &[Option<Term>] {
        &self.items
    }

    pub fn get(&self, pos: usize) -> Option<&Term> {
        self.items.get(pos).and_then(|t| t.as_ref())
    }

    /// `(key, term)` for every present position.
    pub fn present(&self) -> impl Iterator<Item = (usize, &Key, &Term)> {
        self.shape
            .keys()
            .iter()
            .zip(self.items.iter())
            .enumerate()
            .filter_map(|(pos, (key, term))| term.as_ref().map(|t| (pos, key, t)))
    }
}

impl Indexed for ExprSet {
    fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// Anything that can stand on one side of an arithmetic operator.
#[derive(Clone, Debug)]
pub enum Operand<'a> {
    Value(Value),
    Param(&'a Param),
    Vars(&'a VarView),
    Exprs(&'a ExprSet),
}

impl From<f64> for Operand<'_> {
    fn from(n: f64) -> Self {
        Operand::Value(Value::Num(n))
    }
}

impl From<Value> for Operand<'_> {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl<'a> From<&'a Param> for Operand<'a> {
    fn from(p: &'a Param) -> Self {
        Operand::Param(p)
    }
}

impl<'a> From<&'a VarView> for Operand<'a> {
    fn from(v: &'a VarView) -> Self {
        Operand::Vars(v)
    }
}

impl<'a> From<&'a ExprSet> for Operand<'a> {
    fn from(e: &'a ExprSet) -> Self {
        Operand::Exprs(e)
    }
}

impl Operand<'_> {
    pub fn to_exprs(&self) -> ExprSet {
        match self {
            Operand::Value(v) => ExprSet::scalar(Term::Const(*v)),
            Operand::Param(p) => ExprSet {
                shape: p.shape().clone(),
                items: p
                    .values()
                    .iter()
                    .enumerate()
                    .map(|(pos, v)| {
                        let position = p.origin(pos)?;
                        v.map(|value| {
                            Term::Param(ParamRef {
                                name: p.shared_name().clone(),
                                position,
                                value,
                            })
                        })
                    })
                    .collect(),
            },
            Operand::Vars(view) => ExprSet {
                shape: view.shape().clone(),
                items: view.vars().iter().map(|v| v.map(Term::Var)).collect(),
            },
            Operand::Exprs(e) => (*e).clone(),
        }
    }
}

/// Elementwise `a op b`, stretching the shorter operand to the longer one.
/// A position absent on either side is absent in the result.
pub fn apply<'a, 'b>(
    op: BinaryOp,
    a: impl Into<Operand<'a>>,
    b: impl Into<Operand<'b>>,
) -> Result<ExprSet> {
    let (a, b) = (a.into().to_exprs(), b.into().to_exprs());
    let len = broadcast_len(a.len(), b.len())?;
    let shape = if a.len() >= b.len() {
        a.shape.stretched(len)?
    } else {
        b.shape.stretched(len)?
    };
    let items = stretch(&a.items, len)?
        .into_iter()
        .zip(stretch(&b.items, len)?)
        .map(|pair| match pair {
            (Some(x), Some(y)) => x.apply(op, y).map(Some),
            _ => Ok(None),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ExprSet { shape, items })
}

pub fn add<'a, 'b>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'b>>) -> Result<ExprSet> {
    apply(BinaryOp::Add, a, b)
}

pub fn sub<'a, 'b>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'b>>) -> Result<ExprSet> {
    apply(BinaryOp::Sub, a, b)
}

pub fn mul<'a, 'b>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'b>>) -> Result<ExprSet> {
    apply(BinaryOp::Mul, a, b)
}

pub fn div<'a, 'b>(a: impl Into<Operand<'a>>, b: impl Into<Operand<'b>>) -> Result<ExprSet> {
    apply(BinaryOp::Div, a, b)
}

fn map_terms(a: ExprSet, f: impl Fn(Term) -> Result<Term>) -> Result<ExprSet> {
    let items = a
        .items
        .into_iter()
        .map(|t| t.map(&f).transpose())
        .collect::<Result<Vec<_>>>()?;
    Ok(ExprSet {
        shape: a.shape,
        items,
    })
}

pub fn neg<'a>(a: impl Into<Operand<'a>>) -> Result<ExprSet> {
    map_terms(a.into().to_exprs(), Term::neg)
}

pub fn pow<'a>(a: impl Into<Operand<'a>>, n: i32) -> Result<ExprSet> {
    map_terms(a.into().to_exprs(), |t| t.pow(n))
}

/// Reduce an indexed expression to a scalar, skipping absent positions.
///
/// Present terms are added pairwise, so the resulting tree stays shallow
/// for sums over very large collections.
pub fn sum<'a>(a: impl Into<Operand<'a>>) -> Result<ExprSet> {
    let a = a.into().to_exprs();
    let mut level: Vec<Term> = a.items.into_iter().flatten().collect();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut terms = level.into_iter();
        while let Some(left) = terms.next() {
            next.push(match terms.next() {
                Some(right) => left.add(right)?,
                None => left,
            });
        }
        level = next;
    }
    let total = match level.pop() {
        Some(term) => Term::Const(Value::ZERO).add(term)?,
        None => Term::Const(Value::ZERO),
    };
    Ok(ExprSet::scalar(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ErrorCode, ErrorKind};

    fn x(n: u32) -> Term {
        Term::Var(VarId(n))
    }

    #[test]
    fn test_linear_extraction() {
        // 3*x0 - x1 + 5
        let e = Term::num(3.0)
            .mul(x(0))
            .unwrap()
            .sub(x(1))
            .unwrap()
            .add(Term::num(5.0))
            .unwrap();
        let flat = e.flatten();
        assert_eq!(flat.coefficients(), vec![Value::Num(3.0), Value::Num(-1.0)]);
        assert_eq!(flat.variable_positions(), vec![VarId(0), VarId(1)]);
        assert_eq!(flat.bias(), Some(Value::Num(-5.0)));
    }

    #[test]
    fn test_constant_ordering() {
        // constant leads in products
        let e = x(0).mul(Term::num(3.0)).unwrap();
        let node = e.as_expression().unwrap();
        assert_eq!(node.op(), Connective::Mul);
        assert_eq!(node.one(), &Term::num(3.0));
        assert_eq!(node.two(), &x(0));

        // constant trails in sums
        let e = Term::num(4.0).add(x(0)).unwrap();
        let node = e.as_expression().unwrap();
        assert_eq!(node.op(), Connective::Add);
        assert_eq!(node.one(), &x(0));
        assert_eq!(node.two(), &Term::num(4.0));
    }

    #[test]
    fn test_sub_constant_becomes_add() {
        let e = x(0).sub(Term::num(2.0)).unwrap();
        let node = e.as_expression().unwrap();
        assert_eq!(node.op(), Connective::Add);
        assert_eq!(node.two(), &Term::num(-2.0));
    }

    #[test]
    fn test_negation_canon() {
        let expected = node(Connective::Mul, Term::num(-1.0), x(0));
        assert_eq!(x(0).neg().unwrap(), expected);
        assert_eq!(Term::num(0.0).sub(x(0)).unwrap(), expected);
        assert_eq!(x(0).neg().unwrap().neg().unwrap(), x(0));
    }

    #[test]
    fn test_constants_hoisted() {
        // (x0 + 1) - (x1 + 2) == (x0 - x1) + -1
        let a = x(0).add(Term::num(1.0)).unwrap();
        let b = x(1).add(Term::num(2.0)).unwrap();
        let e = a.sub(b).unwrap();
        let expected = node(
            Connective::Add,
            node(Connective::Sub, x(0), x(1)),
            Term::num(-1.0),
        );
        assert_eq!(e, expected);
        assert_eq!(e.flatten().bias(), Some(Value::Num(1.0)));

        // constants cancel entirely
        let e = x(0).add(Term::num(2.0)).unwrap().sub(Term::num(2.0)).unwrap();
        assert_eq!(e, x(0));
        assert_eq!(e.flatten().bias(), None);
        assert_eq!(e.flatten().bias_or_zero(), Value::ZERO);
    }

    #[test]
    fn test_scale_distributes() {
        // 2 * (x0 - 3*x1 + 4)
        let inner = x(0)
            .sub(Term::num(3.0).mul(x(1)).unwrap())
            .unwrap()
            .add(Term::num(4.0))
            .unwrap();
        let e = Term::num(2.0).mul(inner).unwrap();
        let flat = e.flatten();
        assert_eq!(flat.coefficients(), vec![Value::Num(2.0), Value::Num(-6.0)]);
        assert_eq!(flat.bias(), Some(Value::Num(-8.0)));

        // divide by a constant
        let e = Term::num(4.0).mul(x(0)).unwrap().div(Term::num(2.0)).unwrap();
        assert_eq!(e.flatten().coefficients(), vec![Value::Num(2.0)]);

        // 0 * x folds away
        assert_eq!(Term::num(0.0).mul(x(0)).unwrap(), Term::num(0.0));
    }

    #[test]
    fn test_nested_subtraction_signs() {
        // x0 - (x1 - 2*x2)
        let inner = x(1).sub(Term::num(2.0).mul(x(2)).unwrap()).unwrap();
        let e = x(0).sub(inner).unwrap();
        let flat = e.flatten();
        assert_eq!(
            flat.coefficients(),
            vec![Value::Num(1.0), Value::Num(-1.0), Value::Num(2.0)]
        );
        // -(x0 - x1)
        let e = x(0).sub(x(1)).unwrap().neg().unwrap();
        assert_eq!(
            e.flatten().coefficients(),
            vec![Value::Num(-1.0), Value::Num(1.0)]
        );
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let e = Term::num(3.0)
            .mul(x(0))
            .unwrap()
            .sub(x(1).sub(x(2)).unwrap())
            .unwrap()
            .add(Term::num(7.0))
            .unwrap();
        let flat = e.flatten();
        let again = flat.to_term().flatten();
        assert_eq!(flat, again);
        assert_eq!(flat.bias(), again.bias());
    }

    #[test]
    fn test_nonlinear_rejected() {
        let err = x(0).mul(x(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
        assert_eq!(err.code, ErrorCode::NonlinearTerm);

        let err = x(0).div(x(1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DivisionByVariable);
        let err = x(0).div(Term::num(0.0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DivisionByZero);
        let err = x(0).div(Term::Const(Value::big_m())).unwrap_err();
        assert_eq!(err.code, ErrorCode::DegenerateDivision);
    }

    #[test]
    fn test_powers() {
        assert_eq!(x(0).pow(0).unwrap(), Term::num(1.0));
        assert_eq!(x(0).pow(1).unwrap(), x(0));
        assert_eq!(Term::num(2.0).pow(3).unwrap(), Term::num(8.0));
        let err = x(0).pow(2).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedPower);
        let err = Term::num(0.0).pow(-1).unwrap_err();
        assert_eq!(err.code, ErrorCode::DivisionByZero);
    }

    #[test]
    fn test_big_m_coefficients() {
        // x0 - M * x1 <= 0
        let e = x(0)
            .sub(Term::Const(Value::big_m()).mul(x(1)).unwrap())
            .unwrap();
        assert_eq!(
            e.flatten().coefficients(),
            vec![Value::ONE, Value::BigM(-1.0)]
        );
        let err = Term::Const(Value::big_m())
            .mul(Term::Const(Value::big_m()))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BigMProduct);
    }

    #[test]
    fn test_param_refs_kept() {
        let p = Term::Param(ParamRef {
            name: "cost".into(),
            position: 2,
            value: Value::Num(4.0),
        });
        let e = x(0).mul(p.clone()).unwrap();
        assert_eq!(e.as_expression().unwrap().one(), &p);
        assert_eq!(e.to_string(), "(cost[2] * v0)");
        assert_eq!(e.flatten().coefficients(), vec![Value::Num(4.0)]);
    }

    #[test]
    fn test_sum_and_absent_positions() {
        let items = ExprSet {
            shape: Shape::from_keys(&[], vec![Key::new(), Key::new(), Key::new()]),
            items: vec![Some(x(0)), None, Some(x(2))],
        };
        let total = sum(&items).unwrap();
        assert_eq!(
            total.get(0).unwrap().flatten().variable_positions(),
            vec![VarId(0), VarId(2)]
        );

        let shifted = add(&items, 1.0).unwrap();
        assert_eq!(shifted.get(1), None);
        assert_eq!(shifted.present().count(), 2);

        let empty = ExprSet {
            shape: Shape::scalar(),
            items: vec![None],
        };
        assert_eq!(sum(&empty).unwrap().get(0), Some(&Term::num(0.0)));
    }

    fn depth(term: &Term) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(term, 1)];
        while let Some((term, d)) = pending.pop() {
            deepest = deepest.max(d);
            if let Term::Expr(e) = term {
                pending.push((&e.one, d + 1));
                pending.push((&e.two, d + 1));
            }
        }
        deepest
    }

    #[test]
    fn test_sum_of_many_variables() {
        const N: usize = 200_000;
        let items = ExprSet {
            shape: Shape::from_keys(&[], vec![Key::new(); N]),
            items: (0..N as u32).map(|n| Some(x(n))).collect(),
        };
        let total = sum(&items).unwrap();
        let term = total.get(0).unwrap();
        assert!(depth(term) <= 20, "depth {}", depth(term));

        let flat = term.flatten();
        let positions = flat.variable_positions();
        assert_eq!(positions.len(), N);
        assert_eq!(positions[0], VarId(0));
        assert_eq!(positions[N - 1], VarId(N as u32 - 1));

        let shifted = term.clone().add(Term::num(2.0)).unwrap();
        assert_eq!(shifted.flatten().bias(), Some(Value::Num(-2.0)));
        assert_ne!(&shifted, term);
        let scaled = term.clone().mul(Term::num(3.0)).unwrap();
        assert_eq!(scaled.flatten().coefficients()[N / 2], Value::Num(3.0));

        let rebuilt = flat.to_term();
        assert!(depth(&rebuilt) <= 20);
        assert_eq!(rebuilt.flatten(), flat);
        assert_eq!(total.clone(), total);
    }

    #[test]
    fn test_apply_broadcast_mismatch() {
        let two = ExprSet {
            shape: Shape::from_keys(&[], vec![Key::new(), Key::new()]),
            items: vec![Some(x(0)), Some(x(1))],
        };
        let three = ExprSet {
            shape: Shape::from_keys(&[], vec![Key::new(), Key::new(), Key::new()]),
            items: vec![Some(x(2)), Some(x(3)), Some(x(4))],
        };
        let err = add(&two, &three).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CardinalityMismatch);
    }
}
