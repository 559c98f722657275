// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! JSON model format.
//!
//! A model file lists sets, parameters, variables, constraints and
//! objectives in declaration order. Expressions are trees with one key per
//! node:
//!
//! ```json
//! {"sub": [{"mul": [{"param": {"name": "cost"}}, {"var": {"name": "x"}}]}, {"num": 3}]}
//! ```
//!
//! # Example
//! ```no_run
//! use linmodel_engine::json;
//!
//! let model = json::Model::from_reader(std::io::stdin())?.build()?;
//! # Ok::<(), linmodel_engine::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::common::{Error, ErrorCode, ErrorKind, Result, Value};
use crate::constraint::{self, ConstraintSet};
use crate::expr::{self, ExprSet, Operand, Term};
use crate::import_err;
use crate::index::SetDecl;
use crate::model::{self, ModelOptions};
use crate::objective::{self, Sense};
use crate::param::ParamValues;
use crate::variable::VarKind;

fn is_false(val: &bool) -> bool {
    !*val
}

fn is_empty_vec<T>(val: &[T]) -> bool {
    val.is_empty()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetExpr {
    Intersect(String, String),
    Union(String, String),
    SymmetricDifference(String, String),
    Difference(String, String),
    Product(Vec<String>),
    Shift { set: String, by: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub members: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub derived: Option<SetExpr>,
}

/// A plain number, or a multiple of Big-M written `{"big_m": k}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Num(f64),
    BigM { big_m: f64 },
}

impl From<Number> for Value {
    fn from(n: Number) -> Value {
        match n {
            Number::Num(n) => Value::Num(n),
            Number::BigM { big_m } => Value::big_m_scaled(big_m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(Number),
    List(Vec<Number>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub index: Vec<String>,
    pub value: ParamValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub index: Vec<String>,
    #[serde(default)]
    pub kind: VarKind,
    #[serde(skip_serializing_if = "is_false", default)]
    pub nonneg: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Set(String),
    Element(String),
    At { set: String, position: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ref {
    pub name: String,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub at: Vec<Selector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Num(f64),
    BigM(f64),
    Param(Ref),
    Var(Ref),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Pow(Box<Expr>, i32),
    Sum(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    #[serde(alias = "<=")]
    Leq,
    #[serde(alias = ">=")]
    Geq,
    #[serde(alias = "==")]
    Eq,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub lhs: Expr,
    pub relation: Comparison,
    pub rhs: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    #[serde(default)]
    pub sense: Sense,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub options: ModelOptions,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub sets: Vec<Set>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub params: Vec<Param>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub variables: Vec<Variable>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub constraints: Vec<Constraint>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub objectives: Vec<Objective>,
}

fn parse_error(err: serde_json::Error) -> Error {
    Error::new(
        ErrorKind::Import,
        ErrorCode::JsonDeserialization,
        Some(format!("Failed to parse JSON model: {err}")),
    )
}

impl Model {
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self> {
        serde_json::from_reader(reader).map_err(parse_error)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(parse_error)
    }

    /// Declare everything in this file, in order, on a fresh engine model.
    pub fn build(&self) -> Result<model::Model> {
        let mut m = model::Model::new(&self.name, self.options.clone());
        for set in self.sets.iter() {
            declare_set(&mut m, set)?;
        }
        for param in self.params.iter() {
            let sets = set_ids(&m, &param.index)?;
            let values = match &param.value {
                ParamValue::Scalar(n) => ParamValues::Scalar((*n).into()),
                ParamValue::List(ns) => ParamValues::List(ns.iter().map(|&n| n.into()).collect()),
            };
            m.declare_param(&param.name, &sets, values)?;
        }
        for var in self.variables.iter() {
            let sets = set_ids(&m, &var.index)?;
            m.declare_var(&var.name, &sets, var.kind, var.nonneg)?;
        }
        for c in self.constraints.iter() {
            let lhs = eval(&m, &c.lhs)?;
            let rhs = eval(&m, &c.rhs)?;
            let constraints: ConstraintSet = match c.relation {
                Comparison::Leq => constraint::leq(&lhs, &rhs)?,
                Comparison::Geq => constraint::geq(&lhs, &rhs)?,
                Comparison::Eq => constraint::eq(&lhs, &rhs)?,
            };
            m.declare_constraint(&c.name, constraints)?;
        }
        for o in self.objectives.iter() {
            let e = eval(&m, &o.expr)?;
            let objective = match o.sense {
                Sense::Minimize => objective::minimize(&e)?,
                Sense::Maximize => objective::maximize(&e)?,
            };
            m.declare_objective(&o.name, objective)?;
        }
        Ok(m)
    }
}

fn set_ids(m: &model::Model, names: &[String]) -> Result<Vec<crate::index::SetId>> {
    names.iter().map(|name| m.set(name)).collect()
}

fn declare_set(m: &mut model::Model, set: &Set) -> Result<()> {
    let Some(derived) = &set.derived else {
        let decl = SetDecl {
            size: set.size,
            members: set.members.clone(),
        };
        m.declare_set(&set.name, &decl)?;
        return Ok(());
    };
    if set.size.is_some() || set.members.is_some() {
        return import_err!(
            BadModel,
            format!("set '{}' is derived and cannot also list a size or members", set.name)
        );
    }

    match derived {
        SetExpr::Intersect(a, b) => {
            let (a, b) = (m.set(a)?, m.set(b)?);
            m.intersect(&set.name, a, b)?;
        }
        SetExpr::Union(a, b) => {
            let (a, b) = (m.set(a)?, m.set(b)?);
            m.union(&set.name, a, b)?;
        }
        SetExpr::SymmetricDifference(a, b) => {
            let (a, b) = (m.set(a)?, m.set(b)?);
            m.symmetric_difference(&set.name, a, b)?;
        }
        SetExpr::Difference(a, b) => {
            let (a, b) = (m.set(a)?, m.set(b)?);
            m.difference(&set.name, a, b)?;
        }
        SetExpr::Product(names) => {
            let ids = set_ids(m, names)?;
            m.product(&set.name, &ids)?;
        }
        SetExpr::Shift { set: source, by } => {
            let source = m.set(source)?;
            m.shift(&set.name, source, *by)?;
        }
    }
    Ok(())
}

fn selectors(m: &model::Model, at: &[Selector]) -> Result<Vec<model::Selector>> {
    at.iter()
        .map(|s| match s {
            Selector::Set(name) => Ok(model::Selector::Set(m.set(name)?)),
            Selector::Element(name) => match m.registry().find_element(name) {
                Some(id) => Ok(model::Selector::Element(id)),
                None => import_err!(UnknownElement, format!("no element named '{name}'")),
            },
            Selector::At { set, position } => Ok(model::Selector::At(m.set(set)?, *position)),
        })
        .collect()
}

fn eval(m: &model::Model, e: &Expr) -> Result<ExprSet> {
    let binary = |a: &Expr, b: &Expr, op: expr::BinaryOp| -> Result<ExprSet> {
        expr::apply(op, &eval(m, a)?, &eval(m, b)?)
    };
    match e {
        Expr::Num(n) => Ok(ExprSet::scalar(Term::num(*n))),
        Expr::BigM(k) => Ok(ExprSet::scalar(Term::Const(Value::big_m_scaled(*k)))),
        Expr::Param(r) if r.at.is_empty() => Ok(Operand::from(m.param_named(&r.name)?).to_exprs()),
        Expr::Param(r) => {
            let param = m.select_param(&r.name, &selectors(m, &r.at)?)?;
            Ok(Operand::from(&param).to_exprs())
        }
        Expr::Var(r) if r.at.is_empty() => Ok(Operand::from(m.var_named(&r.name)?).to_exprs()),
        Expr::Var(r) => {
            let view = m.select_var(&r.name, &selectors(m, &r.at)?)?;
            Ok(Operand::from(&view).to_exprs())
        }
        Expr::Add(a, b) => binary(a, b, expr::BinaryOp::Add),
        Expr::Sub(a, b) => binary(a, b, expr::BinaryOp::Sub),
        Expr::Mul(a, b) => binary(a, b, expr::BinaryOp::Mul),
        Expr::Div(a, b) => binary(a, b, expr::BinaryOp::Div),
        Expr::Neg(a) => expr::neg(&eval(m, a)?),
        Expr::Pow(a, n) => expr::pow(&eval(m, a)?, *n),
        Expr::Sum(a) => expr::sum(&eval(m, a)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expression_tree() {
        let e: Expr = serde_json::from_str(
            r#"{"sub": [{"mul": [{"num": 2}, {"var": {"name": "x", "at": [{"element": "Mars"}]}}]}, {"big_m": 1}]}"#,
        )
        .unwrap();
        let expected = Expr::Sub(
            Box::new(Expr::Mul(
                Box::new(Expr::Num(2.0)),
                Box::new(Expr::Var(Ref {
                    name: "x".to_string(),
                    at: vec![Selector::Element("Mars".to_string())],
                })),
            )),
            Box::new(Expr::BigM(1.0)),
        );
        assert_eq!(e, expected);
    }

    #[test]
    fn test_param_values() {
        let p: Param =
            serde_json::from_str(r#"{"name": "cap", "index": ["i"], "value": [1, {"big_m": 2}]}"#)
                .unwrap();
        assert_eq!(
            p.value,
            ParamValue::List(vec![Number::Num(1.0), Number::BigM { big_m: 2.0 }])
        );
        let p: Param = serde_json::from_str(r#"{"name": "k", "value": 3.5}"#).unwrap();
        assert_eq!(p.value, ParamValue::Scalar(Number::Num(3.5)));
    }

    #[test]
    fn test_relation_aliases() {
        let c: Comparison = serde_json::from_str(r#"">=""#).unwrap();
        assert_eq!(c, Comparison::Geq);
        let c: Comparison = serde_json::from_str(r#""eq""#).unwrap();
        assert_eq!(c, Comparison::Eq);
    }

    #[test]
    fn test_bad_json() {
        let err = Model::from_json("{\"name\": ").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Import);
        assert_eq!(err.code, ErrorCode::JsonDeserialization);
    }

    #[test]
    fn test_derived_set_with_members_rejected() {
        let model = Model::from_json(
            r#"{
                "name": "m",
                "sets": [
                    {"name": "a", "members": ["x", "y"]},
                    {"name": "b", "members": ["y"], "derived": {"union": ["a", "a"]}}
                ]
            }"#,
        )
        .unwrap();
        let err = model.build().unwrap_err();
        assert_eq!(err.code, ErrorCode::BadModel);
    }

    #[test]
    fn test_unknown_element_selector() {
        let model = Model::from_json(
            r#"{
                "name": "m",
                "sets": [{"name": "p", "members": ["a", "b"]}],
                "variables": [{"name": "x", "index": ["p"]}],
                "objectives": [{"name": "o", "expr": {"var": {"name": "x", "at": [{"element": "c"}]}}}]
            }"#,
        )
        .unwrap();
        let err = model.build().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownElement);
    }
}
