// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::rc::Rc;

use crate::common::{Result, Value};
use crate::card_err;
use crate::entity::{Indexed, Shape, broadcast_len, stretch};
use crate::index::key_has_skip;

/// Initial values for a parameter collection: one value broadcast to
/// every position, or one value per position.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValues {
    Scalar(Value),
    List(Vec<Value>),
}

impl From<f64> for ParamValues {
    fn from(n: f64) -> Self {
        ParamValues::Scalar(Value::Num(n))
    }
}

impl From<Value> for ParamValues {
    fn from(v: Value) -> Self {
        ParamValues::Scalar(v)
    }
}

impl From<Vec<f64>> for ParamValues {
    fn from(ns: Vec<f64>) -> Self {
        ParamValues::List(ns.into_iter().map(Value::Num).collect())
    }
}

impl From<Vec<Value>> for ParamValues {
    fn from(vs: Vec<Value>) -> Self {
        ParamValues::List(vs)
    }
}

/// An indexed collection of constants.
///
/// Arithmetic between parameters always returns a new collection and
/// leaves both operands untouched, so one parameter can safely appear in
/// any number of expressions.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    name: Rc<str>,
    shape: Shape,
    values: Vec<Option<Value>>,
    // position of each entry in the collection it was selected from
    origin: Vec<Option<usize>>,
}

impl Param {
    pub fn new(name: &str, shape: Shape, values: ParamValues) -> Result<Param> {
        let len = shape.len();
        let values: Vec<Value> = match values {
            ParamValues::Scalar(v) => vec![v; len],
            ParamValues::List(vs) if vs.len() == len => vs,
            ParamValues::List(vs) => {
                return card_err!(format!(
                    "parameter '{name}' has {} values for {len} positions",
                    vs.len()
                ));
            }
        };
        let values: Vec<Option<Value>> = shape
            .keys()
            .iter()
            .zip(values)
            .map(|(key, v)| if key_has_skip(key) { None } else { Some(v) })
            .collect();
        let origin = (0..len).map(Some).collect();
        Ok(Param {
            name: name.into(),
            shape,
            values,
            origin,
        })
    }

    pub fn scalar(name: &str, value: Value) -> Param {
        Param {
            name: name.into(),
            shape: Shape::scalar(),
            values: vec![Some(value)],
            origin: vec![Some(0)],
        }
    }

    /// A view over some positions of this collection; `None` positions
    /// are absent in the result.
    pub(crate) fn select(&self, shape: Shape, positions: &[Option<usize>]) -> Param {
        let values = positions
            .iter()
            .map(|p| p.and_then(|p| self.values[p]))
            .collect();
        let origin = positions
            .iter()
            .map(|p| p.and_then(|p| self.origin[p]))
            .collect();
        Param {
            name: self.name.clone(),
            shape,
            values,
            origin,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub(crate) fn origin(&self, pos: usize) -> Option<usize> {
        self.origin[pos]
    }

    /// The present values, in position order.
    pub fn coefficients(&self) -> Vec<Value> {
        self.values.iter().flatten().copied().collect()
    }

    fn zip_with(
        &self,
        rhs: &Param,
        symbol: &str,
        f: impl Fn(Value, Value) -> Result<Value>,
    ) -> Result<Param> {
        let len = broadcast_len(self.len(), rhs.len())?;
        let lhs_values = stretch(&self.values, len)?;
        let rhs_values = stretch(&rhs.values, len)?;
        let values = lhs_values
            .into_iter()
            .zip(rhs_values)
            .map(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => f(a, b).map(Some),
                _ => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?;
        let shape = if self.len() >= rhs.len() {
            self.shape.stretched(len)?
        } else {
            rhs.shape.stretched(len)?
        };
        Ok(Param {
            name: format!("({} {symbol} {})", self.name, rhs.name).into(),
            shape,
            values,
            origin: (0..len).map(Some).collect(),
        })
    }

    pub fn add(&self, rhs: &Param) -> Result<Param> {
        self.zip_with(rhs, "+", |a, b| Ok(a + b))
    }

    pub fn sub(&self, rhs: &Param) -> Result<Param> {
        self.zip_with(rhs, "-", |a, b| Ok(a - b))
    }

    pub fn mul(&self, rhs: &Param) -> Result<Param> {
        self.zip_with(rhs, "*", Value::try_mul)
    }

    pub fn div(&self, rhs: &Param) -> Result<Param> {
        self.zip_with(rhs, "/", Value::try_div)
    }

    pub fn neg(&self) -> Param {
        Param {
            name: format!("-{}", self.name).into(),
            shape: self.shape.clone(),
            values: self.values.iter().map(|v| v.map(|v| -v)).collect(),
            origin: self.origin.clone(),
        }
    }
}

impl Indexed for Param {
    fn shape(&self) -> &Shape {
        &self.shape
    }
}
