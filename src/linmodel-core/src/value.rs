// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Numeric constants as they appear in a model.
//!
//! A constant is either an ordinary number or a multiple of the Big-M
//! sentinel, an "effectively infinite" quantity whose concrete value is only
//! chosen when the model is lowered to matrices. Keeping the sentinel
//! symbolic until then means `M`, `2M` and `M + 3` stay distinguishable
//! from whatever literal the user happens to pick for `M`.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::common::{Error, ErrorCode, ErrorKind, Result};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Num(f64),
    /// `k * M`; never constructed with `k == 0`
    BigM(f64),
}

impl Value {
    pub const ZERO: Value = Value::Num(0.0);
    pub const ONE: Value = Value::Num(1.0);

    pub fn big_m() -> Value {
        Value::BigM(1.0)
    }

    /// `scale * M`, collapsing to zero when the scale is zero.
    pub fn big_m_scaled(scale: f64) -> Value {
        if scale == 0.0 {
            Value::ZERO
        } else {
            Value::BigM(scale)
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Value::Num(n) if *n == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Value::Num(n) if *n == 1.0)
    }

    pub fn is_big_m(&self) -> bool {
        matches!(self, Value::BigM(_))
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::BigM(_) => None,
        }
    }

    /// Substitute a concrete number for the Big-M sentinel.
    pub fn resolve(&self, big_m: f64) -> f64 {
        match self {
            Value::Num(n) => *n,
            Value::BigM(k) => k * big_m,
        }
    }

    pub fn try_mul(self, rhs: Value) -> Result<Value> {
        match (self, rhs) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a * b)),
            (Value::Num(c), Value::BigM(k)) | (Value::BigM(k), Value::Num(c)) => {
                Ok(Value::big_m_scaled(c * k))
            }
            (Value::BigM(_), Value::BigM(_)) => Err(Error::new(
                ErrorKind::UnsupportedOperation,
                ErrorCode::BigMProduct,
                Some(format!("{self} * {rhs}")),
            )),
        }
    }

    pub fn try_div(self, rhs: Value) -> Result<Value> {
        match (self, rhs) {
            (_, Value::Num(d)) if d == 0.0 => Err(Error::new(
                ErrorKind::UnsupportedOperation,
                ErrorCode::DivisionByZero,
                Some(format!("{self} / 0")),
            )),
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a / b)),
            (Value::BigM(k), Value::Num(c)) => Ok(Value::big_m_scaled(k / c)),
            (_, Value::BigM(_)) => Err(Error::new(
                ErrorKind::UnsupportedOperation,
                ErrorCode::DegenerateDivision,
                Some(format!("{self} / {rhs}")),
            )),
        }
    }

    pub fn try_powi(self, n: i32) -> Result<Value> {
        match (self, n) {
            (_, 0) => Ok(Value::ONE),
            (_, 1) => Ok(self),
            (Value::Num(a), n) => Ok(Value::Num(a.powi(n))),
            (Value::BigM(_), _) => Err(Error::new(
                ErrorKind::UnsupportedOperation,
                ErrorCode::BigMProduct,
                Some(format!("({self})^{n}")),
            )),
        }
    }
}

impl Add for Value {
    type Output = Value;

    fn add(self, rhs: Value) -> Value {
        match (self, rhs) {
            (Value::Num(a), Value::Num(b)) => Value::Num(a + b),
            // M dominates any finite offset
            (Value::BigM(k), Value::Num(_)) | (Value::Num(_), Value::BigM(k)) => Value::BigM(k),
            (Value::BigM(a), Value::BigM(b)) => Value::big_m_scaled(a + b),
        }
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, rhs: Value) -> Value {
        self + (-rhs)
    }
}

impl Neg for Value {
    type Output = Value;

    fn neg(self) -> Value {
        match self {
            Value::Num(n) => Value::Num(-n),
            Value::BigM(k) => Value::BigM(-k),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::BigM(k) if *k == 1.0 => write!(f, "M"),
            Value::BigM(k) if *k == -1.0 => write!(f, "-M"),
            Value::BigM(k) => write!(f, "{k}M"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_big_m_absorbs_finite_offsets() {
        assert_eq!(Value::big_m() + Value::Num(3.0), Value::big_m());
        assert_eq!(Value::Num(-7.0) + Value::big_m(), Value::big_m());
        assert_eq!(Value::big_m() - Value::big_m(), Value::ZERO);
        assert_eq!(Value::big_m() + Value::big_m(), Value::BigM(2.0));
    }

    #[test]
    fn test_scaling() {
        assert_eq!(
            Value::Num(3.0).try_mul(Value::big_m()).unwrap(),
            Value::BigM(3.0)
        );
        assert_eq!(
            Value::Num(0.0).try_mul(Value::big_m()).unwrap(),
            Value::ZERO
        );
        assert_eq!(
            Value::BigM(4.0).try_div(Value::Num(2.0)).unwrap(),
            Value::BigM(2.0)
        );
        let err = Value::big_m().try_mul(Value::big_m()).unwrap_err();
        assert_eq!(err.code, ErrorCode::BigMProduct);
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_division_errors() {
        let err = Value::Num(1.0).try_div(Value::ZERO).unwrap_err();
        assert_eq!(err.code, ErrorCode::DivisionByZero);
        let err = Value::big_m().try_div(Value::ZERO).unwrap_err();
        assert_eq!(err.code, ErrorCode::DivisionByZero);
        let err = Value::Num(1.0).try_div(Value::big_m()).unwrap_err();
        assert_eq!(err.code, ErrorCode::DegenerateDivision);
    }

    #[test]
    fn test_powers() {
        assert_eq!(Value::Num(3.0).try_powi(2).unwrap(), Value::Num(9.0));
        assert_eq!(Value::big_m().try_powi(0).unwrap(), Value::ONE);
        assert_eq!(Value::big_m().try_powi(1).unwrap(), Value::big_m());
        assert!(Value::big_m().try_powi(2).is_err());
    }

    #[test]
    fn test_resolve() {
        assert!(approx_eq!(f64, Value::BigM(-2.0).resolve(1e6), -2e6));
        assert!(approx_eq!(f64, Value::Num(0.5).resolve(1e6), 0.5));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::big_m().to_string(), "M");
        assert_eq!((-Value::big_m()).to_string(), "-M");
        assert_eq!(Value::BigM(2.5).to_string(), "2.5M");
        assert_eq!(Value::Num(12.0).to_string(), "12");
    }
}
