// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property-based tests for the index algebra and canonical form.
//!
//! These tests verify that:
//! 1. Set operations are commutative and union cardinality is additive
//! 2. Scalar parameters broadcast to every position
//! 3. Flattening is idempotent and the extracted linear form matches a
//!    directly accumulated reference

use std::collections::HashMap;

use float_cmp::approx_eq;
use proptest::prelude::*;

use crate::common::Value;
use crate::entity::{Shape, stretch};
use crate::expr::Term;
use crate::index::{IndexRegistry, SetDecl};
use crate::param::Param;
use crate::variable::VarId;

const UNIVERSE: [&str; 10] = [
    "Mercury", "Venus", "Earth", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune", "Pluto",
    "Ceres",
];

fn subset_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(any::<bool>(), UNIVERSE.len()).prop_map(|mask| {
        UNIVERSE
            .iter()
            .zip(mask)
            .filter(|(_, keep)| *keep)
            .map(|(name, _)| *name)
            .collect()
    })
}

fn finite_f64() -> impl Strategy<Value = f64> {
    // simple values keep the reference accumulation exact enough
    prop_oneof![
        Just(1.0),
        Just(-1.0),
        (-100i32..100).prop_map(|x| x as f64),
        (-100i32..100).prop_map(|x| x as f64 / 4.0),
    ]
}

fn nonzero_f64() -> impl Strategy<Value = f64> {
    finite_f64().prop_filter("nonzero", |x| *x != 0.0)
}

#[derive(Clone, Debug)]
enum Step {
    AddScaled(f64, u32),
    SubScaled(f64, u32),
    AddConst(f64),
    Scale(f64),
    Negate,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (nonzero_f64(), 0u32..5).prop_map(|(c, v)| Step::AddScaled(c, v)),
        (nonzero_f64(), 0u32..5).prop_map(|(c, v)| Step::SubScaled(c, v)),
        finite_f64().prop_map(Step::AddConst),
        nonzero_f64().prop_map(Step::Scale),
        Just(Step::Negate),
    ]
}

/// Build an expression step by step while tracking its coefficients and
/// constant directly.
fn build(steps: &[Step]) -> (Term, HashMap<u32, f64>, f64) {
    let mut term = Term::Var(VarId(0));
    let mut coeffs: HashMap<u32, f64> = HashMap::from([(0, 1.0)]);
    let mut constant = 0.0;
    for step in steps {
        term = match *step {
            Step::AddScaled(c, v) => {
                *coeffs.entry(v).or_default() += c;
                let scaled = Term::num(c).mul(Term::Var(VarId(v))).unwrap();
                term.add(scaled).unwrap()
            }
            Step::SubScaled(c, v) => {
                *coeffs.entry(v).or_default() -= c;
                let scaled = Term::num(c).mul(Term::Var(VarId(v))).unwrap();
                term.sub(scaled).unwrap()
            }
            Step::AddConst(k) => {
                constant += k;
                term.add(Term::num(k)).unwrap()
            }
            Step::Scale(c) => {
                coeffs.values_mut().for_each(|v| *v *= c);
                constant *= c;
                Term::num(c).mul(term).unwrap()
            }
            Step::Negate => {
                coeffs.values_mut().for_each(|v| *v = -*v);
                constant = -constant;
                term.neg().unwrap()
            }
        };
    }
    (term, coeffs, constant)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn set_algebra_laws(a in subset_strategy(), b in subset_strategy()) {
        let mut reg = IndexRegistry::new();
        reg.create_set("universe", &SetDecl::nominal(&UNIVERSE)).unwrap();
        let a = reg.create_set("a", &SetDecl::nominal(&a)).unwrap();
        let b = reg.create_set("b", &SetDecl::nominal(&b)).unwrap();

        let ab = reg.intersect(a, b).unwrap();
        let ba = reg.intersect(b, a).unwrap();
        prop_assert!(reg.equivalent(ab, ba));

        let a_or_b = reg.union(a, b).unwrap();
        let b_or_a = reg.union(b, a).unwrap();
        prop_assert!(reg.equivalent(a_or_b, b_or_a));

        let a_xor_b = reg.symmetric_difference(a, b).unwrap();
        let b_xor_a = reg.symmetric_difference(b, a).unwrap();
        prop_assert!(reg.equivalent(a_xor_b, b_xor_a));

        prop_assert_eq!(
            reg.set(a_or_b).len(),
            reg.set(a).len() + reg.set(b).len() - reg.set(ab).len()
        );
        prop_assert_eq!(
            reg.set(a_xor_b).len(),
            reg.set(a_or_b).len() - reg.set(ab).len()
        );
    }

    #[test]
    fn scalar_broadcast(n in 1usize..64, v in finite_f64()) {
        let mut reg = IndexRegistry::new();
        let i = reg.create_set("i", &SetDecl::ordinal(n)).unwrap();
        let p = Param::new("p", Shape::over(&reg, &[i]), v.into()).unwrap();
        prop_assert_eq!(p.coefficients(), vec![Value::Num(v); n]);
    }

    #[test]
    fn stretch_repeats_in_place(items in prop::collection::vec(0i32..100, 1..8), k in 1usize..5) {
        let stretched = stretch(&items, items.len() * k).unwrap();
        for (pos, item) in stretched.iter().enumerate() {
            prop_assert_eq!(*item, items[pos / k]);
        }
    }

    #[test]
    fn linear_extraction(a in nonzero_f64(), b in finite_f64()) {
        // a*x0 - x1 + b
        let e = Term::num(a)
            .mul(Term::Var(VarId(0)))
            .unwrap()
            .sub(Term::Var(VarId(1)))
            .unwrap()
            .add(Term::num(b))
            .unwrap();
        let flat = e.flatten();
        prop_assert_eq!(flat.coefficients(), vec![Value::Num(a), Value::Num(-1.0)]);
        prop_assert_eq!(flat.variable_positions(), vec![VarId(0), VarId(1)]);
        prop_assert_eq!(flat.bias_or_zero(), Value::Num(-b));
    }

    #[test]
    fn flatten_idempotent(steps in prop::collection::vec(step_strategy(), 0..16)) {
        let (term, _, _) = build(&steps);
        let flat = term.flatten();
        let again = flat.to_term().flatten();
        prop_assert_eq!(&flat, &again);
        prop_assert_eq!(flat.bias(), again.bias());
    }

    #[test]
    fn flatten_matches_reference(steps in prop::collection::vec(step_strategy(), 0..16)) {
        let (term, coeffs, constant) = build(&steps);
        let flat = term.flatten();

        let mut extracted: HashMap<u32, f64> = HashMap::new();
        for (c, id) in flat.terms() {
            *extracted.entry(id.index() as u32).or_default() += c.resolve(0.0);
        }
        for (var, expected) in coeffs.iter() {
            let got = extracted.get(var).copied().unwrap_or(0.0);
            prop_assert!(
                approx_eq!(f64, got, *expected, epsilon = 1e-6),
                "v{}: got {} expected {}", var, got, expected
            );
        }
        let bias = flat.bias_or_zero().resolve(0.0);
        prop_assert!(approx_eq!(f64, bias, -constant, epsilon = 1e-6));
    }
}
