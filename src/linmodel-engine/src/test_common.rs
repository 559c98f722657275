// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Common test infrastructure for building test models
//!
//! This module provides a builder-based API for declaring models in
//! tests and benchmarks without threading handles around.

use crate::common::Result;
use crate::constraint::{ConstraintSet, leq};
use crate::expr;
use crate::index::SetDecl;
use crate::model::{Model, ModelOptions, Selector};
use crate::objective::{Objective, maximize, minimize};
use crate::param::ParamValues;
use crate::variable::VarKind;

/// Builder for test models. Declaration failures panic with the name of
/// the offending entity.
pub struct TestModel {
    model: Model,
}

impl TestModel {
    /// Create a new test model builder with default options
    pub fn new(name: &str) -> Self {
        Self::with_options(name, ModelOptions::default())
    }

    pub fn with_options(name: &str, options: ModelOptions) -> Self {
        TestModel {
            model: Model::new(name, options),
        }
    }

    /// Add an ordinal set `0..size`
    pub fn ordinal_set(mut self, name: &str, size: usize) -> Self {
        self.model
            .declare_set(name, &SetDecl::ordinal(size))
            .unwrap_or_else(|err| panic!("declaring set {name}: {err}"));
        self
    }

    /// Add a nominal set with specific members
    pub fn nominal_set(mut self, name: &str, members: &[&str]) -> Self {
        self.model
            .declare_set(name, &SetDecl::nominal(members))
            .unwrap_or_else(|err| panic!("declaring set {name}: {err}"));
        self
    }

    /// Declare `name` as `source` shifted by `offset` (a lag when negative)
    pub fn shifted_set(mut self, name: &str, source: &str, offset: i64) -> Self {
        let source = self.sets(&[source])[0];
        self.model
            .shift(name, source, offset)
            .unwrap_or_else(|err| panic!("declaring set {name}: {err}"));
        self
    }

    fn sets(&self, names: &[&str]) -> Vec<crate::index::SetId> {
        names
            .iter()
            .map(|n| {
                self.model
                    .set(n)
                    .unwrap_or_else(|err| panic!("unknown set {n}: {err}"))
            })
            .collect()
    }

    pub fn param(mut self, name: &str, sets: &[&str], values: impl Into<ParamValues>) -> Self {
        let sets = self.sets(sets);
        self.model
            .declare_param(name, &sets, values)
            .unwrap_or_else(|err| panic!("declaring param {name}: {err}"));
        self
    }

    pub fn var(mut self, name: &str, sets: &[&str], kind: VarKind, nonneg: bool) -> Self {
        let sets = self.sets(sets);
        self.model
            .declare_var(name, &sets, kind, nonneg)
            .unwrap_or_else(|err| panic!("declaring var {name}: {err}"));
        self
    }

    /// Add a non-negative continuous variable collection
    pub fn nonneg(self, name: &str, sets: &[&str]) -> Self {
        self.var(name, sets, VarKind::Continuous, true)
    }

    /// Add a constraint built from the model declared so far
    pub fn constraint(
        mut self,
        name: &str,
        build: impl FnOnce(&Model) -> Result<ConstraintSet>,
    ) -> Self {
        let constraints =
            build(&self.model).unwrap_or_else(|err| panic!("building constraint {name}: {err}"));
        self.model
            .declare_constraint(name, constraints)
            .unwrap_or_else(|err| panic!("declaring constraint {name}: {err}"));
        self
    }

    pub fn objective(
        mut self,
        name: &str,
        build: impl FnOnce(&Model) -> Result<Objective>,
    ) -> Self {
        let objective =
            build(&self.model).unwrap_or_else(|err| panic!("building objective {name}: {err}"));
        self.model
            .declare_objective(name, objective)
            .unwrap_or_else(|err| panic!("declaring objective {name}: {err}"));
        self
    }

    pub fn build(self) -> Model {
        self.model
    }
}

/// Two products sharing two resources:
///
/// maximize 40 x0 + 30 x1
/// subject to x0 + x1 <= 12, 2 x0 + x1 <= 16, x >= 0
pub fn two_variable_lp() -> Model {
    TestModel::new("two_variable_lp")
        .ordinal_set("i", 2)
        .param("profit", &["i"], vec![40.0, 30.0])
        .param("labor", &["i"], vec![2.0, 1.0])
        .nonneg("x", &["i"])
        .constraint("land", |m| {
            let x = m.var_named("x")?;
            leq(&expr::sum(x)?, 12.0)
        })
        .constraint("labor_hours", |m| {
            let used = expr::mul(m.param_named("labor")?, m.var_named("x")?)?;
            leq(&expr::sum(&used)?, 16.0)
        })
        .objective("profit", |m| {
            maximize(&expr::mul(m.param_named("profit")?, m.var_named("x")?)?)
        })
        .build()
}

/// A transportation problem over `plants × markets`: one supply row per
/// plant and one demand row per market, each touching only its own slice
/// of the shipment columns.
pub fn transport_model(plants: usize, markets: usize) -> Model {
    let plant_names: Vec<String> = (0..plants).map(|p| format!("plant {p}")).collect();
    let plant_refs: Vec<&str> = plant_names.iter().map(|s| s.as_str()).collect();
    let cost: Vec<f64> = (0..plants * markets)
        .map(|k| 1.0 + (k % 7) as f64)
        .collect();

    let mut builder = TestModel::new("transport")
        .nominal_set("plants", &plant_refs)
        .ordinal_set("markets", markets)
        .param("cost", &["plants", "markets"], cost)
        .param("supply", &["plants"], 100.0)
        .param("demand", &["markets"], 10.0)
        .nonneg("ship", &["plants", "markets"]);

    for plant in plant_names.iter() {
        builder = builder.constraint(&format!("supply {plant}"), |m| {
            let markets = m.set("markets")?;
            let row = m.select_var(
                "ship",
                &[Selector::Name(plant.clone()), Selector::Set(markets)],
            )?;
            let cap = m.select_param("supply", &[Selector::Name(plant.clone())])?;
            leq(&expr::sum(&row)?, &cap)
        });
    }
    for market in 0..markets {
        builder = builder.constraint(&format!("demand {market}"), |m| {
            let (plants, markets) = (m.set("plants")?, m.set("markets")?);
            let column = m.select_var(
                "ship",
                &[Selector::Set(plants), Selector::At(markets, market)],
            )?;
            let need = m.select_param("demand", &[Selector::At(markets, market)])?;
            crate::constraint::geq(&expr::sum(&column)?, &need)
        });
    }

    builder
        .objective("cost", |m| {
            minimize(&expr::mul(m.param_named("cost")?, m.var_named("ship")?)?)
        })
        .build()
}
