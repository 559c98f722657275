// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Handing a model's sets, parameters and variables to a solver's own
//! modeling objects, keyed by the same names and in the same order as the
//! model declares them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::entity::Indexed;
use crate::index::{Key, SetId, Token};
use crate::model::Model;
use crate::variable::VarKind;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    Reals,
    NonNegativeReals,
    Integers,
    NonNegativeIntegers,
    Binary,
}

impl Domain {
    pub fn of(kind: VarKind, nonneg: bool) -> Domain {
        match (kind, nonneg) {
            (VarKind::Binary, _) => Domain::Binary,
            (VarKind::Integer, true) => Domain::NonNegativeIntegers,
            (VarKind::Integer, false) => Domain::Integers,
            (VarKind::Continuous, true) => Domain::NonNegativeReals,
            (VarKind::Continuous, false) => Domain::Reals,
        }
    }
}

/// The receiving side of a handoff. `index` names the sets a collection
/// is declared over; each key holds one element name per component.
pub trait SolverBackend {
    fn add_set(&mut self, name: &str, members: &[Vec<String>]) -> Result<()>;

    fn add_param(
        &mut self,
        name: &str,
        index: &[String],
        values: &[(Vec<String>, f64)],
    ) -> Result<()>;

    fn add_var(
        &mut self,
        name: &str,
        index: &[String],
        keys: &[Vec<String>],
        domain: Domain,
    ) -> Result<()>;
}

fn key_names(model: &Model, key: &Key) -> Vec<String> {
    key.iter()
        .filter_map(|t| match t {
            Token::Element(id) => Some(model.registry().element(*id).name().to_string()),
            Token::Skip => None,
        })
        .collect()
}

/// Feed every active set, parameter and variable collection of `model`
/// to `backend`, in declaration order.
pub fn export(model: &Model, backend: &mut dyn SolverBackend) -> Result<()> {
    let mut set_names: HashMap<SetId, &str> = HashMap::new();
    for entry in model.sets() {
        set_names.entry(*entry.value()).or_insert(entry.name());
        let members: Vec<Vec<String>> = model
            .registry()
            .set(*entry.value())
            .keys()
            .iter()
            .map(|k| key_names(model, k))
            .collect();
        backend.add_set(entry.name(), &members)?;
    }

    let index_of = |sets: &[SetId]| -> Vec<String> {
        sets.iter()
            .map(|set| match set_names.get(set) {
                Some(name) => name.to_string(),
                None => model.registry().set(*set).name().to_string(),
            })
            .collect()
    };

    let big_m = model.options().big_m;
    for entry in model.params() {
        let param = entry.value();
        let values: Vec<(Vec<String>, f64)> = param
            .shape()
            .keys()
            .iter()
            .zip(param.values().iter())
            .filter_map(|(key, v)| v.map(|v| (key_names(model, key), v.resolve(big_m))))
            .collect();
        backend.add_param(entry.name(), &index_of(param.shape().sets()), &values)?;
    }

    for entry in model.vars() {
        let collection = entry.value();
        let keys: Vec<Vec<String>> = collection
            .view()
            .vars()
            .iter()
            .flatten()
            .map(|id| key_names(model, model.element(*id).key()))
            .collect();
        let domain = Domain::of(collection.kind(), collection.is_nonneg());
        backend.add_var(
            entry.name(),
            &index_of(collection.shape().sets()),
            &keys,
            domain,
        )?;
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffSet {
    pub name: String,
    pub members: Vec<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffValue {
    pub key: Vec<String>,
    pub value: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffParam {
    pub name: String,
    pub index: Vec<String>,
    pub values: Vec<HandoffValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandoffVar {
    pub name: String,
    pub index: Vec<String>,
    pub keys: Vec<Vec<String>>,
    pub domain: Domain,
}

/// A serializable snapshot of everything a solver needs to rebuild the
/// model's declarations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffModel {
    pub name: String,
    pub sets: Vec<HandoffSet>,
    pub params: Vec<HandoffParam>,
    pub vars: Vec<HandoffVar>,
}

/// A backend that just records what it is given.
#[derive(Clone, Debug, Default)]
pub struct HandoffCollector {
    model: HandoffModel,
}

impl HandoffCollector {
    pub fn new(name: &str) -> Self {
        HandoffCollector {
            model: HandoffModel {
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn finish(self) -> HandoffModel {
        self.model
    }
}

impl SolverBackend for HandoffCollector {
    fn add_set(&mut self, name: &str, members: &[Vec<String>]) -> Result<()> {
        self.model.sets.push(HandoffSet {
            name: name.to_string(),
            members: members.to_vec(),
        });
        Ok(())
    }

    fn add_param(
        &mut self,
        name: &str,
        index: &[String],
        values: &[(Vec<String>, f64)],
    ) -> Result<()> {
        self.model.params.push(HandoffParam {
            name: name.to_string(),
            index: index.to_vec(),
            values: values
                .iter()
                .map(|(key, value)| HandoffValue {
                    key: key.clone(),
                    value: *value,
                })
                .collect(),
        });
        Ok(())
    }

    fn add_var(
        &mut self,
        name: &str,
        index: &[String],
        keys: &[Vec<String>],
        domain: Domain,
    ) -> Result<()> {
        self.model.vars.push(HandoffVar {
            name: name.to_string(),
            index: index.to_vec(),
            keys: keys.to_vec(),
            domain,
        });
        Ok(())
    }
}

pub fn collect(model: &Model) -> Result<HandoffModel> {
    let mut collector = HandoffCollector::new(model.name());
    export(model, &mut collector)?;
    Ok(collector.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::index::SetDecl;
    use crate::model::ModelOptions;

    #[test]
    fn test_collect() {
        let mut m = Model::new("plan", ModelOptions::default());
        let t = m.declare_set("t", &SetDecl::ordinal(2)).unwrap();
        let p = m
            .declare_set("plants", &SetDecl::nominal(&["North", "South"]))
            .unwrap();
        m.product("tp", &[t, p]).unwrap();
        m.declare_param("cap", &[p], vec![Value::Num(5.0), Value::big_m()])
            .unwrap();
        m.declare_var("make", &[t, p], VarKind::Integer, true).unwrap();
        m.declare_var("open", &[p], VarKind::Binary, false).unwrap();

        let handoff = collect(&m).unwrap();
        assert_eq!(handoff.name, "plan");
        let names: Vec<&str> = handoff.sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["t", "plants", "tp"]);
        assert_eq!(handoff.sets[2].members[1], vec!["0", "South"]);

        assert_eq!(handoff.params[0].index, vec!["plants"]);
        assert_eq!(handoff.params[0].values[1].value, 1e6);
        assert_eq!(handoff.params[0].values[1].key, vec!["South"]);

        assert_eq!(handoff.vars[0].index, vec!["t", "plants"]);
        assert_eq!(handoff.vars[0].keys.len(), 4);
        assert_eq!(handoff.vars[0].domain, Domain::NonNegativeIntegers);
        assert_eq!(handoff.vars[1].domain, Domain::Binary);

        let json = serde_json::to_string(&handoff).unwrap();
        let back: HandoffModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handoff);
    }
}
