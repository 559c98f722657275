// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The declaration registry.
//!
//! A [`Model`] owns the index registry and every declared set, parameter,
//! variable collection, constraint and objective. All of them share one
//! namespace keyed by canonical name. Each category numbers its
//! declarations in order, starting at zero; those ordinals become the `n`
//! in export labels.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::smallvec;

use crate::common::{Error, ErrorCode, ErrorKind, Ident, Result, canonicalize};
use crate::constraint::ConstraintSet;
use crate::entity::{Indexed, KeyIndex, Shape};
use crate::index::{ElementId, IndexRegistry, Key, SetDecl, SetId, Token, key_has_skip};
use crate::objective::Objective;
use crate::param::{Param, ParamValues};
use crate::variable::{Reader, VarCollection, VarElement, VarId, VarKind, VarView};
use crate::{decl_err, eprintln, index_err};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Allow a name to be declared again, replacing the earlier entity
    /// with a warning instead of failing.
    pub overwrite: bool,
    /// The number substituted for the Big-M sentinel when lowering.
    pub big_m: f64,
    /// Emit non-negativity constraints as rows instead of folding them
    /// into column bounds.
    pub keep_nonneg_rows: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        ModelOptions {
            overwrite: false,
            big_m: 1e6,
            keep_nonneg_rows: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Set,
    Param,
    Var,
    Constraint,
    Objective,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamHandle(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarHandle(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectiveHandle(usize);

macro_rules! handle_ordinal {
    ($($handle:ident),*) => {
        $(impl $handle {
            pub fn n(self) -> usize {
                self.0
            }
        })*
    };
}

handle_ordinal!(ParamHandle, VarHandle, ConstraintHandle, ObjectiveHandle);

/// A declared entity, with its ordinal within its category. Entries
/// replaced under `overwrite` stay in place but are no longer active.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry<T> {
    name: String,
    n: usize,
    active: bool,
    value: T,
}

impl<T> Entry<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Picks positions out of a declared collection. A list of selectors is
/// combined as a row-major Cartesian product.
#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    Set(SetId),
    Element(ElementId),
    /// A nominal element by name, or a declared set by name.
    Name(String),
    /// The element at a position of a set.
    At(SetId, usize),
}

#[derive(Clone, Debug, Default)]
pub struct Model {
    name: String,
    options: ModelOptions,
    registry: IndexRegistry,
    names: HashMap<Ident, (Category, usize)>,
    sets: Vec<Entry<SetId>>,
    params: Vec<Entry<Param>>,
    vars: Vec<Entry<VarCollection>>,
    elements: Vec<VarElement>,
    constraints: Vec<Entry<ConstraintSet>>,
    objectives: Vec<Entry<Objective>>,
    warnings: Vec<Error>,
}

fn active<T>(entries: &[Entry<T>]) -> impl Iterator<Item = &Entry<T>> {
    entries.iter().filter(|e| e.active)
}

impl Model {
    pub fn new(name: &str, options: ModelOptions) -> Model {
        Model {
            name: name.to_string(),
            options,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    /// Non-fatal problems found while declaring, in order.
    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    pub fn lookup(&self, name: &str) -> Option<(Category, usize)> {
        self.names.get(canonicalize(name).as_str()).copied()
    }

    fn next_ordinal(&self, category: Category) -> usize {
        match category {
            Category::Set => self.sets.len(),
            Category::Param => self.params.len(),
            Category::Var => self.vars.len(),
            Category::Constraint => self.constraints.len(),
            Category::Objective => self.objectives.len(),
        }
    }

    fn retire(&mut self, category: Category, n: usize) {
        match category {
            Category::Set => self.sets[n].active = false,
            Category::Param => self.params[n].active = false,
            Category::Var => self.vars[n].active = false,
            Category::Constraint => self.constraints[n].active = false,
            Category::Objective => self.objectives[n].active = false,
        }
    }

    /// Fail the way `claim` would, without changing anything.
    fn check_name(&self, name: &str) -> Result<Ident> {
        let ident = canonicalize(name);
        if ident.as_str().is_empty() {
            return decl_err!(Generic, "declarations need a non-empty name".to_string());
        }
        if let Some(&(previous, _)) = self.names.get(&ident) {
            if !self.options.overwrite {
                return decl_err!(
                    DuplicateName,
                    format!("'{name}' is already declared as a {previous:?}")
                );
            }
        }
        Ok(ident)
    }

    /// Reserve `name` for a new declaration and return its ordinal.
    fn claim(&mut self, name: &str, category: Category) -> Result<usize> {
        let ident = self.check_name(name)?;
        if let Some(&(previous, n)) = self.names.get(&ident) {
            self.retire(previous, n);
            let warning = Error::new(
                ErrorKind::DeclarationConflict,
                ErrorCode::DuplicateName,
                Some(format!("'{name}' redeclared, replacing the earlier {previous:?}")),
            );
            eprintln!("warning: {}", warning);
            self.warnings.push(warning);
        }
        let n = self.next_ordinal(category);
        self.names.insert(ident, (category, n));
        Ok(n)
    }

    fn resolve(&self, name: &str, category: Category) -> Result<usize> {
        match self.lookup(name) {
            Some((found, n)) if found == category => Ok(n),
            Some((found, _)) => decl_err!(
                UnknownName,
                format!("'{name}' is a {found:?}, not a {category:?}")
            ),
            None => decl_err!(UnknownName, format!("nothing named '{name}'")),
        }
    }

    fn entry<T>(name: String, n: usize, value: T) -> Entry<T> {
        Entry {
            name,
            n,
            active: true,
            value,
        }
    }

    // index sets

    /// Build a set in the registry and name it. A taken name or a failed
    /// construction leaves the registry as it was.
    fn declare_set_with(
        &mut self,
        name: &str,
        build: impl FnOnce(&mut IndexRegistry) -> Result<SetId>,
    ) -> Result<SetId> {
        self.check_name(name)?;
        let mark = self.registry.mark();
        let set = match build(&mut self.registry) {
            Ok(set) => set,
            Err(err) => {
                self.registry.rollback(mark);
                return Err(err);
            }
        };
        let n = self.claim(name, Category::Set)?;
        self.sets.push(Model::entry(name.to_string(), n, set));
        Ok(set)
    }

    pub fn declare_set(&mut self, name: &str, decl: &SetDecl) -> Result<SetId> {
        self.declare_set_with(name, |registry| registry.create_set(name, decl))
    }

    pub fn set(&self, name: &str) -> Result<SetId> {
        let n = self.resolve(name, Category::Set)?;
        Ok(self.sets[n].value)
    }

    pub fn sets(&self) -> impl Iterator<Item = &Entry<SetId>> {
        active(&self.sets)
    }

    pub fn intersect(&mut self, name: &str, a: SetId, b: SetId) -> Result<SetId> {
        self.declare_set_with(name, |registry| registry.intersect(a, b))
    }

    pub fn union(&mut self, name: &str, a: SetId, b: SetId) -> Result<SetId> {
        self.declare_set_with(name, |registry| registry.union(a, b))
    }

    pub fn symmetric_difference(&mut self, name: &str, a: SetId, b: SetId) -> Result<SetId> {
        self.declare_set_with(name, |registry| registry.symmetric_difference(a, b))
    }

    pub fn difference(&mut self, name: &str, a: SetId, b: SetId) -> Result<SetId> {
        self.declare_set_with(name, |registry| registry.difference(a, b))
    }

    /// The Cartesian product of `sets`, left to right.
    pub fn product(&mut self, name: &str, sets: &[SetId]) -> Result<SetId> {
        self.declare_set_with(name, |registry| {
            let Some((&first, rest)) = sets.split_first() else {
                return index_err!(
                    EmptySetDecl,
                    format!("product '{name}' needs at least one set")
                );
            };
            rest.iter()
                .try_fold(first, |acc, &next| registry.product(acc, next))
        })
    }

    /// A lagged (`offset < 0`) or lead view of an ordinal set.
    pub fn shift(&mut self, name: &str, set: SetId, offset: i64) -> Result<SetId> {
        self.declare_set_with(name, |registry| registry.shift(set, offset))
    }

    // parameters

    pub fn declare_param(
        &mut self,
        name: &str,
        sets: &[SetId],
        values: impl Into<ParamValues>,
    ) -> Result<ParamHandle> {
        let param = Param::new(name, Shape::over(&self.registry, sets), values.into())?;
        let n = self.claim(name, Category::Param)?;
        self.params.push(Model::entry(name.to_string(), n, param));
        Ok(ParamHandle(n))
    }

    pub fn param(&self, handle: ParamHandle) -> &Param {
        &self.params[handle.0].value
    }

    pub fn param_named(&self, name: &str) -> Result<&Param> {
        let n = self.resolve(name, Category::Param)?;
        Ok(&self.params[n].value)
    }

    pub fn params(&self) -> impl Iterator<Item = &Entry<Param>> {
        active(&self.params)
    }

    pub fn select_param(&self, name: &str, selectors: &[Selector]) -> Result<Param> {
        let param = self.param_named(name)?;
        let index = KeyIndex::new(param.shape());
        let (shape, positions) = self.select(name, param.shape(), &index, selectors)?;
        Ok(param.select(shape, &positions))
    }

    // variables

    pub fn declare_var(
        &mut self,
        name: &str,
        sets: &[SetId],
        kind: VarKind,
        nonneg: bool,
    ) -> Result<VarHandle> {
        let shape = Shape::over(&self.registry, sets);
        let n = self.next_ordinal(Category::Var);
        let (collection, elements) =
            VarCollection::realize(name, n, shape, kind, nonneg, self.elements.len());
        let n = self.claim(name, Category::Var)?;
        self.elements.extend(elements);
        self.vars.push(Model::entry(name.to_string(), n, collection));
        Ok(VarHandle(n))
    }

    pub fn var(&self, handle: VarHandle) -> &VarView {
        self.vars[handle.0].value.view()
    }

    pub fn var_collection(&self, handle: VarHandle) -> &VarCollection {
        &self.vars[handle.0].value
    }

    pub fn var_named(&self, name: &str) -> Result<&VarView> {
        let n = self.resolve(name, Category::Var)?;
        Ok(self.vars[n].value.view())
    }

    pub fn vars(&self) -> impl Iterator<Item = &Entry<VarCollection>> {
        active(&self.vars)
    }

    pub fn element(&self, id: VarId) -> &VarElement {
        &self.elements[id.index()]
    }

    /// Every variable element ever realized, including those of replaced
    /// collections.
    pub fn elements(&self) -> &[VarElement] {
        &self.elements
    }

    pub fn select_var(&self, name: &str, selectors: &[Selector]) -> Result<VarView> {
        let n = self.resolve(name, Category::Var)?;
        let collection = &self.vars[n].value;
        let view = collection.view();
        let (shape, positions) =
            self.select(name, view.shape(), collection.key_index(), selectors)?;
        Ok(view.select(shape, &positions))
    }

    fn selector_keys(&self, selector: &Selector) -> Result<(Option<SetId>, Vec<Key>)> {
        match selector {
            Selector::Set(set) => Ok((Some(*set), self.registry.set(*set).keys().to_vec())),
            Selector::Element(id) => Ok((None, vec![smallvec![Token::Element(*id)]])),
            Selector::At(set, pos) => match self.registry.set(*set).keys().get(*pos) {
                Some(key) => Ok((None, vec![key.clone()])),
                None => index_err!(
                    BadKey,
                    format!(
                        "position {pos} is past the end of '{}'",
                        self.registry.set(*set).name()
                    )
                ),
            },
            Selector::Name(name) => {
                if let Some(id) = self.registry.find_element(name) {
                    return Ok((None, vec![smallvec![Token::Element(id)]]));
                }
                match self.lookup(name) {
                    Some((Category::Set, n)) => {
                        let set = self.sets[n].value;
                        Ok((Some(set), self.registry.set(set).keys().to_vec()))
                    }
                    _ => index_err!(UnknownElement, format!("no element or set named '{name}'")),
                }
            }
        }
    }

    fn select(
        &self,
        name: &str,
        shape: &Shape,
        index: &KeyIndex,
        selectors: &[Selector],
    ) -> Result<(Shape, Vec<Option<usize>>)> {
        let arity = shape.keys().first().map_or(0, |k| k.len());
        let mut sets = Vec::new();
        let mut keys: Vec<Key> = vec![Key::new()];
        for selector in selectors {
            let (set, suffixes) = self.selector_keys(selector)?;
            sets.extend(set);
            let mut next = Vec::with_capacity(keys.len() * suffixes.len());
            for prefix in keys.iter() {
                for suffix in suffixes.iter() {
                    let mut key = prefix.clone();
                    key.extend_from_slice(suffix);
                    next.push(key);
                }
            }
            keys = next;
        }

        let mut positions = Vec::with_capacity(keys.len());
        for key in keys.iter() {
            if key.len() != arity {
                return index_err!(
                    BadKey,
                    format!(
                        "'{name}' is indexed by {arity} components, got {}",
                        key.len()
                    )
                );
            }
            if key_has_skip(key) {
                positions.push(None);
                continue;
            }
            match index.position(key) {
                Some(pos) => positions.push(Some(pos)),
                None => {
                    return index_err!(
                        BadKey,
                        format!("'{name}' has no entry at ({})", self.registry.key_label(key))
                    );
                }
            }
        }
        Ok((Shape::from_keys(&sets, keys), positions))
    }

    // constraints and objectives

    pub fn declare_constraint(
        &mut self,
        name: &str,
        constraints: ConstraintSet,
    ) -> Result<ConstraintHandle> {
        let n = self.claim(name, Category::Constraint)?;
        for c in constraints.constraints() {
            for id in c.variable_positions() {
                self.elements[id.index()].add_reader(Reader::Constraint(n, c.position()));
            }
        }
        self.constraints
            .push(Model::entry(name.to_string(), n, constraints));
        Ok(ConstraintHandle(n))
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> &ConstraintSet {
        &self.constraints[handle.0].value
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Entry<ConstraintSet>> {
        active(&self.constraints)
    }

    pub fn declare_objective(&mut self, name: &str, objective: Objective) -> Result<ObjectiveHandle> {
        let n = self.claim(name, Category::Objective)?;
        for id in objective.variable_positions() {
            self.elements[id.index()].add_reader(Reader::Objective(n));
        }
        self.objectives
            .push(Model::entry(name.to_string(), n, objective));
        Ok(ObjectiveHandle(n))
    }

    pub fn objective(&self, handle: ObjectiveHandle) -> &Objective {
        &self.objectives[handle.0].value
    }

    pub fn objectives(&self) -> impl Iterator<Item = &Entry<Objective>> {
        active(&self.objectives)
    }
}
