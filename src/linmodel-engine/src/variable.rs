// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::entity::{Indexed, KeyIndex, Shape};
use crate::index::{Key, key_has_skip};

/// A single decision variable, one per position of a declared collection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    #[default]
    Continuous,
    Integer,
    Binary,
}

/// Something that reads a variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reader {
    /// `(constraint ordinal, position within the constraint collection)`
    Constraint(usize, usize),
    Objective(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarElement {
    id: VarId,
    collection: usize,
    key: Key,
    kind: VarKind,
    nonneg: bool,
    readers: Vec<Reader>,
}

impl VarElement {
    pub fn id(&self) -> VarId {
        self.id
    }

    /// Ordinal of the collection this element was declared in.
    pub fn collection(&self) -> usize {
        self.collection
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn kind(&self) -> VarKind {
        self.kind
    }

    pub fn is_nonneg(&self) -> bool {
        self.nonneg
    }

    pub fn is_integer(&self) -> bool {
        self.kind != VarKind::Continuous
    }

    pub fn readers(&self) -> &[Reader] {
        &self.readers
    }

    /// Readers arrive grouped by declaration, so a repeat can only be the
    /// most recent one.
    pub(crate) fn add_reader(&mut self, reader: Reader) {
        if self.readers.last() != Some(&reader) {
            self.readers.push(reader);
        }
    }
}

/// A declared, indexed collection of decision variables.
#[derive(Clone, Debug, PartialEq)]
pub struct VarCollection {
    name: Rc<str>,
    n: usize,
    kind: VarKind,
    nonneg: bool,
    index: KeyIndex,
    view: VarView,
}

impl VarCollection {
    /// Realize one element per non-skip position, with ids starting at
    /// `first_id`. The new elements are returned for the model to own.
    pub(crate) fn realize(
        name: &str,
        n: usize,
        shape: Shape,
        kind: VarKind,
        nonneg: bool,
        first_id: usize,
    ) -> (VarCollection, Vec<VarElement>) {
        // binary variables are always non-negative
        let nonneg = nonneg || kind == VarKind::Binary;
        let mut elements = Vec::with_capacity(shape.len());
        let vars = shape
            .keys()
            .iter()
            .map(|key| {
                if key_has_skip(key) {
                    return None;
                }
                let id = VarId((first_id + elements.len()) as u32);
                elements.push(VarElement {
                    id,
                    collection: n,
                    key: key.clone(),
                    kind,
                    nonneg,
                    readers: vec![],
                });
                Some(id)
            })
            .collect();
        let name: Rc<str> = name.into();
        let collection = VarCollection {
            name: name.clone(),
            n,
            kind,
            nonneg,
            index: KeyIndex::new(&shape),
            view: VarView { name, shape, vars },
        };
        (collection, elements)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn kind(&self) -> VarKind {
        self.kind
    }

    pub fn is_nonneg(&self) -> bool {
        self.nonneg
    }

    /// The whole collection as a view.
    pub fn view(&self) -> &VarView {
        &self.view
    }

    /// Key to position lookup over the whole collection.
    pub(crate) fn key_index(&self) -> &KeyIndex {
        &self.index
    }
}

impl Indexed for VarCollection {
    fn shape(&self) -> &Shape {
        &self.view.shape
    }
}

/// A window onto a variable collection: some of its positions, in some
/// order. Views share the underlying elements, so `x(i, 0)` names the same
/// decision variable however many views reach it. `None` marks a position
/// whose key contained a skip token.
#[derive(Clone, Debug, PartialEq)]
pub struct VarView {
    name: Rc<str>,
    shape: Shape,
    vars: Vec<Option<VarId>>,
}

impl VarView {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vars(&self) -> &[Option<VarId>] {
        &self.vars
    }

    pub fn get(&self, pos: usize) -> Option<VarId> {
        self.vars.get(pos).copied().flatten()
    }

    pub(crate) fn select(&self, shape: Shape, positions: &[Option<usize>]) -> VarView {
        VarView {
            name: self.name.clone(),
            shape,
            vars: positions
                .iter()
                .map(|p| p.and_then(|p| self.vars[p]))
                .collect(),
        }
    }
}

impl Indexed for VarView {
    fn shape(&self) -> &Shape {
        &self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexRegistry, SetDecl};

    #[test]
    fn test_realize() {
        let mut reg = IndexRegistry::new();
        let i = reg.create_set("i", &SetDecl::ordinal(3)).unwrap();
        let shape = Shape::over(&reg, &[i]);
        let (x, elements) = VarCollection::realize("x", 0, shape, VarKind::Binary, false, 5);
        assert!(x.is_nonneg());
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].id(), VarId(5));
        assert!(elements.iter().all(|e| e.is_nonneg() && e.is_integer()));
        assert_eq!(x.view().get(2), Some(VarId(7)));
        assert_eq!(x.len(), 3);
    }

    #[test]
    fn test_views_share_elements() {
        let mut reg = IndexRegistry::new();
        let i = reg.create_set("i", &SetDecl::ordinal(3)).unwrap();
        let shape = Shape::over(&reg, &[i]);
        let (x, _) = VarCollection::realize("x", 0, shape, VarKind::Continuous, true, 0);

        let last = reg.set(i).keys()[2].clone();
        let pos = x.key_index().position(&last).unwrap();
        let one = x
            .view()
            .select(Shape::from_keys(&[], vec![last.clone()]), &[Some(pos)]);
        let two = x
            .view()
            .select(Shape::from_keys(&[], vec![last]), &[Some(pos)]);
        assert_eq!(one.get(0), two.get(0));
        assert_eq!(one.get(0), x.view().get(2));

        let absent = x.view().select(Shape::scalar(), &[None]);
        assert_eq!(absent.get(0), None);
    }

    #[test]
    fn test_readers_deduplicated() {
        let mut reg = IndexRegistry::new();
        let i = reg.create_set("i", &SetDecl::ordinal(1)).unwrap();
        let (_, mut elements) =
            VarCollection::realize("x", 0, Shape::over(&reg, &[i]), VarKind::Integer, false, 0);
        elements[0].add_reader(Reader::Objective(0));
        elements[0].add_reader(Reader::Objective(0));
        elements[0].add_reader(Reader::Constraint(1, 0));
        elements[0].add_reader(Reader::Constraint(1, 0));
        assert_eq!(
            elements[0].readers(),
            &[Reader::Objective(0), Reader::Constraint(1, 0)]
        );
        assert!(!elements[0].is_nonneg());
    }
}
