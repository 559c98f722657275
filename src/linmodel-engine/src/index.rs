// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Index elements, index sets and the algebra between them.
//!
//! Elements live in a single [`IndexRegistry`] and are referred to by a
//! stable [`ElementId`]. Nominal elements are keyed by canonical name, so
//! declaring `"Jupiter"` in both a `giants` set and a `voyager_visited` set
//! yields one element that records both owners. Ordinal elements are made
//! from an integer range, belong to exactly the set that created them, and
//! sit at the position equal to their value.
//!
//! A set is an ordered list of [`Key`]s. Plain sets have keys of length one;
//! Cartesian products concatenate keys. A key may contain a
//! [`Token::Skip`] placeholder, produced by shifting an ordinal set past its
//! boundary, which downstream code treats as "absent".

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::common::{Ident, Result, canonicalize};
use crate::index_err;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u32);

impl ElementId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(u32);

impl SetId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    Element(ElementId),
    Skip,
}

/// A (possibly composite) index: one token per component set.
pub type Key = SmallVec<[Token; 4]>;

pub fn key_has_skip(key: &[Token]) -> bool {
    key.contains(&Token::Skip)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Ordinal(i64),
    Nominal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexElement {
    id: ElementId,
    name: String,
    ident: Ident,
    kind: ElementKind,
    owners: Vec<(SetId, usize)>,
}

impl IndexElement {
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// The name as it was first declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ident(&self) -> &Ident {
        &self.ident
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Every `(set, position)` this element has been attached to, in
    /// attachment order.
    pub fn owners(&self) -> &[(SetId, usize)] {
        &self.owners
    }

    pub fn position_in(&self, set: SetId) -> Option<usize> {
        self.owners
            .iter()
            .find(|(owner, _)| *owner == set)
            .map(|(_, pos)| *pos)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SetRole {
    Ordinal,
    Nominal,
    Product,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexSet {
    id: SetId,
    name: String,
    role: SetRole,
    arity: usize,
    keys: Vec<Key>,
}

impl IndexSet {
    pub fn id(&self) -> SetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> SetRole {
        self.role
    }

    /// Number of tokens in each key.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn has_skips(&self) -> bool {
        self.keys.iter().any(|k| key_has_skip(k))
    }

    /// Elements of a one-dimensional set, skipping placeholders.
    pub fn elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.keys.iter().filter_map(|k| match k.as_slice() {
            [Token::Element(id)] => Some(*id),
            _ => None,
        })
    }

    fn members(&self) -> HashSet<&Key> {
        self.keys.iter().collect()
    }
}

/// How a named set is declared: either from an integer size (an ordinal
/// set `0..size`) or from an explicit list of member names, never both.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SetDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

impl SetDecl {
    pub fn ordinal(size: usize) -> Self {
        SetDecl {
            size: Some(size),
            members: None,
        }
    }

    pub fn nominal(members: &[&str]) -> Self {
        SetDecl {
            size: None,
            members: Some(members.iter().map(|m| m.to_string()).collect()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SetOp {
    Intersect,
    Union,
    SymmetricDifference,
    Difference,
}

impl SetOp {
    fn symbol(self) -> &'static str {
        match self {
            SetOp::Intersect => "&",
            SetOp::Union => "|",
            SetOp::SymmetricDifference => "^",
            SetOp::Difference => "-",
        }
    }
}

/// The registry's extent at some point, for undoing a failed declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Mark {
    elements: usize,
    sets: usize,
}

#[derive(Clone, Debug, Default)]
pub struct IndexRegistry {
    elements: Vec<IndexElement>,
    by_name: HashMap<Ident, ElementId>,
    sets: Vec<IndexSet>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn element(&self, id: ElementId) -> &IndexElement {
        &self.elements[id.index()]
    }

    pub fn set(&self, id: SetId) -> &IndexSet {
        &self.sets[id.index()]
    }

    pub fn sets(&self) -> &[IndexSet] {
        &self.sets
    }

    pub(crate) fn mark(&self) -> Mark {
        Mark {
            elements: self.elements.len(),
            sets: self.sets.len(),
        }
    }

    /// Forget every set and element created since `mark`, including the
    /// owner entries they added to older elements.
    pub(crate) fn rollback(&mut self, mark: Mark) {
        if self.sets.len() == mark.sets && self.elements.len() == mark.elements {
            return;
        }
        self.sets.truncate(mark.sets);
        self.elements.truncate(mark.elements);
        self.by_name.retain(|_, id| id.index() < mark.elements);
        for element in self.elements.iter_mut() {
            element.owners.retain(|(set, _)| set.index() < mark.sets);
        }
    }

    /// Look up a nominal element by (raw or canonical) name.
    pub fn find_element(&self, name: &str) -> Option<ElementId> {
        self.by_name.get(canonicalize(name).as_str()).copied()
    }

    pub fn create_set(&mut self, name: &str, decl: &SetDecl) -> Result<SetId> {
        match (decl.size, &decl.members) {
            (Some(_), Some(_)) => index_err!(
                SizeAndMembers,
                format!("set '{name}' given both a size and explicit members")
            ),
            (None, None) => index_err!(
                EmptySetDecl,
                format!("set '{name}' needs either a size or members")
            ),
            (Some(size), None) => Ok(self.create_ordinal(name, size)),
            (None, Some(members)) => self.create_nominal(name, members),
        }
    }

    fn next_set_id(&self) -> SetId {
        SetId(self.sets.len() as u32)
    }

    fn create_ordinal(&mut self, name: &str, size: usize) -> SetId {
        let set_id = self.next_set_id();
        let mut keys = Vec::with_capacity(size);
        for value in 0..size {
            let id = ElementId(self.elements.len() as u32);
            self.elements.push(IndexElement {
                id,
                name: value.to_string(),
                ident: Ident::from_unchecked(value.to_string()),
                kind: ElementKind::Ordinal(value as i64),
                owners: vec![(set_id, value)],
            });
            keys.push(smallvec::smallvec![Token::Element(id)]);
        }
        self.sets.push(IndexSet {
            id: set_id,
            name: name.to_string(),
            role: SetRole::Ordinal,
            arity: 1,
            keys,
        });
        set_id
    }

    fn create_nominal(&mut self, name: &str, members: &[String]) -> Result<SetId> {
        let mut seen: HashSet<Ident> = HashSet::with_capacity(members.len());
        for member in members {
            if !seen.insert(canonicalize(member)) {
                return index_err!(
                    DuplicateElement,
                    format!("'{member}' listed twice in set '{name}'")
                );
            }
        }

        let set_id = self.next_set_id();
        let mut keys = Vec::with_capacity(members.len());
        for (pos, member) in members.iter().enumerate() {
            let ident = canonicalize(member);
            let id = match self.by_name.get(&ident) {
                Some(&existing) => {
                    self.elements[existing.index()].owners.push((set_id, pos));
                    existing
                }
                None => {
                    let id = ElementId(self.elements.len() as u32);
                    self.elements.push(IndexElement {
                        id,
                        name: member.trim().to_string(),
                        ident: ident.clone(),
                        kind: ElementKind::Nominal,
                        owners: vec![(set_id, pos)],
                    });
                    self.by_name.insert(ident, id);
                    id
                }
            };
            keys.push(smallvec::smallvec![Token::Element(id)]);
        }
        self.sets.push(IndexSet {
            id: set_id,
            name: name.to_string(),
            role: SetRole::Nominal,
            arity: 1,
            keys,
        });
        Ok(set_id)
    }

    /// Register a derived set and attach its nominal elements to it.
    fn push_derived(&mut self, name: String, role: SetRole, arity: usize, keys: Vec<Key>) -> SetId {
        let set_id = self.next_set_id();
        if arity == 1 {
            for (pos, key) in keys.iter().enumerate() {
                if let [Token::Element(id)] = key.as_slice() {
                    let element = &mut self.elements[id.index()];
                    // ordinal elements keep their single owning range
                    if element.kind == ElementKind::Nominal {
                        element.owners.push((set_id, pos));
                    }
                }
            }
        }
        self.sets.push(IndexSet {
            id: set_id,
            name,
            role,
            arity,
            keys,
        });
        set_id
    }

    fn check_compatible(&self, a: SetId, b: SetId, op: &str) -> Result<()> {
        let (sa, sb) = (self.set(a), self.set(b));
        if sa.arity != sb.arity || sa.role != sb.role {
            return index_err!(
                IncompatibleRoles,
                format!(
                    "'{}' and '{}' have different roles and cannot be combined with {op}",
                    sa.name, sb.name
                )
            );
        }
        if sa.has_skips() || sb.has_skips() {
            return index_err!(
                IncompatibleRoles,
                format!("shifted sets cannot be combined with {op}")
            );
        }
        Ok(())
    }

    fn combine(&mut self, a: SetId, b: SetId, op: SetOp) -> Result<SetId> {
        self.check_compatible(a, b, op.symbol())?;
        let (sa, sb) = (self.set(a), self.set(b));
        let (in_a, in_b) = (sa.members(), sb.members());

        let only_a = sa.keys.iter().filter(|k| !in_b.contains(k));
        let only_b = sb.keys.iter().filter(|k| !in_a.contains(k));
        let keys: Vec<Key> = match op {
            SetOp::Intersect => sa.keys.iter().filter(|k| in_b.contains(k)).cloned().collect(),
            SetOp::Union => sa.keys.iter().chain(only_b).cloned().collect(),
            SetOp::SymmetricDifference => only_a.chain(only_b).cloned().collect(),
            SetOp::Difference => only_a.cloned().collect(),
        };

        let name = format!("({} {} {})", sa.name, op.symbol(), sb.name);
        let (role, arity) = (sa.role, sa.arity);
        Ok(self.push_derived(name, role, arity, keys))
    }

    pub fn intersect(&mut self, a: SetId, b: SetId) -> Result<SetId> {
        self.combine(a, b, SetOp::Intersect)
    }

    pub fn union(&mut self, a: SetId, b: SetId) -> Result<SetId> {
        self.combine(a, b, SetOp::Union)
    }

    pub fn symmetric_difference(&mut self, a: SetId, b: SetId) -> Result<SetId> {
        self.combine(a, b, SetOp::SymmetricDifference)
    }

    pub fn difference(&mut self, a: SetId, b: SetId) -> Result<SetId> {
        self.combine(a, b, SetOp::Difference)
    }

    /// The Cartesian product `a × b`, ordered row-major (`b` varies fastest).
    pub fn product(&mut self, a: SetId, b: SetId) -> Result<SetId> {
        if a != b {
            let in_a: HashSet<Token> = self.set(a).keys.iter().flatten().copied().collect();
            let shared = self
                .set(b)
                .keys
                .iter()
                .flatten()
                .any(|t| *t != Token::Skip && in_a.contains(t));
            if shared {
                return index_err!(
                    IncompatibleRoles,
                    format!(
                        "'{}' and '{}' share elements and cannot be multiplied",
                        self.set(a).name,
                        self.set(b).name
                    )
                );
            }
        }

        let keys = self.product_keys(&[a, b]);
        let name = format!("{}*{}", self.set(a).name, self.set(b).name);
        let arity = self.set(a).arity + self.set(b).arity;
        Ok(self.push_derived(name, SetRole::Product, arity, keys))
    }

    /// The row-major Cartesian product of the keys of `sets`. The empty
    /// product is the single empty key that indexes a scalar.
    pub fn product_keys(&self, sets: &[SetId]) -> Vec<Key> {
        let mut keys: Vec<Key> = vec![Key::new()];
        for &set in sets {
            let rhs = &self.set(set).keys;
            let mut next = Vec::with_capacity(keys.len() * rhs.len());
            for prefix in keys.iter() {
                for suffix in rhs.iter() {
                    let mut key = prefix.clone();
                    key.extend_from_slice(suffix);
                    next.push(key);
                }
            }
            keys = next;
        }
        keys
    }

    /// A lag/lead view of an ordinal set: position `p` holds the element
    /// whose value is `value(p) + offset` in the same range, or a skip
    /// placeholder past either end of the range.
    pub fn shift(&mut self, set: SetId, offset: i64) -> Result<SetId> {
        let source = self.set(set);
        if source.role != SetRole::Ordinal || source.arity != 1 {
            return index_err!(
                NotOrdinal,
                format!("only ordinal sets can be shifted, '{}' is not", source.name)
            );
        }

        let keys: Vec<Key> = source
            .keys
            .iter()
            .map(|key| {
                let token = match key[0] {
                    Token::Element(id) => self.shifted(id, offset),
                    Token::Skip => Token::Skip,
                };
                smallvec::smallvec![token]
            })
            .collect();

        let name = if offset < 0 {
            format!("{}{}", source.name, offset)
        } else {
            format!("{}+{}", source.name, offset)
        };
        Ok(self.push_derived(name, SetRole::Ordinal, 1, keys))
    }

    fn shifted(&self, id: ElementId, offset: i64) -> Token {
        let element = self.element(id);
        let (ElementKind::Ordinal(value), Some(&(range, _))) = (element.kind, element.owners.first())
        else {
            return Token::Skip;
        };
        let target = value + offset;
        let range = self.set(range);
        if target < 0 || target as usize >= range.len() {
            Token::Skip
        } else {
            range.keys[target as usize][0]
        }
    }

    /// Whether two sets contain the same keys, ignoring order.
    pub fn equivalent(&self, a: SetId, b: SetId) -> bool {
        let sa: BTreeSet<&Key> = self.set(a).keys.iter().collect();
        let sb: BTreeSet<&Key> = self.set(b).keys.iter().collect();
        sa == sb
    }

    /// Every set an element has been attached to.
    pub fn sets_containing(&self, id: ElementId) -> Vec<SetId> {
        self.element(id).owners.iter().map(|(set, _)| *set).collect()
    }

    /// A human readable rendering of a key, e.g. `jupiter,3`; skip
    /// placeholders render as `_`.
    pub fn key_label(&self, key: &[Token]) -> String {
        key.iter()
            .map(|t| match t {
                Token::Element(id) => self.element(*id).name.as_str(),
                Token::Skip => "_",
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}
