// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Shared indexing machinery for parameters, variables and expressions.
//!
//! Every indexed entity is laid out over a [`Shape`]: the ordered list of
//! keys it is defined at. A scalar has exactly one empty key. Declared
//! collections additionally carry a [`KeyIndex`] for key -> position
//! lookups when a caller selects a sub-view.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::card_err;
use crate::common::Result;
use crate::index::{IndexRegistry, Key, SetId, Token, key_has_skip};

#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    sets: SmallVec<[SetId; 4]>,
    keys: Vec<Key>,
}

impl Shape {
    pub fn scalar() -> Self {
        Shape {
            sets: SmallVec::new(),
            keys: vec![Key::new()],
        }
    }

    /// The row-major product of `sets`.
    pub fn over(registry: &IndexRegistry, sets: &[SetId]) -> Self {
        Shape {
            sets: sets.iter().copied().collect(),
            keys: registry.product_keys(sets),
        }
    }

    /// A shape made of explicit keys, as produced by a selection.
    pub fn from_keys(sets: &[SetId], keys: Vec<Key>) -> Self {
        Shape {
            sets: sets.iter().copied().collect(),
            keys,
        }
    }

    pub fn sets(&self) -> &[SetId] {
        &self.sets
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.keys.len() == 1 && self.keys[0].is_empty()
    }

    /// This shape repeated element-for-element to `len` positions.
    pub fn stretched(&self, len: usize) -> Result<Shape> {
        Ok(Shape {
            sets: self.sets.clone(),
            keys: stretch(&self.keys, len)?,
        })
    }
}

/// Implemented by everything that is laid out over a [`Shape`].
pub trait Indexed {
    fn shape(&self) -> &Shape;

    fn len(&self) -> usize {
        self.shape().len()
    }

    fn is_empty(&self) -> bool {
        self.shape().is_empty()
    }
}

/// Key -> position lookup for a declared collection. Keys containing a
/// skip token are never indexed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyIndex {
    positions: HashMap<Key, usize>,
}

impl KeyIndex {
    pub fn new(shape: &Shape) -> Self {
        let positions = shape
            .keys()
            .iter()
            .enumerate()
            .filter(|(_, key)| !key_has_skip(key))
            .map(|(pos, key)| (key.clone(), pos))
            .collect();
        KeyIndex { positions }
    }

    pub fn position(&self, key: &[Token]) -> Option<usize> {
        self.positions.get(key).copied()
    }
}

/// The common length two operands are stretched to, or a
/// cardinality error when neither length divides the other.
pub fn broadcast_len(a: usize, b: usize) -> Result<usize> {
    let (short, long) = if a <= b { (a, b) } else { (b, a) };
    if short == long || (short != 0 && long % short == 0) {
        Ok(long)
    } else {
        card_err!(format!("lengths {a} and {b} cannot be broadcast together"))
    }
}

/// Repeat each item of `items` in place so the result has `len` entries:
/// `[a, b]` stretched to 4 is `[a, a, b, b]`. This lines a collection over
/// `I` up with one over `I × J`, whose keys are ordered row-major.
pub fn stretch<T: Clone>(items: &[T], len: usize) -> Result<Vec<T>> {
    if items.len() == len {
        return Ok(items.to_vec());
    }
    if items.is_empty() || len % items.len() != 0 {
        return card_err!(format!(
            "cannot stretch {} values to {len} positions",
            items.len()
        ));
    }
    let factor = len / items.len();
    Ok(items
        .iter()
        .flat_map(|item| std::iter::repeat_n(item, factor))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use crate::index::SetDecl;

    #[test]
    fn test_stretch_is_element_for_element() {
        assert_eq!(stretch(&[1, 2], 4).unwrap(), vec![1, 1, 2, 2]);
        assert_eq!(stretch(&[7], 3).unwrap(), vec![7, 7, 7]);
        assert_eq!(stretch(&[1, 2, 3], 3).unwrap(), vec![1, 2, 3]);
        let err = stretch(&[1, 2], 3).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CardinalityMismatch);
    }

    #[test]
    fn test_broadcast_len() {
        assert_eq!(broadcast_len(2, 6).unwrap(), 6);
        assert_eq!(broadcast_len(6, 2).unwrap(), 6);
        assert_eq!(broadcast_len(1, 1).unwrap(), 1);
        assert!(broadcast_len(4, 6).is_err());
        assert!(broadcast_len(0, 3).is_err());
    }

    #[test]
    fn test_stretch_lines_up_with_product() {
        let mut reg = IndexRegistry::new();
        let i = reg.create_set("i", &SetDecl::ordinal(2)).unwrap();
        let j = reg.create_set("j", &SetDecl::ordinal(3)).unwrap();
        let over_i = Shape::over(&reg, &[i]);
        let over_ij = Shape::over(&reg, &[i, j]);
        let stretched = over_i.stretched(over_ij.len()).unwrap();
        for (short, long) in stretched.keys().iter().zip(over_ij.keys()) {
            assert_eq!(short[0], long[0]);
        }
    }

    #[test]
    fn test_key_index_ignores_skips() {
        let mut reg = IndexRegistry::new();
        let t = reg.create_set("t", &SetDecl::ordinal(3)).unwrap();
        let prev = reg.shift(t, -1).unwrap();
        let shape = Shape::over(&reg, &[prev]);
        let index = KeyIndex::new(&shape);
        assert_eq!(index.position(&shape.keys()[0]), None);
        assert_eq!(index.position(&shape.keys()[1]), Some(1));
        assert!(Shape::scalar().is_scalar());
        assert_eq!(KeyIndex::new(&Shape::scalar()).position(&[]), Some(0));
    }
}
