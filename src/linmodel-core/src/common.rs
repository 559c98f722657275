// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    Generic,
    // declarations
    DuplicateName,
    UnknownName,
    // index sets and keys
    SizeAndMembers,
    EmptySetDecl,
    DuplicateElement,
    IncompatibleRoles,
    NotOrdinal,
    BadKey,
    UnknownElement,
    // broadcasting
    CardinalityMismatch,
    // expressions
    NonlinearTerm,
    DivisionByVariable,
    DivisionByZero,
    DegenerateDivision,
    UnsupportedPower,
    BigMProduct,
    // constraints
    RelationConflict,
    InequalityDifference,
    // model import
    JsonDeserialization,
    BadModel,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            Generic => "generic",
            DuplicateName => "duplicate_name",
            UnknownName => "unknown_name",
            SizeAndMembers => "size_and_members",
            EmptySetDecl => "empty_set_decl",
            DuplicateElement => "duplicate_element",
            IncompatibleRoles => "incompatible_roles",
            NotOrdinal => "not_ordinal",
            BadKey => "bad_key",
            UnknownElement => "unknown_element",
            CardinalityMismatch => "cardinality_mismatch",
            NonlinearTerm => "nonlinear_term",
            DivisionByVariable => "division_by_variable",
            DivisionByZero => "division_by_zero",
            DegenerateDivision => "degenerate_division",
            UnsupportedPower => "unsupported_power",
            BigMProduct => "big_m_product",
            RelationConflict => "relation_conflict",
            InequalityDifference => "inequality_difference",
            JsonDeserialization => "json_deserialization",
            BadModel => "bad_model",
        };

        write!(f, "{name}")
    }
}

/// The broad failure classes a model can hit while it is being built.
/// Every one of them is raised at the call that caused it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    DeclarationConflict,
    CardinalityMismatch,
    UnsupportedOperation,
    RelationTypeConflict,
    Index,
    Import,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::DeclarationConflict => "DeclarationConflict",
            ErrorKind::CardinalityMismatch => "CardinalityMismatch",
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
            ErrorKind::RelationTypeConflict => "RelationTypeConflict",
            ErrorKind::Index => "IndexError",
            ErrorKind::Import => "ImportError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// A canonicalized name.
///
/// Canonical form means:
/// - leading/trailing whitespace removed
/// - surrounding double quotes removed
/// - runs of whitespace replaced with a single underscore
/// - lowercase
///
/// Two declarations whose names canonicalize to the same `Ident` refer to
/// the same entity; this is how a nominal index element declared in several
/// sets is recognized as one element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    /// Create from an already-canonicalized string
    ///
    /// Note: Caller must guarantee the string is already canonical
    pub fn from_unchecked(s: String) -> Self {
        Ident(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// lets HashMap<Ident, _> be queried with a &str
impl std::borrow::Borrow<str> for Ident {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn canonicalize(name: &str) -> Ident {
    // trim before testing for quotedness so that ` "a" ` is still quoted
    let name = name.trim();
    let bytes = name.as_bytes();
    let name = if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        &name[1..name.len() - 1]
    } else {
        name
    };

    let name = replace_whitespace_with_underscore(name.trim());
    Ident(name.to_lowercase())
}

/// Replace whitespace sequences with underscores.
/// Handles spaces, tabs, newlines, carriage returns and non-breaking spaces
/// (U+00A0). Consecutive matches become a single underscore.
fn replace_whitespace_with_underscore(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_whitespace = false;

    for c in s.chars() {
        if c == ' ' || c == '\t' || c == '\n' || c == '\r' || c == '\u{00A0}' {
            if !in_whitespace {
                result.push('_');
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
            result.push(c);
        }
    }

    result
}

#[test]
fn test_canonicalize() {
    assert_eq!("a_b", canonicalize("   a b").as_str());
    assert_eq!("jupiter", canonicalize("Jupiter").as_str());
    assert_eq!("å_b", canonicalize("Å\nb").as_str());
    assert_eq!("a_b", canonicalize("a \n b").as_str());
    assert_eq!("quoted_name", canonicalize("\"Quoted Name\"").as_str());
    assert_eq!("quoted", canonicalize("  \"quoted\" ").as_str());
    assert_eq!("", canonicalize("   ").as_str());
    assert_eq!("a.b", canonicalize("a.b").as_str());
}

#[test]
fn test_ident_borrow_lookup() {
    use std::collections::HashMap;

    let mut names: HashMap<Ident, usize> = HashMap::new();
    names.insert(canonicalize("Voyager Visited"), 3);
    assert_eq!(names.get("voyager_visited"), Some(&3));
    assert_eq!(names.get("Voyager Visited"), None);
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::DeclarationConflict,
        ErrorCode::DuplicateName,
        Some("x".to_string()),
    );
    assert_eq!(format!("{err}"), "DeclarationConflict{duplicate_name: x}");

    let err = Error::new(ErrorKind::UnsupportedOperation, ErrorCode::NonlinearTerm, None);
    assert_eq!(format!("{err}"), "UnsupportedOperation{nonlinear_term}");
}
