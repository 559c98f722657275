// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

// Re-export all common types from linmodel-core
pub use linmodel_core::common::*;
pub use linmodel_core::Value;

#[macro_export]
macro_rules! eprintln(
    ($($arg:tt)*) => {{
        use std::io::Write;
        let r = writeln!(&mut ::std::io::stderr(), $($arg)*);
        r.expect("failed printing to stderr");
    }}
);

#[macro_export]
macro_rules! decl_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::DeclarationConflict,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! card_err(
    ($str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::CardinalityMismatch,
            ErrorCode::CardinalityMismatch,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! op_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::UnsupportedOperation,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::UnsupportedOperation, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! rel_err(
    ($str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::RelationTypeConflict,
            ErrorCode::RelationConflict,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! index_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Index,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! import_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Import,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[test]
fn test_error_macros() {
    let r: Result<()> = op_err!(NonlinearTerm, "x * y".to_string());
    let err = r.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert_eq!(err.code, ErrorCode::NonlinearTerm);
    assert_eq!(format!("{err}"), "UnsupportedOperation{nonlinear_term: x * y}");

    let r: Result<()> = card_err!("3 vs 2".to_string());
    assert_eq!(r.unwrap_err().kind, ErrorKind::CardinalityMismatch);

    let r: Result<()> = decl_err!(DuplicateName, "x".to_string());
    assert_eq!(r.unwrap_err().code, ErrorCode::DuplicateName);
}
