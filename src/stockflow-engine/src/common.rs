// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

pub type Ident = String;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    UnknownElement,
    DuplicateName,
    DuplicateUid,
    MalformedEquation,
    DivisionByZero,
    ExhaustedSource,
    DanglingFlowReference,
    RecursionLimitExceeded,
    BadSimSpecs,
    UnknownTemplate,
    BadDataSource,
    Generic,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            UnknownElement => "unknown_element",
            DuplicateName => "duplicate_name",
            DuplicateUid => "duplicate_uid",
            MalformedEquation => "malformed_equation",
            DivisionByZero => "division_by_zero",
            ExhaustedSource => "exhausted_source",
            DanglingFlowReference => "dangling_flow_reference",
            RecursionLimitExceeded => "recursion_limit_exceeded",
            BadSimSpecs => "bad_sim_specs",
            UnknownTemplate => "unknown_template",
            BadDataSource => "bad_data_source",
            Generic => "generic",
        };

        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Import,
    Model,
    Simulation,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl From<Box<dyn std::error::Error>> for Error {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        Error {
            kind: ErrorKind::Simulation,
            code: ErrorCode::Generic,
            details: Some(err.to_string()),
        }
    }
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
            ErrorKind::Import => "ImportError",
            ErrorKind::Model => "ModelError",
            ErrorKind::Simulation => "SimulationError",
            ErrorKind::Variable => "VariableError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! model_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Model,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! sim_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Simulation,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Simulation, ErrorCode::$code, None))
    }};
}

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

/// canonicalize turns a name as it appears in an imported model file
/// into the form used as an element key: surrounding whitespace is
/// dropped and interior spaces and line breaks become underscores.
pub fn canonicalize(name: &str) -> Ident {
    let name = name.trim();
    let mut canonical = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ' ' | '\n' | '\u{00A0}' => canonical.push('_'),
            // a CRLF pair is a single line break
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                canonical.push('_');
            }
            '\\' if matches!(chars.peek(), Some(&'n') | Some(&'r')) => {
                chars.next();
                canonical.push('_');
            }
            _ => canonical.push(c),
        }
    }

    canonical
}

#[test]
fn test_canonicalize() {
    assert_eq!("a_b", canonicalize("   a b"));
    assert_eq!("adjustment_time", canonicalize("adjustment\ntime"));
    assert_eq!("adjustment_time", canonicalize("adjustment\r\ntime"));
    assert_eq!("adjustment_time", canonicalize("adjustment\\ntime"));
    assert_eq!("Stock", canonicalize("Stock "));
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Model,
        ErrorCode::DuplicateName,
        Some("stock".to_owned()),
    );
    assert_eq!("ModelError{duplicate_name: stock}", format!("{err}"));

    let err = Error::new(ErrorKind::Simulation, ErrorCode::DivisionByZero, None);
    assert_eq!("SimulationError{division_by_zero}", format!("{err}"));
    assert_eq!(None, err.get_details());
}

#[test]
fn test_error_macros() {
    let err: Result<()> = model_err!(UnknownElement, "goal".to_owned());
    let err = err.unwrap_err();
    assert_eq!(ErrorKind::Model, err.kind);
    assert_eq!(ErrorCode::UnknownElement, err.code);

    let err: Result<()> = sim_err!(ExhaustedSource);
    let err = err.unwrap_err();
    assert_eq!(ErrorKind::Simulation, err.kind);
    assert!(err.details.is_none());
}
