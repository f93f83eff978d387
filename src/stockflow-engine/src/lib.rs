// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod common;
pub mod data;
pub mod datamodel;
pub mod equation;
pub mod interpreter;
pub mod model;
mod patch;
mod results;
pub mod templates;
mod uid;
pub mod view;

pub use common::{Error, ErrorCode, ErrorKind, Ident, Result, canonicalize};
pub use data::{ExternalSource, NoExternalData, SeriesFeeder};
pub use datamodel::{Category, Descriptor, MAX_RECURSION_LIMIT, Point, Polarity, SimMethod, SimSpecs};
pub use equation::{Equation, Op, Operand};
pub use interpreter::{Evaluator, Simulation, StepMemo};
pub use model::{Element, ElementKind, Link, Model};
pub use results::Results;
pub use templates::Template;
pub use uid::{MAX_RESERVED_UID, NameManager, UidManager};
pub use view::{ElementView, LinkView, ModelView};
