// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::common::{Error, ErrorCode, ErrorKind, Ident, Result};
use crate::equation::Equation;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Stock,
    Flow,
    Auxiliary,
    Parameter,
    Connector,
    Alias,
}

impl Category {
    /// Prefix used when generating a default name for an element.
    pub fn name_prefix(&self) -> &'static str {
        match self {
            Category::Stock => "stock",
            Category::Flow => "flow",
            Category::Auxiliary => "variable",
            Category::Parameter => "parameter",
            Category::Connector => "connector",
            Category::Alias => "alias",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Stock => "stock",
            Category::Flow => "flow",
            Category::Auxiliary => "auxiliary",
            Category::Parameter => "parameter",
            Category::Connector => "connector",
            Category::Alias => "alias",
        };
        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
    #[default]
    None,
}

/// One entry of a model handed over by an importer.  Batches are
/// consumed in order; names may refer to entries that appear later in
/// the same batch.
#[derive(Clone, PartialEq, Debug)]
pub enum Descriptor {
    Stock {
        name: Option<Ident>,
        initial: f64,
        position: Point,
    },
    Flow {
        name: Option<Ident>,
        equation: Equation,
        flow_from: Option<Ident>,
        flow_to: Option<Ident>,
        position: Point,
        points: Vec<Point>,
    },
    /// Either an auxiliary (equation) or a parameter (literal).
    Aux {
        name: Option<Ident>,
        equation: Equation,
        position: Point,
    },
    Alias {
        uid: Option<i32>,
        of: Ident,
        position: Point,
    },
    Connector {
        angle: Option<f64>,
        from: Ident,
        to: Ident,
        polarity: Polarity,
    },
}

impl Descriptor {
    pub fn category(&self) -> Category {
        match self {
            Descriptor::Stock { .. } => Category::Stock,
            Descriptor::Flow { .. } => Category::Flow,
            Descriptor::Aux { equation, .. } => {
                if equation.is_literal() {
                    Category::Parameter
                } else {
                    Category::Auxiliary
                }
            }
            Descriptor::Alias { .. } => Category::Alias,
            Descriptor::Connector { .. } => Category::Connector,
        }
    }

    pub fn stock(name: &str, initial: f64, x: f64, y: f64) -> Self {
        Descriptor::Stock {
            name: Some(name.to_owned()),
            initial,
            position: Point::new(x, y),
        }
    }

    pub fn flow(
        name: &str,
        equation: Equation,
        flow_from: Option<&str>,
        flow_to: Option<&str>,
        x: f64,
        y: f64,
        points: &[(f64, f64)],
    ) -> Self {
        Descriptor::Flow {
            name: Some(name.to_owned()),
            equation,
            flow_from: flow_from.map(|s| s.to_owned()),
            flow_to: flow_to.map(|s| s.to_owned()),
            position: Point::new(x, y),
            points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        }
    }

    pub fn aux(name: &str, equation: Equation, x: f64, y: f64) -> Self {
        Descriptor::Aux {
            name: Some(name.to_owned()),
            equation,
            position: Point::new(x, y),
        }
    }

    pub fn connector(angle: f64, from: &str, to: &str, polarity: Polarity) -> Self {
        Descriptor::Connector {
            angle: Some(angle),
            from: from.to_owned(),
            to: to.to_owned(),
            polarity,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum SimMethod {
    #[default]
    #[serde(rename = "euler")]
    Euler,
    #[serde(rename = "rk4")]
    RungeKutta4,
}

fn default_duration() -> f64 {
    25.0
}

fn default_dt() -> f64 {
    0.25
}

fn default_recursion_limit() -> usize {
    512
}

/// Highest recursion limit a run may configure.  Evaluation recurses on
/// the native stack, so this is bounded by what a default 2 MiB thread
/// stack holds.
pub const MAX_RECURSION_LIMIT: usize = 1024;

/// Run configuration.  Anything absent from a JSON document falls back
/// to the defaults (25 time units at dt 0.25, Euler, recursion limit
/// 512).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SimSpecs {
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default)]
    pub sim_method: SimMethod,
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
}

impl Default for SimSpecs {
    fn default() -> Self {
        SimSpecs {
            duration: default_duration(),
            dt: default_dt(),
            sim_method: SimMethod::Euler,
            recursion_limit: default_recursion_limit(),
        }
    }
}

impl SimSpecs {
    pub fn from_json(contents: &str) -> Result<SimSpecs> {
        let specs: SimSpecs = serde_json::from_str(contents).map_err(|err| {
            Error::new(
                ErrorKind::Import,
                ErrorCode::BadSimSpecs,
                Some(err.to_string()),
            )
        })?;
        specs.validate()?;
        Ok(specs)
    }

    pub fn validate(&self) -> Result<()> {
        check_dt(self.dt)?;
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(Error::new(
                ErrorKind::Model,
                ErrorCode::BadSimSpecs,
                Some(format!("duration must be non-negative, not {}", self.duration)),
            ));
        }
        if self.recursion_limit == 0 || self.recursion_limit > MAX_RECURSION_LIMIT {
            return Err(Error::new(
                ErrorKind::Model,
                ErrorCode::BadSimSpecs,
                Some(format!(
                    "recursion limit must be between 1 and {MAX_RECURSION_LIMIT}, not {}",
                    self.recursion_limit
                )),
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_dt(dt: f64) -> Result<()> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::Model,
            ErrorCode::BadSimSpecs,
            Some(format!("dt must be positive, not {dt}")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specs_defaults() {
        let specs = SimSpecs::from_json("{}").unwrap();
        assert_eq!(SimSpecs::default(), specs);
        assert_eq!(25.0, specs.duration);
        assert_eq!(0.25, specs.dt);
        assert_eq!(512, specs.recursion_limit);
    }

    #[test]
    fn specs_partial_override() {
        let specs = SimSpecs::from_json(r#"{"duration": 100, "sim_method": "rk4"}"#).unwrap();
        assert_eq!(100.0, specs.duration);
        assert_eq!(0.25, specs.dt);
        assert_eq!(SimMethod::RungeKutta4, specs.sim_method);
    }

    #[test]
    fn specs_rejects_bad_values() {
        let err = SimSpecs::from_json(r#"{"dt": 0}"#).unwrap_err();
        assert_eq!(ErrorCode::BadSimSpecs, err.code);
        let err = SimSpecs::from_json(r#"{"duration": -1}"#).unwrap_err();
        assert_eq!(ErrorCode::BadSimSpecs, err.code);
        let err = SimSpecs::from_json(r#"{"dt": "fast"}"#).unwrap_err();
        assert_eq!(ErrorKind::Import, err.kind);
    }

    #[test]
    fn specs_recursion_limit_ceiling() {
        let err = SimSpecs::from_json(r#"{"recursion_limit": 100000000}"#).unwrap_err();
        assert_eq!(ErrorCode::BadSimSpecs, err.code);
        let err = SimSpecs::from_json(r#"{"recursion_limit": 0}"#).unwrap_err();
        assert_eq!(ErrorCode::BadSimSpecs, err.code);

        let json = format!(r#"{{"recursion_limit": {MAX_RECURSION_LIMIT}}}"#);
        let specs = SimSpecs::from_json(&json).unwrap();
        assert_eq!(MAX_RECURSION_LIMIT, specs.recursion_limit);
    }

    #[test]
    fn aux_descriptor_category() {
        let param = Descriptor::aux("goal", Equation::Literal(20.0), 0.0, 0.0);
        assert_eq!(Category::Parameter, param.category());
        let var = Descriptor::aux("gap", Equation::sub("stock", "goal"), 0.0, 0.0);
        assert_eq!(Category::Auxiliary, var.category());
    }
}
