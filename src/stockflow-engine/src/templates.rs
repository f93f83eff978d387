// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::datamodel::{Descriptor, Polarity};
use crate::equation::Equation;
use crate::model::Model;

/// Prebuilt structures, handy for demos and as regression fixtures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Template {
    SingleInflow,
    SingleOutflow,
    FirstOrderPositiveFeedback,
    FirstOrderNegativeFeedback,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Template::SingleInflow,
        Template::SingleOutflow,
        Template::FirstOrderPositiveFeedback,
        Template::FirstOrderNegativeFeedback,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Template::SingleInflow => "single_inflow",
            Template::SingleOutflow => "single_outflow",
            Template::FirstOrderPositiveFeedback => "first_order_positive_feedback",
            Template::FirstOrderNegativeFeedback => "first_order_negative_feedback",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Template::SingleInflow => "one stock filled by a constant inflow",
            Template::SingleOutflow => "one stock drained by a constant outflow",
            Template::FirstOrderPositiveFeedback => "a stock growing at a fixed fraction of itself",
            Template::FirstOrderNegativeFeedback => "a stock adjusting towards a goal",
        }
    }

    pub fn descriptors(&self) -> Vec<Descriptor> {
        use Polarity::{Negative, Positive};

        match self {
            Template::SingleInflow => vec![
                Descriptor::stock("stock", 1.0, 375.0, 250.0),
                Descriptor::flow(
                    "inflow",
                    Equation::Literal(4.0),
                    None,
                    Some("stock"),
                    120.0,
                    172.0,
                    &[(49.0, 172.0), (191.0, 172.0)],
                ),
            ],
            Template::SingleOutflow => vec![
                Descriptor::stock("stock", 100.0, 213.0, 174.0),
                Descriptor::flow(
                    "outflow",
                    Equation::Literal(4.0),
                    Some("stock"),
                    None,
                    302.0,
                    171.0,
                    &[(236.0, 171.0), (392.0, 171.0)],
                ),
            ],
            Template::FirstOrderPositiveFeedback => vec![
                Descriptor::stock("stock", 1.0, 213.0, 174.0),
                Descriptor::flow(
                    "inflow",
                    Equation::linear("growth"),
                    None,
                    Some("stock"),
                    120.0,
                    172.0,
                    &[(49.0, 172.0), (191.0, 172.0)],
                ),
                Descriptor::aux("growth", Equation::mul("stock", "fraction"), 158.0, 102.0),
                Descriptor::aux("fraction", Equation::Literal(0.1), 61.0, 97.0),
                Descriptor::connector(93.0, "stock", "growth", Positive),
                Descriptor::connector(195.0, "growth", "inflow", Positive),
                Descriptor::connector(38.0, "fraction", "growth", Positive),
            ],
            Template::FirstOrderNegativeFeedback => vec![
                Descriptor::stock("stock", 100.0, 213.0, 174.0),
                Descriptor::flow(
                    "outflow",
                    Equation::linear("adjustment"),
                    Some("stock"),
                    None,
                    302.0,
                    171.0,
                    &[(236.0, 171.0), (392.0, 171.0)],
                ),
                Descriptor::aux(
                    "adjustment",
                    Equation::div("gap", "adjustment_time"),
                    302.0,
                    220.0,
                ),
                Descriptor::aux("goal", Equation::Literal(20.0), 270.0, 300.0),
                Descriptor::aux("gap", Equation::sub("stock", "goal"), 252.0, 250.0),
                Descriptor::aux("adjustment_time", Equation::Literal(5.0), 362.0, 102.0),
                Descriptor::connector(289.0, "stock", "gap", Positive),
                Descriptor::connector(85.0, "goal", "gap", Negative),
                Descriptor::connector(35.0, "gap", "adjustment", Positive),
                Descriptor::connector(200.0, "adjustment_time", "adjustment", Negative),
                Descriptor::connector(35.0, "adjustment", "outflow", Positive),
            ],
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Template::ALL
            .iter()
            .find(|template| template.name() == s)
            .copied()
            .ok_or_else(|| Error::new(ErrorKind::Model, ErrorCode::UnknownTemplate, Some(s.to_owned())))
    }
}

impl Model {
    /// Add the elements of `template`.  Meant for an empty model: names
    /// already in use make the whole template fail with DuplicateName.
    pub fn apply_template(&mut self, template: Template) -> Result<Vec<i32>> {
        debug!("applying template {template}");
        self.add_descriptors(&template.descriptors())
    }

    pub fn from_template(template: Template) -> Result<Model> {
        let mut model = Model::new();
        model.apply_template(template)?;
        Ok(model)
    }
}
