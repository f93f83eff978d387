// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

use float_cmp::approx_eq;
use log::{info, trace, warn};
use smallvec::SmallVec;

use crate::common::Result;
use crate::data::{ExternalSource, NoExternalData};
use crate::datamodel::{Category, MAX_RECURSION_LIMIT, SimMethod, SimSpecs, check_dt};
use crate::equation::{Equation, Operand};
use crate::model::{ElementKind, Model};
use crate::results::Results;
use crate::{model_err, sim_err};

/// Values computed during one step, keyed by element UID.  Nothing in
/// here reaches an element's history until the step as a whole has
/// succeeded.
#[derive(Clone, Debug, Default)]
pub struct StepMemo {
    values: HashMap<i32, f64>,
}

impl StepMemo {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn contains(&self, uid: i32) -> bool {
        self.values.contains_key(&uid)
    }

    pub fn get(&self, uid: i32) -> Option<f64> {
        self.values.get(&uid).copied()
    }

    /// Record `value` unless the element already has one this step.
    pub fn record(&mut self, uid: i32, value: f64) {
        self.values.entry(uid).or_insert(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub struct Evaluator<'a> {
    model: &'a Model,
    source: &'a mut dyn ExternalSource,
    recursion_limit: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(model: &'a Model, source: &'a mut dyn ExternalSource, recursion_limit: usize) -> Self {
        Evaluator {
            model,
            source,
            recursion_limit: recursion_limit.min(MAX_RECURSION_LIMIT),
        }
    }

    /// The value of the named element for the current step.
    pub fn resolve(&mut self, ident: &str, memo: &mut StepMemo) -> Result<f64> {
        match self.model.uid_of(ident) {
            Some(uid) => self.resolve_uid(uid, memo, 0),
            None => sim_err!(UnknownElement, ident.to_owned()),
        }
    }

    fn resolve_uid(&mut self, uid: i32, memo: &mut StepMemo, depth: usize) -> Result<f64> {
        let Some(element) = self.model.get_by_uid(uid) else {
            return sim_err!(UnknownElement, format!("uid {uid}"));
        };
        if depth > self.recursion_limit {
            return sim_err!(RecursionLimitExceeded, element.name().to_owned());
        }

        if element.is_external() {
            let value = self.source.next_value(element.name())?;
            memo.record(uid, value);
            return Ok(value);
        }

        match element.kind() {
            // stocks are read, never evaluated, which is what breaks
            // feedback loops
            ElementKind::Stock => {
                return match element.history().last() {
                    Some(value) => Ok(*value),
                    None => sim_err!(MalformedEquation, format!("stock {} has no value", element.name())),
                };
            }
            ElementKind::Alias { of } => return self.resolve_uid(*of, memo, depth + 1),
            _ => {}
        }

        if let Some(value) = memo.get(uid) {
            return Ok(value);
        }

        let value = match element.equation() {
            Some(eqn) => self.eval(eqn, memo, depth + 1)?,
            None => match element.history().last() {
                Some(value) => *value,
                None => {
                    return sim_err!(MalformedEquation, format!("{} has no value", element.name()));
                }
            },
        };
        memo.record(uid, value);
        Ok(value)
    }

    fn eval(&mut self, eqn: &Equation, memo: &mut StepMemo, depth: usize) -> Result<f64> {
        match eqn {
            Equation::Literal(n) => Ok(*n),
            Equation::Apply(op, operands) => {
                let mut args: SmallVec<[f64; 2]> = SmallVec::with_capacity(operands.len());
                for operand in operands.iter() {
                    let value = match operand {
                        Operand::Ref(ident) => match self.model.uid_of(ident) {
                            Some(uid) => self.resolve_uid(uid, memo, depth + 1)?,
                            None => return sim_err!(UnknownElement, ident.clone()),
                        },
                        Operand::Eqn(eqn) => self.eval(eqn, memo, depth + 1)?,
                    };
                    args.push(value);
                }
                op.apply(&args)
            }
        }
    }
}

/// Owns a model and runs it forward in time with Euler integration.
pub struct Simulation {
    model: Model,
    specs: SimSpecs,
    source: Box<dyn ExternalSource>,
    // simulated time of each history row
    times: Vec<f64>,
}

impl Simulation {
    pub fn new(model: Model, specs: SimSpecs) -> Result<Self> {
        specs.validate()?;
        if specs.sim_method == SimMethod::RungeKutta4 {
            warn!("simulation requested 'rk4', but only Euler is supported");
        }
        Ok(Simulation {
            model,
            specs,
            source: Box::new(NoExternalData),
            times: vec![0.0],
        })
    }

    pub fn with_source(mut self, source: Box<dyn ExternalSource>) -> Self {
        self.source = source;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Mutable access for structural edits between runs.  Edits made
    /// after steps have run leave existing histories in place, so call
    /// [`Simulation::clear_run`] before simulating again.
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn specs(&self) -> &SimSpecs {
        &self.specs
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Advance the model by one Euler step of size `dt`.
    pub fn step(&mut self, dt: f64) -> Result<()> {
        check_dt(dt)?;

        let mut memo = StepMemo::new();
        let mut deltas: HashMap<i32, f64> = HashMap::new();
        {
            let mut evaluator =
                Evaluator::new(&self.model, self.source.as_mut(), self.specs.recursion_limit);

            let flows = self.model.uids_of(&[Category::Flow]);
            let mut amounts: Vec<(i32, f64)> = Vec::with_capacity(flows.len());
            for uid in flows {
                let rate = evaluator.resolve_uid(uid, &mut memo, 0)?;
                amounts.push((uid, dt * rate));
            }

            for uid in self
                .model
                .uids_of(&[Category::Auxiliary, Category::Parameter])
            {
                if !memo.contains(uid) {
                    evaluator.resolve_uid(uid, &mut memo, 0)?;
                }
            }

            for (uid, amount) in amounts {
                let Some(flow) = self.model.get_by_uid(uid) else {
                    continue;
                };
                for successor in self.model.successors(uid) {
                    if !self
                        .model
                        .get_by_uid(successor)
                        .is_some_and(|element| element.is_stock())
                    {
                        continue;
                    }
                    let direction = if flow.flow_from() == Some(successor) {
                        -1.0
                    } else if flow.flow_to() == Some(successor) {
                        1.0
                    } else {
                        return sim_err!(
                            DanglingFlowReference,
                            format!(
                                "{} is linked to a stock it doesn't flow from or to",
                                flow.name()
                            )
                        );
                    };
                    if amount != 0.0 {
                        *deltas.entry(successor).or_insert(0.0) += direction * amount;
                    }
                }
            }
        }

        // commit
        for (uid, value) in memo.values.into_iter() {
            if let Some(element) = self.model.element_mut(uid) {
                if !element.is_stock() {
                    element.history.push(value);
                }
            }
        }
        for uid in self.model.uids_of(&[Category::Stock]) {
            if let Some(stock) = self.model.element_mut(uid) {
                let previous = stock.history.last().copied().unwrap_or_default();
                let delta = deltas.get(&uid).copied().unwrap_or(0.0);
                stock.history.push(previous + delta);
            }
        }
        let time = self.times.last().copied().unwrap_or_default() + dt;
        self.times.push(time);
        trace!("stepped to t={time}");

        Ok(())
    }

    /// Run `duration / dt` steps, falling back to the configured
    /// duration and dt when either is omitted.  Returns the number of
    /// steps taken.
    pub fn simulate(&mut self, duration: Option<f64>, dt: Option<f64>) -> Result<usize> {
        let duration = duration.unwrap_or(self.specs.duration);
        let dt = dt.unwrap_or(self.specs.dt);
        check_dt(dt)?;
        if !duration.is_finite() || duration < 0.0 {
            return model_err!(
                BadSimSpecs,
                format!("duration must be non-negative, not {duration}")
            );
        }

        let steps = step_count(duration, dt);
        info!("simulating {} elements for {steps} steps (dt {dt})", self.model.len());
        for _ in 0..steps {
            self.step(dt)?;
        }
        info!(
            "simulation finished at t={}",
            self.times.last().copied().unwrap_or_default()
        );
        Ok(steps)
    }

    /// Return to initial conditions, keeping the structure.
    pub fn clear_run(&mut self) {
        self.model.clear_run();
        self.source.rewind();
        self.times = vec![0.0];
    }

    /// Drop the whole structure.
    pub fn reset(&mut self) {
        self.model.reset();
        self.source.rewind();
        self.times = vec![0.0];
    }

    pub fn results(&self) -> Results {
        Results::new(&self.model, &self.times)
    }
}

fn step_count(duration: f64, dt: f64) -> usize {
    let quotient = duration / dt;
    let rounded = quotient.round();
    // 0.3 / 0.1 is 2.9999999999999996
    if approx_eq!(f64, quotient, rounded, ulps = 4) {
        rounded as usize
    } else {
        quotient.floor() as usize
    }
}
