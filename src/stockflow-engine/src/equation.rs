// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use crate::common::{Ident, Result};
use crate::sim_err;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Op {
    /// a*x + b
    Linear { a: f64, b: f64 },
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    pub const IDENTITY: Op = Op::Linear { a: 1.0, b: 0.0 };

    pub fn arity(&self) -> usize {
        match self {
            Op::Linear { .. } => 1,
            Op::Add | Op::Sub | Op::Mul | Op::Div => 2,
        }
    }

    fn symbol(&self) -> Option<&'static str> {
        match self {
            Op::Linear { .. } => None,
            Op::Add => Some("+"),
            Op::Sub => Some("-"),
            Op::Mul => Some("*"),
            Op::Div => Some("/"),
        }
    }

    /// Apply the operator to already-resolved arguments.
    pub fn apply(&self, args: &[f64]) -> Result<f64> {
        if args.len() != self.arity() {
            return sim_err!(
                MalformedEquation,
                format!(
                    "operator {:?} takes {} operands, got {}",
                    self,
                    self.arity(),
                    args.len()
                )
            );
        }
        let value = match self {
            Op::Linear { a, b } => a * args[0] + b,
            Op::Add => args[0] + args[1],
            Op::Sub => args[0] - args[1],
            Op::Mul => args[0] * args[1],
            Op::Div => {
                if args[1] == 0.0 {
                    return sim_err!(DivisionByZero, format!("{} / 0", args[0]));
                }
                args[0] / args[1]
            }
        };
        Ok(value)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Operand {
    Ref(Ident),
    Eqn(Box<Equation>),
}

impl From<&str> for Operand {
    fn from(ident: &str) -> Self {
        Operand::Ref(ident.to_owned())
    }
}

impl From<Ident> for Operand {
    fn from(ident: Ident) -> Self {
        Operand::Ref(ident)
    }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Eqn(Box::new(Equation::Literal(n)))
    }
}

impl From<Equation> for Operand {
    fn from(eqn: Equation) -> Self {
        Operand::Eqn(Box::new(eqn))
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Equation {
    Literal(f64),
    Apply(Op, Vec<Operand>),
}

impl Equation {
    pub fn linear(x: impl Into<Operand>) -> Self {
        Equation::Apply(Op::IDENTITY, vec![x.into()])
    }

    pub fn scaled(a: f64, x: impl Into<Operand>, b: f64) -> Self {
        Equation::Apply(Op::Linear { a, b }, vec![x.into()])
    }

    pub fn add(l: impl Into<Operand>, r: impl Into<Operand>) -> Self {
        Equation::Apply(Op::Add, vec![l.into(), r.into()])
    }

    pub fn sub(l: impl Into<Operand>, r: impl Into<Operand>) -> Self {
        Equation::Apply(Op::Sub, vec![l.into(), r.into()])
    }

    pub fn mul(l: impl Into<Operand>, r: impl Into<Operand>) -> Self {
        Equation::Apply(Op::Mul, vec![l.into(), r.into()])
    }

    pub fn div(l: impl Into<Operand>, r: impl Into<Operand>) -> Self {
        Equation::Apply(Op::Div, vec![l.into(), r.into()])
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Equation::Literal(_))
    }

    pub fn literal(&self) -> Option<f64> {
        match self {
            Equation::Literal(n) => Some(*n),
            Equation::Apply(..) => None,
        }
    }

    /// Names of every element this equation reads, in order of first
    /// appearance and without duplicates.
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a str>) {
        let mut pending: Vec<&'a Operand> = match self {
            Equation::Apply(_, operands) => operands.iter().rev().collect(),
            Equation::Literal(_) => return,
        };
        while let Some(operand) = pending.pop() {
            match operand {
                Operand::Ref(ident) => {
                    if !refs.contains(&ident.as_str()) {
                        refs.push(ident.as_str());
                    }
                }
                Operand::Eqn(eqn) => {
                    if let Equation::Apply(_, operands) = eqn.as_ref() {
                        pending.extend(operands.iter().rev());
                    }
                }
            }
        }
    }

    /// How deeply applications nest; a literal or a flat application of
    /// element references has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending: Vec<(&Equation, usize)> = vec![(self, 1)];
        while let Some((eqn, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            if let Equation::Apply(_, operands) = eqn {
                for operand in operands.iter() {
                    if let Operand::Eqn(nested) = operand {
                        pending.push((nested, depth + 1));
                    }
                }
            }
        }
        deepest
    }

    /// Rewrite every element reference with `f`.
    pub fn map_references(&self, f: &impl Fn(&str) -> Ident) -> Self {
        match self {
            Equation::Literal(n) => Equation::Literal(*n),
            Equation::Apply(op, operands) => Equation::Apply(
                *op,
                operands
                    .iter()
                    .map(|operand| match operand {
                        Operand::Ref(ident) => Operand::Ref(f(ident)),
                        Operand::Eqn(eqn) => Operand::Eqn(Box::new(eqn.map_references(f))),
                    })
                    .collect(),
            ),
        }
    }
}

impl Drop for Equation {
    // unnest before dropping so deep trees don't exhaust the stack
    fn drop(&mut self) {
        let Equation::Apply(_, operands) = self else {
            return;
        };
        let mut pending = std::mem::take(operands);
        while let Some(operand) = pending.pop() {
            if let Operand::Eqn(mut eqn) = operand
                && let Equation::Apply(_, nested) = eqn.as_mut()
            {
                pending.append(nested);
            }
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Ref(ident) => write!(f, "{ident}"),
            Operand::Eqn(eqn) => match eqn.as_ref() {
                Equation::Literal(n) => write!(f, "{n}"),
                // identity applications print bare, so they don't need parens
                Equation::Apply(Op::Linear { a, b }, _) if *a == 1.0 && *b == 0.0 => {
                    write!(f, "{eqn}")
                }
                Equation::Apply(..) => write!(f, "({eqn})"),
            },
        }
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Equation::Literal(n) => write!(f, "{n}"),
            Equation::Apply(op, operands) => match (op, operands.as_slice()) {
                (Op::Linear { a, b }, [x]) => {
                    if *a == 1.0 && *b == 0.0 {
                        write!(f, "{x}")
                    } else if *b == 0.0 {
                        write!(f, "{a}*{x}")
                    } else {
                        write!(f, "{a}*{x}+{b}")
                    }
                }
                (_, [l, r]) if op.symbol().is_some() => {
                    write!(f, "{}{}{}", l, op.symbol().unwrap_or_default(), r)
                }
                // malformed applications still get a readable label
                _ => {
                    write!(f, "{op:?}(")?;
                    for (i, operand) in operands.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{operand}")?;
                    }
                    write!(f, ")")
                }
            },
        }
    }
}
