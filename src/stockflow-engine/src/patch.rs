// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Structural edits to a [`Model`].
//!
//! Every operation validates before it touches the graph, and the
//! multi-part ones (`replace_equation`, `add_descriptors`) are applied to
//! a staged copy that only replaces the model once everything succeeded.
//! A rejected edit leaves the model exactly as it was.

use log::debug;

use crate::common::{Ident, Result, canonicalize};
use crate::datamodel::{Category, Descriptor, MAX_RECURSION_LIMIT, Point, Polarity};
use crate::equation::Equation;
use crate::model::{Element, ElementKind, Model, unknown_element};
use crate::model_err;

/// Evaluation recurses once per level of nesting, so an equation deeper
/// than any run could evaluate is rejected when it is added.
fn check_depth(equation: &Equation) -> Result<()> {
    let depth = equation.depth();
    if depth > MAX_RECURSION_LIMIT {
        return model_err!(
            MalformedEquation,
            format!("equation nests {depth} levels deep, more than {MAX_RECURSION_LIMIT}")
        );
    }
    Ok(())
}

impl Model {
    pub fn add_stock(&mut self, name: Option<&str>, initial: f64, position: Point) -> Result<i32> {
        let name = self.claim_name(name, Category::Stock)?;
        debug!("adding stock {name} = {initial}");
        let uid = self.uids.alloc();
        self.insert_element(Element {
            uid,
            name,
            position,
            history: vec![initial],
            external: false,
            kind: ElementKind::Stock,
        });
        Ok(uid)
    }

    /// Add a flow.  The links tying the flow to its stocks are created
    /// along with it: negative towards `flow_from`, positive towards
    /// `flow_to`.
    pub fn add_flow(
        &mut self,
        name: Option<&str>,
        equation: Equation,
        flow_from: Option<&str>,
        flow_to: Option<&str>,
        position: Point,
        points: Vec<Point>,
    ) -> Result<i32> {
        self.check_references(&equation)?;
        self.insert_flow(name, equation, flow_from, flow_to, position, points, true)
    }

    /// Add an auxiliary: a parameter if `equation` is a literal, a
    /// variable otherwise.  Variables get one link per element their
    /// equation reads.
    pub fn add_aux(&mut self, name: Option<&str>, equation: Equation, position: Point) -> Result<i32> {
        self.check_references(&equation)?;
        self.insert_aux(name, equation, position, true)
    }

    /// Add a visual duplicate of `of`.  `uid` is honoured when given
    /// (imported models carry their own), otherwise a fresh one is
    /// allocated.
    pub fn add_alias(&mut self, uid: Option<i32>, of: &str, position: Point) -> Result<i32> {
        let target = self.uid_of(of).ok_or_else(|| unknown_element(of))?;
        // point at the aliased element itself, never at another alias
        let target = self
            .get_by_uid(target)
            .and_then(|element| element.alias_of())
            .unwrap_or(target);
        if let Some(uid) = uid
            && (self.get_by_uid(uid).is_some() || !self.uids.reserve(uid))
        {
            return model_err!(DuplicateUid, format!("{uid}"));
        }
        let name = self.claim_name(None, Category::Alias)?;
        let uid = match uid {
            Some(uid) => uid,
            None => self.uids.alloc(),
        };
        debug!("adding alias {name} of {of}");
        self.insert_element(Element {
            uid,
            name,
            position,
            history: vec![],
            external: false,
            kind: ElementKind::Alias { of: target },
        });
        Ok(uid)
    }

    /// Add a displayed causal link.  If the two elements are already
    /// linked (for example through an equation dependency) that link is
    /// updated in place and keeps its UID.
    pub fn add_connector(
        &mut self,
        from: &str,
        to: &str,
        angle: Option<f64>,
        polarity: Polarity,
    ) -> Result<i32> {
        let from_uid = self.uid_of(from).ok_or_else(|| unknown_element(from))?;
        let to_uid = self.uid_of(to).ok_or_else(|| unknown_element(to))?;
        if let (Some(flow), Some(stock)) = (self.get_by_uid(from_uid), self.get_by_uid(to_uid))
            && flow.is_flow()
            && stock.is_stock()
            && flow.flow_from() != Some(to_uid)
            && flow.flow_to() != Some(to_uid)
        {
            return model_err!(
                DanglingFlowReference,
                format!("{from} is not connected to stock {to}")
            );
        }
        debug!("adding connector {from} -> {to}");
        Ok(self.upsert_link(from_uid, to_uid, polarity, angle, true))
    }

    pub fn delete_connector(&mut self, from: &str, to: &str) -> Result<()> {
        let from_uid = self.uid_of(from).ok_or_else(|| unknown_element(from))?;
        let to_uid = self.uid_of(to).ok_or_else(|| unknown_element(to))?;
        if self.link_by_uid(from_uid, to_uid).is_none() {
            return model_err!(UnknownElement, format!("no link from {from} to {to}"));
        }
        if let Some(element) = self.get_by_uid(from_uid)
            && (element.flow_from() == Some(to_uid) || element.flow_to() == Some(to_uid))
        {
            return self.disconnect_stock_flow(from, to);
        }
        debug!("deleting connector {from} -> {to}");
        self.remove_link(from_uid, to_uid);
        Ok(())
    }

    /// Remove an element together with every link touching it and every
    /// alias of it.  Flows that moved material in or out of a deleted
    /// stock lose that endpoint.
    ///
    /// Equations are not rewritten: one that still names the deleted
    /// element keeps the name, along with any other element that reads
    /// it through that equation.  Stepping such a model fails with
    /// `UnknownElement` until the equation is replaced or the name is
    /// added back.
    pub fn delete_element(&mut self, name: &str) -> Result<()> {
        let uid = self.uid_of(name).ok_or_else(|| unknown_element(name))?;
        debug!("deleting {name}");

        let aliases: Vec<i32> = self
            .elements()
            .filter(|element| element.alias_of() == Some(uid))
            .map(|element| element.uid())
            .collect();
        for alias in aliases.into_iter().chain(std::iter::once(uid)) {
            self.remove_incident_links(alias);
            if let Some(element) = self.elements.remove(&alias) {
                self.names.remove(&element.name);
            }
        }

        for element in self.elements.values_mut() {
            if let ElementKind::Flow {
                flow_from, flow_to, ..
            } = &mut element.kind
            {
                if *flow_from == Some(uid) {
                    *flow_from = None;
                }
                if *flow_to == Some(uid) {
                    *flow_to = None;
                }
            }
        }
        Ok(())
    }

    /// Detach `flow` from `stock`, removing the link between them.
    pub fn disconnect_stock_flow(&mut self, flow: &str, stock: &str) -> Result<()> {
        let flow_uid = self.flow_uid(flow)?;
        let stock_uid = self.uid_of(stock).ok_or_else(|| unknown_element(stock))?;
        let Some(ElementKind::Flow {
            flow_from, flow_to, ..
        }) = self.element_mut(flow_uid).map(|element| &mut element.kind)
        else {
            return model_err!(UnknownElement, flow.to_owned());
        };
        if *flow_from == Some(stock_uid) {
            *flow_from = None;
        } else if *flow_to == Some(stock_uid) {
            *flow_to = None;
        } else {
            return model_err!(
                DanglingFlowReference,
                format!("{flow} is not connected to {stock}")
            );
        }
        debug!("disconnecting {flow} from {stock}");
        self.remove_link(flow_uid, stock_uid);
        Ok(())
    }

    /// Point one or both ends of `flow` at new stocks.  A side given as
    /// None is left alone.
    pub fn connect_stock_flow(
        &mut self,
        flow: &str,
        flow_from: Option<&str>,
        flow_to: Option<&str>,
    ) -> Result<()> {
        let flow_uid = self.flow_uid(flow)?;
        let element = self.get_by_uid(flow_uid).ok_or_else(|| unknown_element(flow))?;
        let new_from = match flow_from {
            Some(stock) => Some(self.stock_uid(flow, stock)?),
            None => element.flow_from(),
        };
        let new_to = match flow_to {
            Some(stock) => Some(self.stock_uid(flow, stock)?),
            None => element.flow_to(),
        };
        if new_from.is_some() && new_from == new_to {
            return model_err!(
                DanglingFlowReference,
                format!("{flow} can't flow from and to the same stock")
            );
        }
        let (old_from, old_to) = (element.flow_from(), element.flow_to());

        debug!("connecting {flow}: from {flow_from:?} to {flow_to:?}");
        if flow_from.is_some() {
            if let Some(old) = old_from {
                self.remove_link(flow_uid, old);
            }
        }
        if flow_to.is_some() {
            if let Some(old) = old_to {
                self.remove_link(flow_uid, old);
            }
        }
        if let Some(ElementKind::Flow {
            flow_from: from_ref,
            flow_to: to_ref,
            ..
        }) = self.element_mut(flow_uid).map(|element| &mut element.kind)
        {
            *from_ref = new_from;
            *to_ref = new_to;
        }
        self.link_flow_to_stocks(flow_uid);
        Ok(())
    }

    /// Swap the equation of `name` for `equation`, rebuilding the
    /// element's incoming links to match the new dependencies.
    pub fn replace_equation(&mut self, name: &str, equation: Equation) -> Result<()> {
        let mut staged = self.clone();
        staged.replace_equation_staged(name, equation)?;
        *self = staged;
        Ok(())
    }

    fn replace_equation_staged(&mut self, name: &str, equation: Equation) -> Result<()> {
        let uid = self.uid_of(name).ok_or_else(|| unknown_element(name))?;
        self.check_references(&equation)?;
        debug!("replacing equation of {name} with {equation}");

        // a flow's link into this element is its stock association, not
        // a dependency, so it stays
        let stale: Vec<i32> = self
            .incoming(uid)
            .into_iter()
            .map(|link| link.from)
            .filter(|from| {
                self.get_by_uid(*from).map_or(true, |element| {
                    element.flow_from() != Some(uid) && element.flow_to() != Some(uid)
                })
            })
            .collect();
        for from in stale {
            self.remove_link(from, uid);
        }
        let element = self.element_mut(uid).ok_or_else(|| unknown_element(name))?;
        let literal = equation.literal();
        match &mut element.kind {
            ElementKind::Stock => match literal {
                Some(initial) => element.history = vec![initial],
                None => {
                    return model_err!(
                        MalformedEquation,
                        format!("stock {name} only takes an initial value")
                    );
                }
            },
            ElementKind::Flow { equation: eqn, .. } => match literal {
                Some(value) => {
                    *eqn = None;
                    element.history = vec![value];
                }
                None => {
                    *eqn = Some(equation.clone());
                    element.history = vec![];
                }
            },
            ElementKind::Auxiliary { .. } | ElementKind::Parameter => {
                let (kind, history) = match literal {
                    Some(value) => (ElementKind::Parameter, vec![value]),
                    None => (
                        ElementKind::Auxiliary {
                            equation: equation.clone(),
                        },
                        vec![],
                    ),
                };
                element.kind = kind;
                element.history = history;
            }
            ElementKind::Alias { .. } => {
                return model_err!(MalformedEquation, format!("alias {name} has no equation"));
            }
        }

        self.link_dependencies(uid, &equation)
    }

    /// Populate the model from an importer's batch.  Elements are created
    /// in the order given; dependency links and connectors are wired once
    /// every element exists, so entries may refer to later ones.  Names
    /// are canonicalized.  Either the whole batch is applied or none of
    /// it.
    pub fn add_descriptors(&mut self, descriptors: &[Descriptor]) -> Result<Vec<i32>> {
        let mut staged = self.clone();
        let uids = staged.add_descriptors_staged(descriptors)?;
        *self = staged;
        Ok(uids)
    }

    fn add_descriptors_staged(&mut self, descriptors: &[Descriptor]) -> Result<Vec<i32>> {
        let canonical = |name: &Option<Ident>| name.as_deref().map(canonicalize);
        let canonical_eqn = |eqn: &Equation| eqn.map_references(&canonicalize);

        for descriptor in descriptors.iter() {
            if let Descriptor::Flow { equation, .. } | Descriptor::Aux { equation, .. } = descriptor {
                check_depth(equation)?;
            }
        }

        let mut uids = Vec::with_capacity(descriptors.len());
        let mut deferred: Vec<(i32, Equation)> = Vec::new();
        let mut connectors: Vec<(Ident, Ident, Option<f64>, Polarity)> = Vec::new();

        for descriptor in descriptors.iter() {
            match descriptor {
                Descriptor::Stock {
                    name,
                    initial,
                    position,
                } => {
                    let name = canonical(name);
                    uids.push(self.add_stock(name.as_deref(), *initial, *position)?);
                }
                Descriptor::Flow {
                    name,
                    equation,
                    flow_from,
                    flow_to,
                    position,
                    points,
                } => {
                    let name = canonical(name);
                    let flow_from = canonical(flow_from);
                    let flow_to = canonical(flow_to);
                    let equation = canonical_eqn(equation);
                    let uid = self.insert_flow(
                        name.as_deref(),
                        equation.clone(),
                        flow_from.as_deref(),
                        flow_to.as_deref(),
                        *position,
                        points.clone(),
                        false,
                    )?;
                    deferred.push((uid, equation));
                    uids.push(uid);
                }
                Descriptor::Aux {
                    name,
                    equation,
                    position,
                } => {
                    let name = canonical(name);
                    let equation = canonical_eqn(equation);
                    let uid = self.insert_aux(name.as_deref(), equation.clone(), *position, false)?;
                    deferred.push((uid, equation));
                    uids.push(uid);
                }
                Descriptor::Alias { uid, of, position } => {
                    uids.push(self.add_alias(*uid, &canonicalize(of), *position)?);
                }
                Descriptor::Connector {
                    angle,
                    from,
                    to,
                    polarity,
                } => {
                    connectors.push((canonicalize(from), canonicalize(to), *angle, *polarity));
                }
            }
        }

        for (uid, equation) in deferred.iter() {
            self.check_references(equation)?;
            self.link_dependencies(*uid, equation)?;
        }
        for (from, to, angle, polarity) in connectors.iter() {
            uids.push(self.add_connector(from, to, *angle, *polarity)?);
        }

        Ok(uids)
    }

    /// Resolve an explicit name (rejecting duplicates) or generate a
    /// default one.
    fn claim_name(&mut self, name: Option<&str>, category: Category) -> Result<Ident> {
        match name {
            Some(name) => {
                if name.is_empty() {
                    return model_err!(Generic, "element names can't be empty".to_owned());
                }
                if self.contains(name) {
                    return model_err!(DuplicateName, name.to_owned());
                }
                Ok(name.to_owned())
            }
            None => Ok(self
                .default_names
                .next_name(category, |candidate| self.names.contains_key(candidate))),
        }
    }

    fn check_references(&self, equation: &Equation) -> Result<()> {
        check_depth(equation)?;
        match equation.references().into_iter().find(|ident| !self.contains(ident)) {
            Some(ident) => Err(unknown_element(ident)),
            None => Ok(()),
        }
    }

    fn flow_uid(&self, flow: &str) -> Result<i32> {
        let element = self.element(flow)?;
        if !element.is_flow() {
            return model_err!(UnknownElement, format!("{flow} is not a flow"));
        }
        Ok(element.uid())
    }

    fn stock_uid(&self, flow: &str, stock: &str) -> Result<i32> {
        match self.get(stock) {
            Some(element) if element.is_stock() => Ok(element.uid()),
            _ => model_err!(
                DanglingFlowReference,
                format!("{flow} refers to {stock}, which is not a stock")
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_flow(
        &mut self,
        name: Option<&str>,
        equation: Equation,
        flow_from: Option<&str>,
        flow_to: Option<&str>,
        position: Point,
        points: Vec<Point>,
        link_dependencies: bool,
    ) -> Result<i32> {
        let flow_label = name.unwrap_or("flow");
        let from_uid = match flow_from {
            Some(stock) => Some(self.stock_uid(flow_label, stock)?),
            None => None,
        };
        let to_uid = match flow_to {
            Some(stock) => Some(self.stock_uid(flow_label, stock)?),
            None => None,
        };
        if from_uid.is_some() && from_uid == to_uid {
            return model_err!(
                DanglingFlowReference,
                format!("{flow_label} can't flow from and to the same stock")
            );
        }
        let name = self.claim_name(name, Category::Flow)?;
        debug!("adding flow {name} = {equation}");

        let (equation, history) = match equation.literal() {
            Some(value) => (None, vec![value]),
            None => (Some(equation), vec![]),
        };
        let uid = self.uids.alloc();
        self.insert_element(Element {
            uid,
            name,
            position,
            history,
            external: false,
            kind: ElementKind::Flow {
                equation: equation.clone(),
                flow_from: from_uid,
                flow_to: to_uid,
                points,
            },
        });
        self.link_flow_to_stocks(uid);
        if link_dependencies {
            if let Some(equation) = equation {
                self.link_dependencies(uid, &equation)?;
            }
        }
        Ok(uid)
    }

    fn insert_aux(
        &mut self,
        name: Option<&str>,
        equation: Equation,
        position: Point,
        link_dependencies: bool,
    ) -> Result<i32> {
        let category = if equation.is_literal() {
            Category::Parameter
        } else {
            Category::Auxiliary
        };
        let name = self.claim_name(name, category)?;
        debug!("adding {category} {name} = {equation}");
        let uid = self.uids.alloc();
        let (kind, history) = match equation.literal() {
            Some(value) => (ElementKind::Parameter, vec![value]),
            None => (
                ElementKind::Auxiliary {
                    equation: equation.clone(),
                },
                vec![],
            ),
        };
        self.insert_element(Element {
            uid,
            name,
            position,
            history,
            external: false,
            kind,
        });
        if link_dependencies {
            self.link_dependencies(uid, &equation)?;
        }
        Ok(uid)
    }

    fn link_flow_to_stocks(&mut self, flow_uid: i32) {
        let Some(element) = self.get_by_uid(flow_uid) else {
            return;
        };
        let (from, to) = (element.flow_from(), element.flow_to());
        if let Some(from) = from {
            self.upsert_link(flow_uid, from, Polarity::Negative, None, false);
        }
        if let Some(to) = to {
            self.upsert_link(flow_uid, to, Polarity::Positive, None, false);
        }
    }

    fn link_dependencies(&mut self, uid: i32, equation: &Equation) -> Result<()> {
        for ident in equation.references() {
            let from = self.uid_of(ident).ok_or_else(|| unknown_element(ident))?;
            self.ensure_link(from, uid, Polarity::None);
        }
        Ok(())
    }
}
