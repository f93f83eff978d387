// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeMap, HashMap};

use crate::common::{Error, ErrorCode, ErrorKind, Ident, Result};
use crate::datamodel::{Category, Point, Polarity};
use crate::equation::Equation;
use crate::uid::{NameManager, UidManager};

/// Category-specific part of an element.
#[derive(Clone, PartialEq, Debug)]
pub enum ElementKind {
    Stock,
    Flow {
        /// None when the flow is a constant rate.
        equation: Option<Equation>,
        flow_from: Option<i32>,
        flow_to: Option<i32>,
        points: Vec<Point>,
    },
    Auxiliary {
        equation: Equation,
    },
    Parameter,
    Alias {
        of: i32,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub struct Element {
    pub(crate) uid: i32,
    pub(crate) name: Ident,
    pub(crate) position: Point,
    pub(crate) history: Vec<f64>,
    pub(crate) external: bool,
    pub(crate) kind: ElementKind,
}

impl Element {
    pub fn uid(&self) -> i32 {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        match self.kind {
            ElementKind::Stock => Category::Stock,
            ElementKind::Flow { .. } => Category::Flow,
            ElementKind::Auxiliary { .. } => Category::Auxiliary,
            ElementKind::Parameter => Category::Parameter,
            ElementKind::Alias { .. } => Category::Alias,
        }
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Every value this element has taken during the current run.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn equation(&self) -> Option<&Equation> {
        match &self.kind {
            ElementKind::Flow { equation, .. } => equation.as_ref(),
            ElementKind::Auxiliary { equation } => Some(equation),
            ElementKind::Stock | ElementKind::Parameter | ElementKind::Alias { .. } => None,
        }
    }

    pub fn is_stock(&self) -> bool {
        matches!(self.kind, ElementKind::Stock)
    }

    pub fn is_flow(&self) -> bool {
        matches!(self.kind, ElementKind::Flow { .. })
    }

    /// A constant has no equation and carries its literal as the first
    /// entry of its history.  Stocks and aliases are never constants.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ElementKind::Flow { equation, .. } => equation.is_none(),
            ElementKind::Parameter => true,
            ElementKind::Stock | ElementKind::Auxiliary { .. } | ElementKind::Alias { .. } => {
                false
            }
        }
    }

    pub fn flow_from(&self) -> Option<i32> {
        match self.kind {
            ElementKind::Flow { flow_from, .. } => flow_from,
            _ => None,
        }
    }

    pub fn flow_to(&self) -> Option<i32> {
        match self.kind {
            ElementKind::Flow { flow_to, .. } => flow_to,
            _ => None,
        }
    }

    pub fn points(&self) -> &[Point] {
        match &self.kind {
            ElementKind::Flow { points, .. } => points,
            _ => &[],
        }
    }

    pub fn alias_of(&self) -> Option<i32> {
        match self.kind {
            ElementKind::Alias { of } => Some(of),
            _ => None,
        }
    }

    /// The value this element starts a run with, when it has one.
    pub fn initial_value(&self) -> Option<f64> {
        if self.is_stock() || self.is_constant() {
            self.history.first().copied()
        } else {
            None
        }
    }
}

/// A causal link between two elements.
#[derive(Clone, PartialEq, Debug)]
pub struct Link {
    pub uid: i32,
    pub from: i32,
    pub to: i32,
    pub polarity: Polarity,
    pub angle: Option<f64>,
    pub display: bool,
}

/// The stock-and-flow graph: an arena of elements keyed by UID plus an
/// adjacency map of causal links.  There is at most one link per ordered
/// pair of elements.
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub(crate) elements: BTreeMap<i32, Element>,
    pub(crate) names: HashMap<Ident, i32>,
    // from -> to -> link
    pub(crate) links: BTreeMap<i32, BTreeMap<i32, Link>>,
    pub(crate) uids: UidManager,
    pub(crate) default_names: NameManager,
}

impl Model {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn get(&self, ident: &str) -> Option<&Element> {
        self.names
            .get(ident)
            .and_then(|uid| self.elements.get(uid))
    }

    pub fn get_by_uid(&self, uid: i32) -> Option<&Element> {
        self.elements.get(&uid)
    }

    pub fn uid_of(&self, ident: &str) -> Option<i32> {
        self.names.get(ident).copied()
    }

    pub fn name_of(&self, uid: i32) -> Option<&str> {
        self.elements.get(&uid).map(|element| element.name.as_str())
    }

    pub fn contains(&self, ident: &str) -> bool {
        self.names.contains_key(ident)
    }

    /// Like get, but a missing element is an UnknownElement error.
    pub fn element(&self, ident: &str) -> Result<&Element> {
        self.get(ident).ok_or_else(|| unknown_element(ident))
    }

    /// All elements in UID (creation) order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// UIDs of every element in one of `categories`, in creation order.
    pub fn uids_of(&self, categories: &[Category]) -> Vec<i32> {
        self.elements
            .values()
            .filter(|element| categories.contains(&element.category()))
            .map(|element| element.uid)
            .collect()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values().flat_map(|to| to.values())
    }

    pub fn link(&self, from: &str, to: &str) -> Option<&Link> {
        let from = self.uid_of(from)?;
        let to = self.uid_of(to)?;
        self.link_by_uid(from, to)
    }

    pub(crate) fn link_by_uid(&self, from: i32, to: i32) -> Option<&Link> {
        self.links.get(&from).and_then(|to_map| to_map.get(&to))
    }

    pub fn successors(&self, uid: i32) -> impl Iterator<Item = i32> + '_ {
        self.links
            .get(&uid)
            .into_iter()
            .flat_map(|to_map| to_map.keys().copied())
    }

    /// Links pointing into `uid`.
    pub fn incoming(&self, uid: i32) -> Vec<&Link> {
        self.links
            .values()
            .filter_map(|to_map| to_map.get(&uid))
            .collect()
    }

    /// The recorded values of the named element.
    pub fn behavior(&self, ident: &str) -> Result<&[f64]> {
        let element = self.element(ident)?;
        match element.kind {
            ElementKind::Alias { of } => self
                .get_by_uid(of)
                .map(|target| target.history())
                .ok_or_else(|| unknown_element(ident)),
            _ => Ok(element.history()),
        }
    }

    /// The definition of the named element as an equation: stocks and
    /// constants report their initial value as a literal.
    pub fn equation(&self, ident: &str) -> Result<Equation> {
        let element = self.element(ident)?;
        if let Some(eqn) = element.equation() {
            return Ok(eqn.clone());
        }
        match element.initial_value() {
            Some(value) => Ok(Equation::Literal(value)),
            None => Err(Error::new(
                ErrorKind::Model,
                ErrorCode::MalformedEquation,
                Some(format!("{ident} has no equation")),
            )),
        }
    }

    /// Mark the named element as fed by an external data source.
    pub fn set_external(&mut self, ident: &str, external: bool) -> Result<()> {
        let uid = self.uid_of(ident).ok_or_else(|| unknown_element(ident))?;
        if let Some(element) = self.elements.get_mut(&uid) {
            element.external = external;
        }
        Ok(())
    }

    /// Discard the results of a run: stocks and constants go back to
    /// their initial value, everything else to an empty history.
    /// Topology and equations are untouched.
    pub fn clear_run(&mut self) {
        for element in self.elements.values_mut() {
            if element.is_stock() || element.is_constant() {
                element.history.truncate(1);
            } else {
                element.history.clear();
            }
        }
    }

    /// Remove every element and link.  UIDs continue from where they
    /// were, so nothing is ever reissued.
    pub fn reset(&mut self) {
        self.elements.clear();
        self.names.clear();
        self.links.clear();
    }

    pub(crate) fn insert_element(&mut self, element: Element) {
        self.names.insert(element.name.clone(), element.uid);
        self.elements.insert(element.uid, element);
    }

    /// Insert or update the link from -> to.  An existing link keeps
    /// its UID.
    pub(crate) fn upsert_link(
        &mut self,
        from: i32,
        to: i32,
        polarity: Polarity,
        angle: Option<f64>,
        display: bool,
    ) -> i32 {
        if let Some(link) = self
            .links
            .get_mut(&from)
            .and_then(|to_map| to_map.get_mut(&to))
        {
            link.polarity = polarity;
            link.angle = angle;
            link.display = display;
            return link.uid;
        }
        let uid = self.uids.alloc();
        self.links.entry(from).or_default().insert(
            to,
            Link {
                uid,
                from,
                to,
                polarity,
                angle,
                display,
            },
        );
        uid
    }

    /// Insert a hidden link unless one already exists.
    pub(crate) fn ensure_link(&mut self, from: i32, to: i32, polarity: Polarity) -> i32 {
        match self.link_by_uid(from, to) {
            Some(link) => link.uid,
            None => self.upsert_link(from, to, polarity, None, false),
        }
    }

    pub(crate) fn remove_link(&mut self, from: i32, to: i32) -> Option<Link> {
        let to_map = self.links.get_mut(&from)?;
        let link = to_map.remove(&to);
        if to_map.is_empty() {
            self.links.remove(&from);
        }
        link
    }

    pub(crate) fn remove_incoming_links(&mut self, uid: i32) {
        self.links.retain(|_, to_map| {
            to_map.remove(&uid);
            !to_map.is_empty()
        });
    }

    pub(crate) fn remove_incident_links(&mut self, uid: i32) {
        self.links.remove(&uid);
        self.remove_incoming_links(uid);
    }

    pub(crate) fn element_mut(&mut self, uid: i32) -> Option<&mut Element> {
        self.elements.get_mut(&uid)
    }
}

pub(crate) fn unknown_element(ident: &str) -> Error {
    Error::new(
        ErrorKind::Model,
        ErrorCode::UnknownElement,
        Some(ident.to_owned()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(uid: i32, name: &str, initial: f64) -> Element {
        Element {
            uid,
            name: name.to_owned(),
            position: Point::default(),
            history: vec![initial],
            external: false,
            kind: ElementKind::Stock,
        }
    }

    #[test]
    fn links_are_unique_per_pair() {
        let mut model = Model::new();
        model.insert_element(stock(1, "a", 0.0));
        model.insert_element(stock(2, "b", 0.0));
        let first = model.upsert_link(1, 2, Polarity::None, None, false);
        let second = model.upsert_link(1, 2, Polarity::Positive, Some(45.0), true);
        assert_eq!(first, second);
        assert_eq!(1, model.links().count());

        let link = model.link("a", "b").unwrap();
        assert_eq!(Polarity::Positive, link.polarity);
        assert!(link.display);

        assert_eq!(first, model.ensure_link(1, 2, Polarity::Negative));
        assert_eq!(Polarity::Positive, model.link("a", "b").unwrap().polarity);
    }

    #[test]
    fn incident_link_removal() {
        let mut model = Model::new();
        model.insert_element(stock(1, "a", 0.0));
        model.insert_element(stock(2, "b", 0.0));
        model.insert_element(stock(3, "c", 0.0));
        model.upsert_link(1, 2, Polarity::None, None, false);
        model.upsert_link(2, 3, Polarity::None, None, false);
        model.upsert_link(3, 1, Polarity::None, None, false);

        model.remove_incident_links(2);
        let remaining: Vec<(i32, i32)> = model.links().map(|l| (l.from, l.to)).collect();
        assert_eq!(vec![(3, 1)], remaining);
        assert_eq!(Vec::<i32>::new(), model.successors(2).collect::<Vec<_>>());
    }

    #[test]
    fn clear_run_and_reset() {
        let mut model = Model::new();
        let mut s = stock(1, "s", 3.0);
        s.history.extend([4.0, 5.0]);
        model.insert_element(s);
        model.insert_element(Element {
            uid: 2,
            name: "p".to_owned(),
            position: Point::default(),
            history: vec![7.0, 7.0, 7.0],
            external: false,
            kind: ElementKind::Parameter,
        });
        model.insert_element(Element {
            uid: 3,
            name: "v".to_owned(),
            position: Point::default(),
            history: vec![1.0, 2.0],
            external: false,
            kind: ElementKind::Auxiliary {
                equation: Equation::linear("s"),
            },
        });

        model.clear_run();
        assert_eq!(&[3.0], model.behavior("s").unwrap());
        assert_eq!(&[7.0], model.behavior("p").unwrap());
        assert!(model.behavior("v").unwrap().is_empty());
        assert_eq!(Equation::Literal(3.0), model.equation("s").unwrap());
        assert_eq!(Equation::linear("s"), model.equation("v").unwrap());

        model.reset();
        assert!(model.is_empty());
        assert_eq!(
            ErrorCode::UnknownElement,
            model.behavior("s").unwrap_err().code
        );
    }
}
