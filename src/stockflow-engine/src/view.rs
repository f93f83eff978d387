// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Read-only snapshots of a model for whatever draws it.

use serde::Serialize;

use crate::common::{Error, ErrorCode, ErrorKind, Ident, Result};
use crate::datamodel::{Category, Point, Polarity};
use crate::model::{Element, Link, Model};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ElementView {
    pub uid: i32,
    pub name: Ident,
    /// The name as it should be drawn, with underscores as spaces.
    pub label: String,
    pub category: Category,
    pub position: Point,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_from: Option<Ident>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_to: Option<Ident>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<Ident>,
    pub external: bool,
    pub history: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkView {
    pub uid: i32,
    pub from: Ident,
    pub to: Ident,
    pub polarity: Polarity,
    pub display: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelView {
    pub elements: Vec<ElementView>,
    pub links: Vec<LinkView>,
}

impl ModelView {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| Error::new(ErrorKind::Model, ErrorCode::Generic, Some(err.to_string())))
    }

    pub fn element(&self, name: &str) -> Option<&ElementView> {
        self.elements.iter().find(|element| element.name == name)
    }
}

impl Model {
    pub fn view(&self) -> ModelView {
        ModelView {
            elements: self.elements().map(|element| self.element_view(element)).collect(),
            links: self.links().filter_map(|link| self.link_view(link)).collect(),
        }
    }

    fn element_view(&self, element: &Element) -> ElementView {
        let name_of = |uid: Option<i32>| uid.and_then(|uid| self.name_of(uid)).map(str::to_owned);
        ElementView {
            uid: element.uid(),
            name: element.name().to_owned(),
            label: element.name().replace('_', " "),
            category: element.category(),
            position: element.position(),
            equation: element.equation().map(|eqn| eqn.to_string()),
            flow_from: name_of(element.flow_from()),
            flow_to: name_of(element.flow_to()),
            points: element.points().to_vec(),
            alias_of: name_of(element.alias_of()),
            external: element.is_external(),
            history: element.history().to_vec(),
        }
    }

    fn link_view(&self, link: &Link) -> Option<LinkView> {
        Some(LinkView {
            uid: link.uid,
            from: self.name_of(link.from)?.to_owned(),
            to: self.name_of(link.to)?.to_owned(),
            polarity: link.polarity,
            display: link.display,
            angle: link.angle,
        })
    }
}
