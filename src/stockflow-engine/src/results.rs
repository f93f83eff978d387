// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::io::{self, Write};

use crate::common::Ident;
use crate::datamodel::Category;
use crate::model::Model;

/// Behaviour over time of every stock, flow, auxiliary and parameter,
/// one row per simulated time.
#[derive(Clone, Debug, PartialEq)]
pub struct Results {
    pub times: Vec<f64>,
    /// Column names in element creation order.
    pub names: Vec<Ident>,
    /// `columns[i]` holds the history of `names[i]`.  Columns can be
    /// shorter than `times`: elements only computed from the first step
    /// on have no value at time zero.
    pub columns: Vec<Vec<f64>>,
}

impl Results {
    pub fn new(model: &Model, times: &[f64]) -> Self {
        let (names, columns) = model
            .elements()
            .filter(|element| element.category() != Category::Alias)
            .map(|element| (element.name().to_owned(), element.history().to_vec()))
            .unzip();
        Results {
            times: times.to_vec(),
            names,
            columns,
        }
    }

    pub fn get(&self, ident: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|name| name == ident)
            .map(|i| self.columns[i].as_slice())
    }

    /// Value of `ident` at row `row`, aligning shorter columns to the
    /// end of the run.
    pub fn value_at(&self, ident: &str, row: usize) -> Option<f64> {
        let column = self.get(ident)?;
        let offset = self.times.len().checked_sub(column.len())?;
        row.checked_sub(offset).and_then(|i| column.get(i).copied())
    }

    pub fn write_tsv<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "time")?;
        for name in self.names.iter() {
            write!(w, "\t{name}")?;
        }
        writeln!(w)?;

        for (row, time) in self.times.iter().enumerate() {
            write!(w, "{time}")?;
            for name in self.names.iter() {
                match self.value_at(name, row) {
                    Some(value) => write!(w, "\t{value}")?,
                    None => write!(w, "\t")?,
                }
            }
            writeln!(w)?;
        }
        Ok(())
    }

    pub fn print_tsv(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        self.write_tsv(&mut handle)
    }
}
