// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{HashMap, VecDeque};

use crate::common::{Ident, Result};
use crate::{import_err, sim_err};

/// Supplies values for elements marked external, one value per request.
pub trait ExternalSource {
    fn next_value(&mut self, ident: &str) -> Result<f64>;

    /// Start every series over from its first value.  Called when a
    /// simulation's run is cleared.
    fn rewind(&mut self) {}
}

/// A source with no data at all: every request is exhausted.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoExternalData;

impl ExternalSource for NoExternalData {
    fn next_value(&mut self, ident: &str) -> Result<f64> {
        sim_err!(ExhaustedSource, ident.to_owned())
    }
}

/// Feeds elements from named columns of values, in order.
///
/// Columns are loaded first (by hand or from CSV), then each external
/// element is bound to a column with [`SeriesFeeder::set_var_source`].
/// Every element gets its own cursor, so two elements bound to the same
/// column consume it independently.
#[derive(Clone, Debug, Default)]
pub struct SeriesFeeder {
    columns: HashMap<String, Vec<f64>>,
    bindings: HashMap<Ident, String>,
    queues: HashMap<Ident, VecDeque<f64>>,
}

impl SeriesFeeder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_column(mut self, column: &str, values: Vec<f64>) -> Self {
        self.columns.insert(column.to_owned(), values);
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(|name| name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn set_var_source(&mut self, ident: &str, column: &str) -> Result<()> {
        let Some(values) = self.columns.get(column) else {
            return import_err!(BadDataSource, format!("no column named {column}"));
        };
        self.queues
            .insert(ident.to_owned(), values.iter().copied().collect());
        self.bindings.insert(ident.to_owned(), column.to_owned());
        Ok(())
    }

    /// Values still queued for `ident`.
    pub fn remaining(&self, ident: &str) -> usize {
        self.queues.get(ident).map_or(0, |queue| queue.len())
    }

    /// Read columns from CSV: a header row naming each column followed by
    /// one row of numbers per time step.
    #[cfg(feature = "file_io")]
    pub fn load_csv<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let header: Vec<String> = match rdr.headers() {
            Ok(header) => header.iter().map(|name| name.to_owned()).collect(),
            Err(err) => return import_err!(BadDataSource, err.to_string()),
        };
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); header.len()];

        for (row, result) in rdr.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(err) => return import_err!(BadDataSource, err.to_string()),
            };
            for (i, field) in record.iter().enumerate() {
                let value = match field.parse::<f64>() {
                    Ok(n) => n,
                    Err(_) => {
                        return import_err!(
                            BadDataSource,
                            format!("row {}, column {}: '{}' is not a number", row + 1, i, field)
                        );
                    }
                };
                columns[i].push(value);
            }
        }

        Ok(SeriesFeeder {
            columns: header.into_iter().zip(columns).collect(),
            ..Default::default()
        })
    }
}

impl ExternalSource for SeriesFeeder {
    fn next_value(&mut self, ident: &str) -> Result<f64> {
        match self.queues.get_mut(ident).and_then(|queue| queue.pop_front()) {
            Some(value) => Ok(value),
            None => sim_err!(ExhaustedSource, ident.to_owned()),
        }
    }

    fn rewind(&mut self) {
        for (ident, column) in self.bindings.iter() {
            if let Some(values) = self.columns.get(column) {
                self.queues
                    .insert(ident.clone(), values.iter().copied().collect());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ErrorCode, ErrorKind};

    #[test]
    fn feeds_values_in_order() {
        let mut feeder = SeriesFeeder::new().with_column("demand", vec![1.0, 2.0]);
        feeder.set_var_source("orders", "demand").unwrap();
        feeder.set_var_source("forecast", "demand").unwrap();

        assert_eq!(1.0, feeder.next_value("orders").unwrap());
        assert_eq!(2.0, feeder.next_value("orders").unwrap());
        let err = feeder.next_value("orders").unwrap_err();
        assert_eq!(ErrorCode::ExhaustedSource, err.code);
        assert_eq!(ErrorKind::Simulation, err.kind);

        // independent cursor
        assert_eq!(2, feeder.remaining("forecast"));
        assert_eq!(1.0, feeder.next_value("forecast").unwrap());

        feeder.rewind();
        assert_eq!(2, feeder.remaining("orders"));
        assert_eq!(1.0, feeder.next_value("orders").unwrap());
    }

    #[test]
    fn unbound_and_missing() {
        let mut feeder = SeriesFeeder::new();
        let err = feeder.next_value("anything").unwrap_err();
        assert_eq!(ErrorCode::ExhaustedSource, err.code);

        let err = feeder.set_var_source("orders", "demand").unwrap_err();
        assert_eq!(ErrorCode::BadDataSource, err.code);

        let err = NoExternalData.next_value("x").unwrap_err();
        assert_eq!(ErrorCode::ExhaustedSource, err.code);
    }

    #[cfg(feature = "file_io")]
    #[test]
    fn csv_columns() {
        let contents = "time, demand ,supply\n0,10,1\n1,12.5,2\n";
        let mut feeder = SeriesFeeder::load_csv(contents.as_bytes()).unwrap();
        assert_eq!(vec!["demand", "supply", "time"], feeder.column_names());

        feeder.set_var_source("orders", "demand").unwrap();
        assert_eq!(10.0, feeder.next_value("orders").unwrap());
        assert_eq!(12.5, feeder.next_value("orders").unwrap());

        let err = SeriesFeeder::load_csv("a\nfast\n".as_bytes()).unwrap_err();
        assert_eq!(ErrorCode::BadDataSource, err.code);
        assert_eq!(ErrorKind::Import, err.kind);
    }
}
