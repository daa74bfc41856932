/**
 * RecoVal
 * Copyright (C) 2026 The recoval developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::io::Read;

use fnv::{FnvHashMap, FnvHashSet};

use crate::error::{Error, Result};

pub const USER: &str = "user";
pub const ITEM: &str = "item";
pub const RATING: &str = "rating";
pub const TIMESTAMP: &str = "timestamp";

/// A small tabular dataset: named columns over ordered rows of string cells. This is the
/// contract between the evaluation engine, the models and whatever loads the data.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Frame {

    pub fn new<S: Into<String>>(columns: Vec<S>) -> Self {
        Frame {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a frame from `(column, values)` pairs, all columns must have the same length.
    pub fn from_columns(columns: &[(&str, &[&str])]) -> Result<Self> {

        let num_rows = columns.first().map(|(_, values)| values.len()).unwrap_or(0);

        for (name, values) in columns.iter() {
            if values.len() != num_rows {
                return Err(Error::configuration(format!(
                    "column '{}' has {} values, expected {}", name, values.len(), num_rows)));
            }
        }

        let mut frame = Frame::new(columns.iter().map(|(name, _)| *name).collect());

        for row in 0..num_rows {
            frame.rows.push(columns.iter().map(|(_, values)| values[row].to_string()).collect());
        }

        Ok(frame)
    }

    /// Reads a headed CSV input, the header line names the columns.
    pub fn from_csv<R: Read>(input: R, delimiter: u8) -> Result<Self> {

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .from_reader(input);

        let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let mut frame = Frame::new(columns);

        for record in reader.records() {
            let record = record?;
            frame.push_row(record.iter().map(String::from).collect())?;
        }

        Ok(frame)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::configuration(format!(
                "row has {} cells, frame has {} columns", row.len(), self.columns.len())));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns.iter()
            .position(|column| column == name)
            .ok_or_else(|| Error::configuration(format!("missing required column '{}'", name)))
    }

    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        for name in names {
            self.column_index(name)?;
        }
        Ok(())
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        &self.rows[row][column]
    }

    /// All values of a column in row order.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item=&str> + '_> {
        let index = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| row[index].as_str()))
    }

    /// Parses a numeric cell.
    pub fn number(&self, row: usize, column: usize) -> Result<f64> {
        let cell = self.cell(row, column);
        cell.trim().parse::<f64>().map_err(|_| Error::configuration(format!(
            "value '{}' in column '{}' is not numeric", cell, self.columns[column])))
    }

    /// Distinct values of a column in first-seen order.
    pub fn distinct(&self, name: &str) -> Result<Vec<String>> {

        let mut seen = FnvHashSet::with_capacity_and_hasher(self.rows.len(), Default::default());
        let mut values = Vec::new();

        for value in self.column(name)? {
            if seen.insert(value) {
                values.push(value.to_owned());
            }
        }

        Ok(values)
    }

    /// Groups row numbers by the value of a column. Groups appear in first-seen order and
    /// every row lands in exactly one group, in its original order.
    pub fn group_by(&self, name: &str) -> Result<Vec<Group>> {

        let index = self.column_index(name)?;

        let mut group_of_key: FnvHashMap<&str, usize> =
            FnvHashMap::with_capacity_and_hasher(100, Default::default());
        let mut groups: Vec<Group> = Vec::new();

        for (row_number, row) in self.rows.iter().enumerate() {
            let key = row[index].as_str();

            let position = *group_of_key.entry(key).or_insert_with(|| {
                groups.push(Group { key: key.to_owned(), rows: Vec::new() });
                groups.len() - 1
            });

            groups[position].rows.push(row_number);
        }

        Ok(groups)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: String,
    pub rows: Vec<usize>,
}
