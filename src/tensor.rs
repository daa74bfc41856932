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

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::ids::IdSpace;

/// Observations mapped to numeric ids. Each row holds one 1-based id per mode plus the
/// observed score.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionTensor {
    modes: Vec<String>,
    cardinalities: Vec<usize>,
    coordinates: Vec<usize>,
    scores: Vec<f64>,
}

impl InteractionTensor {

    pub fn new(modes: Vec<String>, cardinalities: Vec<usize>) -> Result<Self> {
        if modes.len() != cardinalities.len() {
            return Err(Error::configuration("every mode needs a cardinality"));
        }

        Ok(InteractionTensor {
            modes,
            cardinalities,
            coordinates: Vec::new(),
            scores: Vec::new(),
        })
    }

    /// Maps the given columns of a frame to id spaces, one mode per column. Scores come from
    /// `score_column` when the frame has it, otherwise every observation counts as 1.
    pub fn from_frame(
        frame: &Frame,
        mode_columns: &[String],
        score_column: Option<&str>,
    ) -> Result<(Self, Vec<IdSpace>)> {

        let column_indices = mode_columns.iter()
            .map(|column| frame.column_index(column))
            .collect::<Result<Vec<usize>>>()?;

        let score_index = match score_column {
            Some(column) if frame.has_column(column) => Some(frame.column_index(column)?),
            _ => None,
        };

        let mut id_spaces: Vec<IdSpace> = mode_columns.iter()
            .map(|column| IdSpace::new(column))
            .collect();

        let mut coordinates = Vec::with_capacity(frame.num_rows() * mode_columns.len());
        let mut scores = Vec::with_capacity(frame.num_rows());

        for row in 0..frame.num_rows() {
            for (space, column) in id_spaces.iter_mut().zip(column_indices.iter()) {
                coordinates.push(space.id_or_insert(frame.cell(row, *column)));
            }

            let score = match score_index {
                Some(column) => frame.number(row, column)?,
                None => 1.0,
            };
            scores.push(score);
        }

        let tensor = InteractionTensor {
            modes: mode_columns.to_vec(),
            cardinalities: id_spaces.iter().map(IdSpace::cardinality).collect(),
            coordinates,
            scores,
        };

        Ok((tensor, id_spaces))
    }

    pub fn push(&mut self, ids: &[usize], score: f64) -> Result<()> {
        if ids.len() != self.num_modes() {
            return Err(Error::configuration(format!(
                "expected {} ids, received {}", self.num_modes(), ids.len())));
        }

        for (mode, id) in ids.iter().enumerate() {
            if *id == 0 || *id > self.cardinalities[mode] {
                return Err(Error::lookup(&self.modes[mode], &id.to_string()));
            }
        }

        self.coordinates.extend_from_slice(ids);
        self.scores.push(score);
        Ok(())
    }

    pub fn modes(&self) -> &[String] {
        &self.modes
    }

    pub fn num_modes(&self) -> usize {
        self.modes.len()
    }

    pub fn num_rows(&self) -> usize {
        self.scores.len()
    }

    pub fn cardinality(&self, mode: usize) -> usize {
        self.cardinalities[mode]
    }

    pub fn cardinalities(&self) -> &[usize] {
        &self.cardinalities
    }

    #[inline]
    pub fn id(&self, row: usize, mode: usize) -> usize {
        self.coordinates[row * self.modes.len() + mode]
    }

    #[inline]
    pub fn score(&self, row: usize) -> f64 {
        self.scores[row]
    }

    /// For every id of `mode`, the rows that contain it. Entry `v - 1` belongs to id `v`.
    pub fn inverted_index(&self, mode: usize) -> Vec<Vec<usize>> {
        let mut index = vec![Vec::new(); self.cardinalities[mode]];

        for row in 0..self.num_rows() {
            index[self.id(row, mode) - 1].push(row);
        }

        index
    }
}
