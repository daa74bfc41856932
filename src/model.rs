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

use crate::error::Result;
use crate::frame::Frame;

/// A scoring model under evaluation.
///
/// `score` must not mutate the model, evaluation calls it concurrently from several threads.
/// Scoring a user or item that the model has never seen fails with `Error::Lookup`.
pub trait Model {

    fn fit(&mut self, training: &Frame) -> Result<()>;

    fn score(&self, user: &str, item: &str) -> Result<f64>;

    fn name(&self) -> String;
}
