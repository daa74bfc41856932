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

use std::cmp::Ordering;
use std::fmt::Debug;

use serde_derive::{Deserialize, Serialize};

/// One entry of a ranked candidate list.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub relevant: bool,
    pub score: f64,
}

impl Ranked {
    pub fn relevant(score: f64) -> Self {
        Ranked { relevant: true, score }
    }

    pub fn non_relevant(score: f64) -> Self {
        Ranked { relevant: false, score }
    }
}

/// Descending order on scores. There is no total order on floating point numbers, so
/// incomparable scores are treated as equal.
fn cmp_descending(a: &Ranked, b: &Ranked) -> Ordering {
    match a.score.partial_cmp(&b.score) {
        Some(ordering) => ordering.reverse(),
        None => Ordering::Equal,
    }
}

/// Sorts candidates by descending score. The sort is stable, entries with equal scores keep
/// their insertion order.
pub fn rank(mut candidates: Vec<Ranked>) -> Vec<Ranked> {
    candidates.sort_by(cmp_descending);
    candidates
}

/// A ranking-quality measure. Implementations must be pure, they are shared across users
/// and threads.
pub trait Measure: Debug {
    fn measure(&self, ranked: &[Ranked]) -> f64;

    fn name(&self) -> String;
}

/// The built-in measures. Hashable so that they can key the per-measure accumulators.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    MeanAveragePrecision,
    PrecisionAt(usize),
}

impl Measure for Metric {

    fn measure(&self, ranked: &[Ranked]) -> f64 {
        match *self {
            Metric::MeanAveragePrecision => mean_average_precision(ranked),
            Metric::PrecisionAt(cutoff) => precision_at(ranked, cutoff),
        }
    }

    fn name(&self) -> String {
        match *self {
            Metric::MeanAveragePrecision => String::from("MAP"),
            Metric::PrecisionAt(cutoff) => format!("P@{}", cutoff),
        }
    }
}

impl Default for Metric {
    fn default() -> Self {
        Metric::MeanAveragePrecision
    }
}

/// Average of precision@k over the positions k of all relevant entries. A list without
/// relevant entries scores 0.
pub fn mean_average_precision(ranked: &[Ranked]) -> f64 {

    let mut num_relevant_seen = 0_usize;
    let mut sum_of_precisions = 0.0;

    for (position, entry) in ranked.iter().enumerate() {
        if entry.relevant {
            num_relevant_seen += 1;
            sum_of_precisions += num_relevant_seen as f64 / (position + 1) as f64;
        }
    }

    if num_relevant_seen == 0 {
        0.0
    } else {
        sum_of_precisions / num_relevant_seen as f64
    }
}

/// Fraction of relevant entries among the first `cutoff` positions.
pub fn precision_at(ranked: &[Ranked], cutoff: usize) -> f64 {
    if cutoff == 0 {
        return 0.0;
    }

    let num_relevant = ranked.iter().take(cutoff).filter(|entry| entry.relevant).count();
    num_relevant as f64 / cutoff as f64
}
