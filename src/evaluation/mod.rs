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

// Offline evaluation of ranking quality.
//
// For every user in a test frame, the items the user interacted with are scored by the model
// together with `non_relevant_count` items drawn at random from an item universe. The
// candidates are ranked by score and every measure is computed on the ranking. The result is
// the mean of each measure over all users.
//
// Two strategies distribute the per-user work: a pool of threads sharing the model
// (`shared`), and a pool of worker processes that receive their own copy of the model
// (`isolated`).

use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use fnv::FnvHashMap;
use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::{Frame, ITEM, USER};
use crate::measures::{self, Measure, Ranked};
use crate::model::Model;
use crate::sampling;

pub mod isolated;
pub mod shared;

pub use self::isolated::WorkerCommand;

pub const DEFAULT_NON_RELEVANT_COUNT: usize = 100;
pub const DEFAULT_POOL_SIZE: usize = 4;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Number of randomly drawn candidates added to each user's relevant items.
    pub non_relevant_count: usize,
    /// Number of worker threads or worker processes.
    pub pool_size: usize,
    /// Seeds the negative sampling. Without a seed, draws differ between runs.
    pub seed: Option<u64>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            non_relevant_count: DEFAULT_NON_RELEVANT_COUNT,
            pool_size: DEFAULT_POOL_SIZE,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluationConfig,
}

impl Evaluator {

    pub fn new(config: EvaluationConfig) -> Self {
        Evaluator { config }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Evaluates `model` on `testing` with a pool of threads. The result is aligned with
    /// `measures`. Without an `item_universe`, negatives are drawn from the items in `testing`.
    pub fn evaluate<M, S>(
        &self,
        model: &M,
        testing: &Frame,
        measures: &[S],
        item_universe: Option<&[String]>,
    ) -> Result<Vec<f64>>
        where M: Model + Sync, S: Measure + Eq + Hash + Sync {

        shared::evaluate(&self.config, model, testing, measures, item_universe)
    }

    /// Same as [`Evaluator::evaluate`], but runs the users in separate worker processes which
    /// each receive a serialized copy of the model.
    pub fn evaluate_isolated<M, S>(
        &self,
        worker: &WorkerCommand,
        model: &M,
        testing: &Frame,
        measures: &[S],
        item_universe: Option<&[String]>,
    ) -> Result<Vec<f64>>
        where M: Model + serde::Serialize, S: Measure + serde::Serialize {

        isolated::evaluate(&self.config, worker, model, testing, measures, item_universe)
    }
}

/// The relevant items of one user.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UserTask {
    pub user: String,
    pub items: Vec<String>,
}

/// Validated input of one evaluation call.
pub(crate) struct Plan {
    pub users: Vec<UserTask>,
    pub universe: Vec<String>,
}

/// Checks all preconditions before any work happens and groups the rows by user.
pub(crate) fn plan(
    config: &EvaluationConfig,
    testing: &Frame,
    item_universe: Option<&[String]>,
) -> Result<Plan> {

    if config.pool_size == 0 {
        return Err(Error::configuration("pool size must be at least 1"));
    }

    testing.require_columns(&[USER, ITEM])?;

    let universe = match item_universe {
        Some(items) => items.to_vec(),
        None => testing.distinct(ITEM)?,
    };

    sampling::check(config.non_relevant_count, universe.len())?;

    let item_index = testing.column_index(ITEM)?;

    let users: Vec<UserTask> = testing.group_by(USER)?
        .into_iter()
        .map(|group| UserTask {
            items: group.rows.iter()
                .map(|row| testing.cell(*row, item_index).to_owned())
                .collect(),
            user: group.key,
        })
        .collect();

    if users.is_empty() {
        return Err(Error::configuration("no users to evaluate"));
    }

    Ok(Plan { users, universe })
}

/// Scores the relevant items of `user` and `non_relevant_count` sampled items, and ranks them.
/// Relevant candidates come first, so they win ties.
pub(crate) fn ranked_list<M: Model + ?Sized>(
    model: &M,
    user: &str,
    items: &[String],
    universe: &[String],
    non_relevant_count: usize,
    seed: Option<u64>,
) -> Result<Vec<Ranked>> {

    let mut candidates = Vec::with_capacity(items.len() + non_relevant_count);

    for item in items {
        candidates.push(Ranked::relevant(model.score(user, item)?));
    }

    let mut rng = sampling::rng_for(seed, user);

    for item in sampling::sample(&mut rng, universe, non_relevant_count)? {
        candidates.push(Ranked::non_relevant(model.score(user, item)?));
    }

    Ok(measures::rank(candidates))
}

/// Running per-measure sums.
#[derive(Debug)]
pub(crate) struct Accumulator<'m, S: Eq + Hash> {
    sums: FnvHashMap<&'m S, f64>,
}

impl<'m, S: Measure + Eq + Hash> Accumulator<'m, S> {

    pub fn new() -> Self {
        Accumulator { sums: FnvHashMap::default() }
    }

    /// The measures of a single ranked list.
    pub fn for_user(measures: &'m [S], ranked: &[Ranked]) -> Self {
        let mut accumulator = Accumulator::new();
        for measure in measures {
            accumulator.sums.entry(measure).or_insert_with(|| measure.measure(ranked));
        }
        accumulator
    }

    pub fn merge(&mut self, other: Accumulator<'m, S>) {
        for (measure, value) in other.sums {
            *self.sums.entry(measure).or_insert(0.0) += value;
        }
    }

    pub fn means(&self, measures: &[S], num_users: usize) -> Vec<f64> {
        measures.iter()
            .map(|measure| self.sums.get(measure).cloned().unwrap_or(0.0) / num_users as f64)
            .collect()
    }
}

/// Failures of concurrent tasks, reported for the earliest user so that the error does not
/// depend on scheduling.
pub(crate) struct Failures {
    failures: Mutex<Vec<(usize, String, Error)>>,
}

impl Failures {

    pub fn new() -> Self {
        Failures { failures: Mutex::new(Vec::new()) }
    }

    pub fn record(&self, position: usize, task: &str, error: Error) {
        self.failures.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((position, task.to_owned(), error));
    }

    pub fn into_result(self) -> Result<()> {
        let failures = self.failures.into_inner().unwrap_or_else(PoisonError::into_inner);

        match failures.into_iter().min_by_key(|(position, _, _)| *position) {
            Some((_, task, error)) => Err(Error::Worker { task, source: Box::new(error) }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {

    use crate::error::{Error, Result};
    use crate::evaluation::{EvaluationConfig, Evaluator};
    use crate::frame::Frame;
    use crate::measures::Metric;
    use crate::model::Model;

    /// Scores an item by its numeric identifier.
    pub struct IdentityModel;

    impl Model for IdentityModel {
        fn fit(&mut self, _training: &Frame) -> Result<()> {
            Ok(())
        }

        fn score(&self, _user: &str, item: &str) -> Result<f64> {
            item.parse::<f64>().map_err(|_| Error::lookup("item", item))
        }

        fn name(&self) -> String {
            String::from("Identity")
        }
    }

    /// Gives every candidate the same score.
    pub struct ConstantModel;

    impl Model for ConstantModel {
        fn fit(&mut self, _training: &Frame) -> Result<()> {
            Ok(())
        }

        fn score(&self, _user: &str, _item: &str) -> Result<f64> {
            Ok(0.5)
        }

        fn name(&self) -> String {
            String::from("Constant")
        }
    }

    fn close_enough_to(value: f64, expected: f64) -> bool {
        (value - expected).abs() < 1e-9
    }

    pub fn scenario() -> Frame {
        Frame::from_columns(&[
            ("user", &["1", "1", "3", "4"]),
            ("item", &["1", "2", "3", "4"]),
            ("rating", &["5", "3", "2", "1"]),
            ("timestamp", &["11", "12", "13", "14"]),
        ]).unwrap()
    }

    fn evaluator(non_relevant_count: usize, seed: Option<u64>) -> Evaluator {
        Evaluator::new(EvaluationConfig { non_relevant_count, seed, ..Default::default() })
    }

    #[test]
    fn identity_scenario() {
        let result = evaluator(2, None)
            .evaluate(&IdentityModel, &scenario(), &[Metric::MeanAveragePrecision], None)
            .unwrap();

        assert_eq!(result.len(), 1);
        assert!(result[0] >= 0.0 && result[0] <= 1.0);
    }

    #[test]
    fn result_is_aligned_with_measures() {
        let measures = [
            Metric::PrecisionAt(1),
            Metric::MeanAveragePrecision,
            Metric::PrecisionAt(1),
        ];

        let result = evaluator(0, None)
            .evaluate(&IdentityModel, &scenario(), &measures, None)
            .unwrap();

        assert_eq!(result.len(), 3);
        assert!(close_enough_to(result[0], 1.0));
        assert!(close_enough_to(result[1], 1.0));
        assert!(close_enough_to(result[2], 1.0));
    }

    #[test]
    fn relevant_only_rankings_have_perfect_map() {
        let result = evaluator(0, None)
            .evaluate(&IdentityModel, &scenario(), &[Metric::MeanAveragePrecision], None)
            .unwrap();

        assert!(close_enough_to(result[0], 1.0));
    }

    #[test]
    fn ties_favour_relevant_items() {
        let result = evaluator(4, None)
            .evaluate(&ConstantModel, &scenario(), &[Metric::MeanAveragePrecision], None)
            .unwrap();

        assert!(close_enough_to(result[0], 1.0));
    }

    #[test]
    fn explicit_universe_is_sampled() {
        let testing = Frame::from_columns(&[
            ("user", &["a", "a", "b"]),
            ("item", &["10", "20", "30"]),
        ]).unwrap();
        let universe: Vec<String> = vec!["1".into(), "2".into(), "3".into()];

        let result = evaluator(3, None)
            .evaluate(&IdentityModel, &testing, &[Metric::PrecisionAt(2)], Some(&universe))
            .unwrap();

        // User a ranks both relevant items first, user b only one of them
        assert!(close_enough_to(result[0], (1.0 + 0.5) / 2.0));
    }

    #[test]
    fn oversized_sample_request_fails_before_evaluation() {
        let result = evaluator(5, None)
            .evaluate(&IdentityModel, &scenario(), &[Metric::MeanAveragePrecision], None);

        match result {
            Err(Error::Sampling { requested, available }) => {
                assert_eq!(requested, 5);
                assert_eq!(available, 4);
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn missing_item_column_is_rejected() {
        let testing = Frame::from_columns(&[("user", &["1", "2"])]).unwrap();

        let result = evaluator(0, None)
            .evaluate(&IdentityModel, &testing, &[Metric::MeanAveragePrecision], None);

        match result {
            Err(Error::Configuration(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn empty_pool_is_rejected() {
        let config = EvaluationConfig { pool_size: 0, ..Default::default() };

        let result = Evaluator::new(config)
            .evaluate(&IdentityModel, &scenario(), &[Metric::MeanAveragePrecision], None);

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn failing_user_aborts_the_evaluation() {
        let testing = Frame::from_columns(&[
            ("user", &["1", "2", "3"]),
            ("item", &["1", "two", "3"]),
        ]).unwrap();
        let universe: Vec<String> = vec!["1".into(), "3".into()];

        let result = evaluator(1, None)
            .evaluate(&IdentityModel, &testing, &[Metric::MeanAveragePrecision], Some(&universe));

        match result {
            Err(Error::Worker { task, source }) => {
                assert_eq!(task, "2");
                assert!(matches!(*source, Error::Lookup { .. }));
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn aggregate_does_not_depend_on_user_order() {
        let testing = Frame::from_columns(&[
            ("user", &["u1", "u1", "u2", "u3", "u3", "u4", "u5"]),
            ("item", &["1", "7", "3", "9", "2", "5", "8"]),
        ]).unwrap();
        let reversed = Frame::from_columns(&[
            ("user", &["u5", "u4", "u3", "u3", "u2", "u1", "u1"]),
            ("item", &["8", "5", "2", "9", "3", "7", "1"]),
        ]).unwrap();
        let universe: Vec<String> = (1..=10).map(|item| item.to_string()).collect();
        let measures = [Metric::MeanAveragePrecision, Metric::PrecisionAt(3)];

        let evaluator = evaluator(4, Some(42));
        let forward = evaluator.evaluate(&IdentityModel, &testing, &measures, Some(&universe))
            .unwrap();
        let backward = evaluator.evaluate(&IdentityModel, &reversed, &measures, Some(&universe))
            .unwrap();

        assert_eq!(forward.len(), backward.len());
        for (a, b) in forward.iter().zip(backward.iter()) {
            assert!(close_enough_to(*a, *b));
        }
    }
}
