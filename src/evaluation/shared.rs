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

use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use log::{debug, info};

use crate::error::Result;
use crate::evaluation::{self, Accumulator, EvaluationConfig, Failures};
use crate::frame::Frame;
use crate::measures::Measure;
use crate::model::Model;
use crate::utils::{self, PoolGuard};

/// Runs one task per user on a pool of threads that all read the same model. Partial sums
/// are merged as soon as a task completes.
pub fn evaluate<M, S>(
    config: &EvaluationConfig,
    model: &M,
    testing: &Frame,
    measures: &[S],
    item_universe: Option<&[String]>,
) -> Result<Vec<f64>>
    where M: Model + Sync, S: Measure + Eq + Hash + Sync {

    let plan = evaluation::plan(config, testing, item_universe)?;

    let num_users = plan.users.len();
    let universe = &plan.universe;
    let non_relevant_count = config.non_relevant_count;
    let seed = config.seed;

    info!("Evaluating {} on {} users with {} threads", model.name(), num_users, config.pool_size);
    let start = Instant::now();

    let totals = Mutex::new(Accumulator::new());
    let failures = Failures::new();

    {
        let pool = PoolGuard::new(config.pool_size);

        pool.scoped(|scope| {
            for (position, task) in plan.users.iter().enumerate() {

                let totals = &totals;
                let failures = &failures;

                scope.execute(move || {
                    let ranked = evaluation::ranked_list(
                        model,
                        &task.user,
                        &task.items,
                        universe,
                        non_relevant_count,
                        seed,
                    );

                    match ranked {
                        Ok(ranked) => {
                            let partial = Accumulator::for_user(measures, &ranked);
                            totals.lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .merge(partial);
                        },
                        Err(error) => failures.record(position, &task.user, error),
                    }
                });
            }
        });
    }

    failures.into_result()?;

    debug!("Evaluated {} users in {}ms", num_users, utils::to_millis(start.elapsed()));

    let totals = totals.into_inner().unwrap_or_else(PoisonError::into_inner);
    Ok(totals.means(measures, num_users))
}
