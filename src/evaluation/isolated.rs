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

use std::cmp;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, RemoteError, Result};
use crate::evaluation::{self, EvaluationConfig};
use crate::frame::Frame;
use crate::measures::Measure;
use crate::model::Model;
use crate::utils::{self, PoolGuard};

/// How to start a worker process. The worker reads one job from stdin and answers on stdout,
/// see [`serve`].
///
/// A worker only understands the model and measure types it was built for. The default
/// command runs the bundled `evaluation-worker`, which serves `TensorCoFi` with `Metric`;
/// any other model type needs its own worker binary calling [`serve`], otherwise every job
/// fails with `Error::Protocol` because the model cannot be deserialized.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkerCommand {

    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        WorkerCommand { program: program.into(), args: Vec::new() }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Default for WorkerCommand {
    fn default() -> Self {
        WorkerCommand::new("evaluation-worker")
    }
}

#[derive(Serialize, Debug)]
struct TaskRef<'a> {
    position: usize,
    user: &'a str,
    items: &'a [String],
}

#[derive(Serialize)]
struct JobRef<'a, M: 'a, S: 'a> {
    model: &'a M,
    universe: &'a [String],
    measures: &'a [S],
    non_relevant_count: usize,
    seed: Option<u64>,
    tasks: Vec<TaskRef<'a>>,
}

#[derive(Deserialize, Debug)]
struct Task {
    position: usize,
    user: String,
    items: Vec<String>,
}

/// The work handed to one worker process: its own copy of the model and measures, plus the
/// users it is responsible for.
#[derive(Deserialize)]
struct Job<M, S> {
    model: M,
    universe: Vec<String>,
    measures: Vec<S>,
    non_relevant_count: usize,
    seed: Option<u64>,
    tasks: Vec<Task>,
}

/// The answer of a worker process for one user, one line of JSON each.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TaskOutcome {
    position: usize,
    user: String,
    result: std::result::Result<Vec<f64>, RemoteError>,
}

/// Distributes the users round-robin over worker processes, waits for all of them and sums
/// the measure values of all users element-wise.
pub fn evaluate<M, S>(
    config: &EvaluationConfig,
    worker: &WorkerCommand,
    model: &M,
    testing: &Frame,
    measures: &[S],
    item_universe: Option<&[String]>,
) -> Result<Vec<f64>>
    where M: Model + serde::Serialize, S: Measure + serde::Serialize {

    let plan = evaluation::plan(config, testing, item_universe)?;

    let num_users = plan.users.len();
    let num_workers = cmp::min(config.pool_size, num_users);

    info!("Evaluating {} on {} users with {} worker processes", model.name(), num_users,
        num_workers);
    let start = Instant::now();

    let mut assignments: Vec<Vec<TaskRef>> = (0..num_workers).map(|_| Vec::new()).collect();

    for (position, task) in plan.users.iter().enumerate() {
        assignments[position % num_workers].push(TaskRef {
            position,
            user: &task.user,
            items: &task.items,
        });
    }

    let mut payloads = Vec::with_capacity(num_workers);

    for tasks in assignments {
        let job = JobRef {
            model,
            universe: &plan.universe,
            measures,
            non_relevant_count: config.non_relevant_count,
            seed: config.seed,
            tasks,
        };
        payloads.push(serde_json::to_vec(&job)?);
    }

    let mut outputs: Vec<Option<Result<Vec<TaskOutcome>>>> =
        (0..num_workers).map(|_| None).collect();

    {
        let pool = PoolGuard::new(num_workers);

        pool.scoped(|scope| {
            for (payload, output) in payloads.into_iter().zip(outputs.iter_mut()) {
                scope.execute(move || {
                    *output = Some(run_worker(worker, payload));
                });
            }
        });
    }

    let mut outcomes = Vec::with_capacity(num_users);

    for (worker_index, output) in outputs.into_iter().enumerate() {
        match output {
            Some(Ok(worker_outcomes)) => outcomes.extend(worker_outcomes),
            Some(Err(error)) => {
                return Err(Error::Worker {
                    task: format!("worker process {}", worker_index),
                    source: Box::new(error),
                });
            },
            None => {
                return Err(Error::Protocol(format!("worker process {} never ran", worker_index)));
            },
        }
    }

    if outcomes.len() != num_users {
        return Err(Error::Protocol(format!(
            "expected results for {} users, received {}", num_users, outcomes.len())));
    }

    outcomes.sort_by_key(|outcome| outcome.position);

    let mut sums = vec![0.0; measures.len()];

    for outcome in outcomes {
        let TaskOutcome { user, result, .. } = outcome;

        let values = result.map_err(|remote| Error::Worker {
            task: user.clone(),
            source: Box::new(remote.into()),
        })?;

        if values.len() != measures.len() {
            return Err(Error::Protocol(format!(
                "expected {} measures for '{}', received {}",
                measures.len(), user, values.len())));
        }

        for (sum, value) in sums.iter_mut().zip(values) {
            *sum += value;
        }
    }

    debug!("Evaluated {} users in {}ms", num_users, utils::to_millis(start.elapsed()));

    Ok(sums.into_iter().map(|sum| sum / num_users as f64).collect())
}

/// Starts a worker, hands it the job and blocks until it exits.
fn run_worker(worker: &WorkerCommand, payload: Vec<u8>) -> Result<Vec<TaskOutcome>> {

    let mut child = Command::new(&worker.program)
        .args(&worker.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    debug!("Started worker process {}", child.id());

    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(&payload).and_then(|_| stdin.write_all(b"\n")),
        None => Ok(()),
    };

    let output = child.wait_with_output()?;

    if !output.status.success() {
        return Err(Error::Protocol(format!(
            "worker exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim())));
    }

    written?;

    let mut outcomes = Vec::new();

    for line in output.stdout.split(|byte| *byte == b'\n') {
        if !line.is_empty() {
            outcomes.push(serde_json::from_slice(line)?);
        }
    }

    Ok(outcomes)
}

/// The worker side of the protocol: reads a job, evaluates its users one after the other and
/// writes one outcome per user. Failures of single users are reported in their outcome,
/// malformed input fails the whole worker.
pub fn serve<M, S, R, W>(mut input: R, mut output: W) -> Result<()>
    where M: Model + DeserializeOwned, S: Measure + DeserializeOwned, R: BufRead, W: Write {

    let mut line = String::new();
    input.read_line(&mut line)?;

    if line.trim().is_empty() {
        return Err(Error::Protocol(String::from("received an empty job")));
    }

    let job: Job<M, S> = serde_json::from_str(&line)?;
    let Job { model, universe, measures, non_relevant_count, seed, tasks } = job;

    for task in tasks {

        let result = evaluation::ranked_list(
                &model,
                &task.user,
                &task.items,
                &universe,
                non_relevant_count,
                seed,
            )
            .map(|ranked| {
                measures.iter()
                    .map(|measure| measure.measure(&ranked))
                    .collect::<Vec<f64>>()
            })
            .map_err(|error| RemoteError::from(&error));

        let outcome = TaskOutcome { position: task.position, user: task.user, result };

        serde_json::to_writer(&mut output, &outcome)?;
        output.write_all(b"\n")?;
    }

    output.flush()?;

    Ok(())
}
