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

// Alternating least squares for implicit feedback over an arbitrary number of modes.
//
// Every mode (e.g. users, items, or a context such as the device) gets a dense factor matrix
// with one column per id. A sweep updates the modes one after the other; the update of a mode
// solves one small linear system per id while all other modes are held fixed, and later modes
// already see the new columns of earlier modes (block Gauss-Seidel). Observations are turned
// into confidence weights `1 + alpha * ln(1 + |score|)`.

use std::cmp;
use std::time::Instant;

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tensor::InteractionTensor;
use crate::utils::{self, PoolGuard};

/// Pivots of the LU decomposition that are this small relative to the largest one mark the
/// system as singular.
const SINGULARITY_TOLERANCE: f64 = 1e-12;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AlsParams {
    /// Number of latent factors per id.
    pub factors: usize,
    /// Number of full sweeps over all modes.
    pub iterations: usize,
    /// Regularization, divided by the cardinality of the mode being solved.
    pub lambda: f64,
    /// Confidence scaling of observed interactions.
    pub alpha: f64,
    /// Seeds the random initialization of the factor matrices.
    pub seed: Option<u64>,
    /// Threads for the per-id solves within a mode.
    pub threads: usize,
}

impl Default for AlsParams {
    fn default() -> Self {
        AlsParams {
            factors: 20,
            iterations: 5,
            lambda: 0.05,
            alpha: 40.0,
            seed: None,
            threads: num_cpus::get(),
        }
    }
}

impl AlsParams {

    fn validate(&self) -> Result<()> {
        if self.factors == 0 {
            return Err(Error::configuration("the number of factors must be at least 1"));
        }
        if self.threads == 0 {
            return Err(Error::configuration("at least one thread is required"));
        }
        if !(self.lambda >= 0.0 && self.lambda.is_finite()) {
            return Err(Error::configuration(format!("invalid lambda {}", self.lambda)));
        }
        if !self.alpha.is_finite() {
            return Err(Error::configuration(format!("invalid alpha {}", self.alpha)));
        }
        Ok(())
    }
}

/// The learned factor matrices, one `factors x cardinality` matrix per mode. Column `v - 1` is
/// the embedding of id `v`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Factors {
    modes: Vec<String>,
    matrices: Vec<DMatrix<f64>>,
}

impl Factors {

    pub fn modes(&self) -> &[String] {
        &self.modes
    }

    pub fn num_modes(&self) -> usize {
        self.matrices.len()
    }

    pub fn num_factors(&self) -> usize {
        self.matrices.first().map(DMatrix::nrows).unwrap_or(0)
    }

    pub fn matrix(&self, mode: usize) -> Result<&DMatrix<f64>> {
        self.matrices.get(mode).ok_or_else(|| Error::configuration(format!(
            "mode {} out of range, factors have {} modes", mode, self.num_modes())))
    }

    fn check_id(&self, mode: usize, id: usize) -> Result<()> {
        if id == 0 || id > self.matrices[mode].ncols() {
            Err(Error::lookup(&self.modes[mode], &id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Generalized inner product: the sum over all factors of the product of each mode's
    /// column for the given ids.
    pub fn score(&self, ids: &[usize]) -> Result<f64> {
        if ids.len() != self.num_modes() {
            return Err(Error::configuration(format!(
                "expected {} ids, received {}", self.num_modes(), ids.len())));
        }

        let mut product = DVector::from_element(self.num_factors(), 1.0);

        for (mode, id) in ids.iter().enumerate() {
            self.check_id(mode, *id)?;
            product.component_mul_assign(&self.matrices[mode].column(id - 1));
        }

        Ok(product.sum())
    }

    /// Solves for the factors of a new entity from the ids of `mode` it interacted with,
    /// holding that mode's factors fixed. Consumed ids get confidence `confidence`, all others
    /// confidence 1.
    pub fn fold_in(
        &self,
        mode: usize,
        ids: &[usize],
        confidence: f64,
        regularization: f64,
    ) -> Result<DVector<f64>> {

        let factors = self.matrix(mode)?;
        let k = factors.nrows();

        let mut invertible = factors * factors.transpose();
        let mut rhs = DVector::zeros(k);

        for id in ids {
            self.check_id(mode, *id)?;
            let column = factors.column(id - 1);
            invertible.ger(confidence - 1.0, &column, &column, 1.0);
            rhs.axpy(confidence, &column, 1.0);
        }

        for diagonal in 0..k {
            invertible[(diagonal, diagonal)] += regularization;
        }

        solve(invertible, &rhs).ok_or_else(|| Error::Factorization {
            mode: format!("fold-in over {}", self.modes[mode]),
            id: 0,
        })
    }
}

#[inline]
fn confidence(alpha: f64, score: f64) -> f64 {
    1.0 + alpha * (1.0 + score.abs()).ln()
}

/// Hadamard product of the Gram matrices of all modes except `mode`.
fn base_matrix(matrices: &[DMatrix<f64>], mode: usize, k: usize) -> DMatrix<f64> {
    let mut base = DMatrix::from_element(k, k, 1.0);

    for (other, factors) in matrices.iter().enumerate() {
        if other != mode {
            base.component_mul_assign(&(factors * factors.transpose()));
        }
    }

    base
}

/// Solves `a x = b`, or returns `None` when `a` is numerically singular.
fn solve(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let lu = a.lu();

    if !lu.is_invertible() {
        return None;
    }

    let pivots = lu.u().diagonal().map(f64::abs);
    let largest = pivots.max();

    if !(largest > 0.0) || pivots.min() <= largest * SINGULARITY_TOLERANCE {
        return None;
    }

    lu.solve(b).filter(|x| x.iter().all(|value| value.is_finite()))
}

/// Everything a single per-id solve of one mode reads.
struct ModeUpdate<'a> {
    tensor: &'a InteractionTensor,
    matrices: &'a [DMatrix<f64>],
    index: &'a [Vec<usize>],
    base: &'a DMatrix<f64>,
    mode: usize,
    regularization: f64,
    alpha: f64,
}

impl<'a> ModeUpdate<'a> {

    /// The new column for the id at `position` (id `position + 1`).
    fn solve_id(&self, position: usize) -> Result<DVector<f64>> {

        let k = self.base.nrows();

        let mut invertible = DMatrix::zeros(k, k);
        let mut rhs = DVector::zeros(k);
        let mut t = DVector::from_element(k, 1.0);

        for row in self.index[position].iter() {

            t.fill(1.0);

            for (other, factors) in self.matrices.iter().enumerate() {
                if other != self.mode {
                    t.component_mul_assign(&factors.column(self.tensor.id(*row, other) - 1));
                }
            }

            let score = self.tensor.score(*row);
            let weight = confidence(self.alpha, score);

            invertible.ger(weight - 1.0, &t, &t, 1.0);
            rhs.axpy(1.0_f64.copysign(score) * weight, &t, 1.0);
        }

        invertible += self.base;

        for diagonal in 0..k {
            invertible[(diagonal, diagonal)] += self.regularization;
        }

        solve(invertible, &rhs).ok_or_else(|| Error::Factorization {
            mode: self.tensor.modes()[self.mode].clone(),
            id: position + 1,
        })
    }
}

/// Fits one factor matrix per mode of `tensor`.
pub fn train(tensor: &InteractionTensor, params: &AlsParams) -> Result<Factors> {

    params.validate()?;

    if tensor.num_modes() < 2 {
        return Err(Error::configuration("factorization needs at least two modes"));
    }

    let k = params.factors;

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut matrices: Vec<DMatrix<f64>> = tensor.cardinalities().iter()
        .map(|cardinality| DMatrix::from_fn(k, *cardinality, |_, _| rng.gen::<f64>()))
        .collect();

    let indexes: Vec<Vec<Vec<usize>>> = (0..tensor.num_modes())
        .map(|mode| tensor.inverted_index(mode))
        .collect();

    info!("Training {} factors over modes {:?} with cardinalities {:?} from {} observations",
        k, tensor.modes(), tensor.cardinalities(), tensor.num_rows());

    let training_start = Instant::now();
    let pool = PoolGuard::new(params.threads);

    for iteration in 0..params.iterations {

        let sweep_start = Instant::now();

        for mode in 0..tensor.num_modes() {

            let cardinality = tensor.cardinality(mode);
            let base = base_matrix(&matrices, mode, k);

            let update = ModeUpdate {
                tensor,
                matrices: &matrices,
                index: &indexes[mode],
                base: &base,
                mode,
                regularization: params.lambda / cardinality as f64,
                alpha: params.alpha,
            };

            let mut columns: Vec<Result<DVector<f64>>> =
                (0..cardinality).map(|_| Ok(DVector::zeros(k))).collect();

            let chunk_size = cmp::max(1, (cardinality + params.threads - 1) / params.threads);

            pool.scoped(|scope| {
                for (chunk, slots) in columns.chunks_mut(chunk_size).enumerate() {
                    let update = &update;
                    scope.execute(move || {
                        for (offset, slot) in slots.iter_mut().enumerate() {
                            *slot = update.solve_id(chunk * chunk_size + offset);
                        }
                    });
                }
            });

            let columns = columns.into_iter().collect::<Result<Vec<DVector<f64>>>>()?;

            for (position, column) in columns.iter().enumerate() {
                matrices[mode].set_column(position, column);
            }
        }

        debug!("Sweep {}/{} took {}ms", iteration + 1, params.iterations,
            utils::to_millis(sweep_start.elapsed()));
    }

    info!("Trained factors in {}ms", utils::to_millis(training_start.elapsed()));

    Ok(Factors { modes: tensor.modes().to_vec(), matrices })
}

#[cfg(test)]
mod tests {

    use nalgebra::{DMatrix, DVector};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::als::{self, AlsParams};
    use crate::error::Error;
    use crate::tensor::InteractionTensor;

    fn params(factors: usize, iterations: usize, lambda: f64, seed: u64) -> AlsParams {
        AlsParams {
            factors,
            iterations,
            lambda,
            alpha: 40.0,
            seed: Some(seed),
            threads: 2,
        }
    }

    fn two_blocks() -> InteractionTensor {
        let modes = vec![String::from("user"), String::from("item")];
        let mut tensor = InteractionTensor::new(modes, vec![4, 4]).unwrap();

        for &(user, item) in &[(1, 1), (1, 2), (2, 1), (2, 2), (3, 3), (3, 4), (4, 3), (4, 4)] {
            tensor.push(&[user, item], 1.0).unwrap();
        }

        tensor
    }

    #[test]
    fn confidence_grows_logarithmically() {
        assert_eq!(als::confidence(40.0, 0.0), 1.0);
        assert!((als::confidence(40.0, 1.0) - (1.0 + 40.0 * 2.0_f64.ln())).abs() < 1e-12);
        assert_eq!(als::confidence(40.0, -1.0), als::confidence(40.0, 1.0));
    }

    #[test]
    fn base_is_hadamard_product_of_other_grams() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 1.0, 2.0, 1.0, 0.0]);
        let c = DMatrix::from_row_slice(2, 1, &[2.0, 3.0]);

        let base = als::base_matrix(&[a.clone(), b.clone(), c.clone()], 0, 2);
        let expected = (&b * b.transpose()).component_mul(&(&c * c.transpose()));
        assert_eq!(base, expected);

        let two_modes = als::base_matrix(&[a.clone(), b.clone()], 1, 2);
        assert_eq!(two_modes, &a * a.transpose());
    }

    #[test]
    fn seeded_training_is_reproducible() {
        let tensor = two_blocks();

        let first = als::train(&tensor, &params(3, 4, 0.05, 17)).unwrap();
        let second = als::train(&tensor, &params(3, 4, 0.05, 17)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn thread_count_does_not_change_the_result() {
        let tensor = two_blocks();

        let mut sequential = params(3, 3, 0.05, 5);
        sequential.threads = 1;
        let mut parallel = params(3, 3, 0.05, 5);
        parallel.threads = 3;

        assert_eq!(als::train(&tensor, &sequential).unwrap(),
            als::train(&tensor, &parallel).unwrap());
    }

    #[test]
    fn observed_pairs_outscore_unobserved_ones() {
        let factors = als::train(&two_blocks(), &params(4, 10, 0.05, 3)).unwrap();

        let observed = factors.score(&[1, 2]).unwrap();
        let unobserved = factors.score(&[1, 3]).unwrap();

        assert!(observed > unobserved);
        assert!(factors.score(&[4, 4]).unwrap() > factors.score(&[4, 1]).unwrap());
    }

    #[test]
    fn unknown_ids_cannot_be_scored() {
        let factors = als::train(&two_blocks(), &params(2, 1, 0.05, 1)).unwrap();

        assert!(matches!(factors.score(&[5, 1]), Err(Error::Lookup { .. })));
        assert!(matches!(factors.score(&[1, 0]), Err(Error::Lookup { .. })));
    }

    #[test]
    fn singular_system_is_reported() {
        let modes = vec![String::from("user"), String::from("item")];
        let mut tensor = InteractionTensor::new(modes, vec![1, 1]).unwrap();
        tensor.push(&[1, 1], 1.0).unwrap();

        match als::train(&tensor, &params(3, 1, 0.0, 9)) {
            Err(Error::Factorization { mode, id }) => {
                assert_eq!(mode, "user");
                assert_eq!(id, 1);
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let tensor = two_blocks();
        assert!(matches!(als::train(&tensor, &params(0, 1, 0.05, 1)),
            Err(Error::Configuration(_))));
        assert!(matches!(als::train(&tensor, &params(2, 1, -1.0, 1)),
            Err(Error::Configuration(_))));
    }

    #[test]
    fn one_sweep_updates_modes_in_turn() {
        let (k, lambda, alpha, seed) = (2, 0.1, 2.0, 13);

        let modes = vec![String::from("user"), String::from("item")];
        let mut tensor = InteractionTensor::new(modes, vec![2, 3]).unwrap();
        let observations = [(1, 1, 2.0), (1, 2, -1.0), (2, 2, 3.0), (2, 3, 0.5)];
        for &(user, item, score) in &observations {
            tensor.push(&[user, item], score).unwrap();
        }

        let factors = als::train(&tensor, &AlsParams {
            factors: k,
            iterations: 1,
            lambda,
            alpha,
            seed: Some(seed),
            threads: 2,
        }).unwrap();

        // Same draws as the initialization, users first
        let mut rng = StdRng::seed_from_u64(seed);
        let mut users = DMatrix::from_fn(k, 2, |_, _| rng.gen::<f64>());
        let mut items = DMatrix::from_fn(k, 3, |_, _| rng.gen::<f64>());

        for user in 0..2 {
            let mut a = &items * items.transpose() + DMatrix::identity(k, k) * (lambda / 2.0);
            let mut b = DVector::zeros(k);
            for &(_, i, score) in observations.iter().filter(|o| o.0 == user + 1) {
                let weight = 1.0 + alpha * (1.0 + f64::abs(score)).ln();
                let t = items.column(i - 1).clone_owned();
                a += (weight - 1.0) * &t * t.transpose();
                b += f64::signum(score) * weight * &t;
            }
            users.set_column(user, &(a.try_inverse().unwrap() * b));
        }

        // Items already see the users of this sweep
        for item in 0..3 {
            let mut a = &users * users.transpose() + DMatrix::identity(k, k) * (lambda / 3.0);
            let mut b = DVector::zeros(k);
            for &(u, _, score) in observations.iter().filter(|o| o.1 == item + 1) {
                let weight = 1.0 + alpha * (1.0 + f64::abs(score)).ln();
                let t = users.column(u - 1).clone_owned();
                a += (weight - 1.0) * &t * t.transpose();
                b += f64::signum(score) * weight * &t;
            }
            items.set_column(item, &(a.try_inverse().unwrap() * b));
        }

        assert!((factors.matrix(0).unwrap() - &users).amax() < 1e-9);
        assert!((factors.matrix(1).unwrap() - &items).amax() < 1e-9);
    }

    #[test]
    fn out_of_range_modes_are_rejected() {
        let factors = als::train(&two_blocks(), &params(2, 1, 0.05, 1)).unwrap();

        assert!(matches!(factors.matrix(2), Err(Error::Configuration(_))));
        assert!(matches!(factors.fold_in(5, &[1], 10.0, 0.01), Err(Error::Configuration(_))));
    }

    #[test]
    fn folded_in_user_prefers_consumed_items() {
        let factors = als::train(&two_blocks(), &params(4, 10, 0.05, 11)).unwrap();

        let user = factors.fold_in(1, &[3, 4], 10.0, 0.01).unwrap();
        assert_eq!(user.len(), 4);

        let items = factors.matrix(1).unwrap();
        let consumed = user.dot(&items.column(2));
        let other = user.dot(&items.column(0));
        assert!(consumed > other);

        assert!(matches!(factors.fold_in(1, &[9], 10.0, 0.01), Err(Error::Lookup { .. })));
    }
}
