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

use std::hash::Hasher;

use fnv::FnvHasher;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// Fails unless `requested` distinct draws are possible from `available` values.
pub fn check(requested: usize, available: usize) -> Result<()> {
    if requested > available {
        Err(Error::Sampling { requested, available })
    } else {
        Ok(())
    }
}

/// Draws `count` distinct positions of `universe` uniformly at random and returns the values
/// at those positions.
pub fn sample<'a, T, R: Rng + ?Sized>(
    rng: &mut R,
    universe: &'a [T],
    count: usize,
) -> Result<Vec<&'a T>> {

    check(count, universe.len())?;

    Ok(index::sample(rng, universe.len(), count)
        .into_iter()
        .map(|position| &universe[position])
        .collect())
}

/// The random source for the negative samples of one user. With a seed, the draws only depend
/// on the seed and the user, not on the order in which users are processed.
pub fn rng_for(seed: Option<u64>, user: &str) -> StdRng {
    match seed {
        Some(seed) => {
            let mut hasher = FnvHasher::default();
            hasher.write(user.as_bytes());
            StdRng::seed_from_u64(seed ^ hasher.finish())
        },
        None => StdRng::from_entropy(),
    }
}
