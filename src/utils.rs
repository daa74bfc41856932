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

use std::ops::Deref;
use std::time::Duration;

use scoped_pool::Pool;

pub fn to_millis(duration: Duration) -> u64 {
    (duration.as_secs() * 1_000) + (duration.subsec_nanos() / 1_000_000) as u64
}

/// A thread pool that is shut down when it goes out of scope, on every exit path.
pub(crate) struct PoolGuard(Pool);

impl PoolGuard {
    pub fn new(size: usize) -> Self {
        PoolGuard(Pool::new(size))
    }
}

impl Deref for PoolGuard {
    type Target = Pool;

    fn deref(&self) -> &Pool {
        &self.0
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}
