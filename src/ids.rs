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

use fnv::FnvHashMap;
use serde_derive::{Deserialize, Serialize};

/// Dense, 1-based ids for the raw values of one categorical mode, assigned in first-seen order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct IdSpace {
    mode: String,
    ids: FnvHashMap<String, usize>,
    names: Vec<String>,
}

impl IdSpace {

    pub fn new(mode: &str) -> Self {
        IdSpace {
            mode: mode.to_owned(),
            ids: FnvHashMap::with_capacity_and_hasher(100, Default::default()),
            names: Vec::new(),
        }
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Number of distinct values seen, which is also the largest id.
    pub fn cardinality(&self) -> usize {
        self.names.len()
    }

    pub fn id_or_insert(&mut self, name: &str) -> usize {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }

        self.names.push(name.to_owned());
        let id = self.names.len();
        self.ids.insert(name.to_owned(), id);
        id
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).cloned()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.names.get(id - 1).map(String::as_str)
    }
}
