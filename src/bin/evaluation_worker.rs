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

use std::io;
use std::process;

use recoval::evaluation::isolated;
use recoval::{Metric, TensorCoFi};

/// Evaluates the users of one job for a TensorCoFi model. Reads the job as a single JSON line
/// from stdin and writes one JSON outcome per user to stdout.
fn main() {

    let stdin = io::stdin();
    let stdout = io::stdout();

    if let Err(error) = isolated::serve::<TensorCoFi, Metric, _, _>(stdin.lock(), stdout.lock()) {
        eprintln!("{}", error);
        process::exit(1);
    }
}
