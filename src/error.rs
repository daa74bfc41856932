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

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input shape or parameters, detected before any work starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot sample {requested} items from a universe of {available}")]
    Sampling { requested: usize, available: usize },

    #[error("unknown {mode} '{id}'")]
    Lookup { mode: String, id: String },

    #[error("singular system while solving for {mode} id {id}")]
    Factorization { mode: String, id: usize },

    /// A concurrent task failed, the original cause is kept as `source`.
    #[error("task for '{task}' failed")]
    Worker {
        task: String,
        #[source]
        source: Box<Error>,
    },

    #[error("worker protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Protocol(error.to_string())
    }
}

impl Error {

    pub(crate) fn configuration<S: Into<String>>(message: S) -> Self {
        Error::Configuration(message.into())
    }

    pub(crate) fn lookup(mode: &str, id: &str) -> Self {
        Error::Lookup { mode: mode.to_owned(), id: id.to_owned() }
    }
}

/// Serializable mirror of the error taxonomy, used to carry task failures back
/// from worker processes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum RemoteError {
    Configuration(String),
    Sampling { requested: usize, available: usize },
    Lookup { mode: String, id: String },
    Factorization { mode: String, id: usize },
    Other(String),
}

impl<'a> From<&'a Error> for RemoteError {
    fn from(error: &'a Error) -> Self {
        match error {
            Error::Configuration(message) => RemoteError::Configuration(message.clone()),
            Error::Sampling { requested, available } =>
                RemoteError::Sampling { requested: *requested, available: *available },
            Error::Lookup { mode, id } =>
                RemoteError::Lookup { mode: mode.clone(), id: id.clone() },
            Error::Factorization { mode, id } =>
                RemoteError::Factorization { mode: mode.clone(), id: *id },
            other => RemoteError::Other(other.to_string()),
        }
    }
}

impl From<RemoteError> for Error {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Configuration(message) => Error::Configuration(message),
            RemoteError::Sampling { requested, available } =>
                Error::Sampling { requested, available },
            RemoteError::Lookup { mode, id } => Error::Lookup { mode, id },
            RemoteError::Factorization { mode, id } => Error::Factorization { mode, id },
            RemoteError::Other(message) => Error::Protocol(message),
        }
    }
}
