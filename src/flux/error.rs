// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with fit results and flux models.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::{DataColumn, StoreError};

/// A fit result couldn't be used.
#[derive(Error, Debug)]
pub enum FitResultError {
    #[error("The fit result {0} contains no rows")]
    Empty(PathBuf),

    #[error("{path} line {line}: expected at least a frequency and a flux, got '{content}'")]
    Malformed {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("Couldn't read the fit result {path}: {err}")]
    IO { path: PathBuf, err: std::io::Error },
}

#[derive(Error, Debug)]
pub enum FluxModelError {
    #[error(transparent)]
    Fit(#[from] FitResultError),

    #[error("The fit result has {fit} rows, but the subset has {channels} channels")]
    LengthMismatch { fit: usize, channels: usize },

    #[error("The {0} frequencies are not strictly monotonic; can't match the fit result to the subset's channels")]
    NotMonotonic(&'static str),

    #[error("The subset's {column} column has {got} channels, but its spectral window has {expected}")]
    ChannelMismatch {
        column: DataColumn,
        expected: usize,
        got: usize,
    },

    #[error("Residuals can only be made from the data or corrected column, not {0}")]
    ResidualColumn(DataColumn),

    #[error(transparent)]
    Store(#[from] StoreError),
}
