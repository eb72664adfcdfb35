// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading and writing visibility subsets.

use std::path::PathBuf;

use marlu::rubbl_casatables;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Visibility set {0} does not exist or is not readable!")]
    BadFile(PathBuf),

    #[error("The SPECTRAL_WINDOW table of {0} contained no channel frequencies")]
    NoChannelFreqs(PathBuf),

    #[error("{path} has no {column} column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path}: {column} in row {row} has shape {got:?}, but row 0 has shape {expected:?}")]
    BadCellShape {
        path: PathBuf,
        column: &'static str,
        row: u64,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("{path}: tried to write {got} rows of {column}, but the table has {expected}")]
    RowCountMismatch {
        path: PathBuf,
        column: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Error when trying to interface with measurement set: {0}")]
    Table(#[from] rubbl_casatables::TableError),

    #[error("Error from casacore: {0}")]
    Casacore(#[from] rubbl_casatables::CasacoreError),
}
