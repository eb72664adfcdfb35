// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Direct access to the visibilities of a subset.
//!
//! Almost all store operations are delegated to the external toolkit. The
//! exceptions are the channel frequencies and the complex data columns, which
//! the flux extractor reads and writes itself.

mod error;
mod ms;

pub use error::StoreError;
pub use ms::{read_gain_table, GainSolutions, MsStore};

use std::path::Path;

use marlu::c32;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// The complex visibility columns of a subset.
#[derive(
    Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DataColumn {
    /// Observed visibilities.
    #[strum(serialize = "data")]
    Data,

    /// Calibrated visibilities (or residuals, once written).
    #[strum(serialize = "corrected")]
    Corrected,

    #[strum(serialize = "model")]
    Model,
}

impl DataColumn {
    /// The name of this column in a measurement set.
    pub fn ms_column(self) -> &'static str {
        match self {
            DataColumn::Data => "DATA",
            DataColumn::Corrected => "CORRECTED_DATA",
            DataColumn::Model => "MODEL_DATA",
        }
    }
}

/// Read/write access to the columns of a visibility subset. Cubes are shaped
/// (row, channel, polarisation).
pub trait VisStore: Sync {
    /// The channel frequencies of the subset's (only) spectral window [Hz].
    fn chan_freqs(&self, subset: &Path) -> Result<Vec<f64>, StoreError>;

    fn read_column(&self, subset: &Path, column: DataColumn) -> Result<Array3<c32>, StoreError>;

    /// Write all of `columns` while holding the subset open once. Nothing is
    /// written if any cube doesn't match the subset's row count.
    fn write_columns(
        &self,
        subset: &Path,
        columns: &[(DataColumn, &Array3<c32>)],
    ) -> Result<(), StoreError>;
}
