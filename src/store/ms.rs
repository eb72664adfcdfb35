// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Measurement-set access via casacore.

use std::path::{Path, PathBuf};

use log::{debug, trace};
use marlu::{
    c32,
    rubbl_casatables::{Table, TableOpenMode},
};
use ndarray::prelude::*;

use super::{DataColumn, StoreError, VisStore};

/// Open a table of a measurement set. If `table` is `None`, then open the
/// main table.
fn open_table(ms: &Path, table: Option<&str>, mode: TableOpenMode) -> Result<Table, StoreError> {
    if !ms.exists() {
        return Err(StoreError::BadFile(ms.to_path_buf()));
    }
    let t = Table::open(
        format!("{}/{}", ms.display(), table.unwrap_or("")),
        mode,
    )?;
    Ok(t)
}

fn ensure_column(t: &mut Table, ms: &Path, column: &'static str) -> Result<(), StoreError> {
    if t.column_names()?.iter().any(|c| c == column) {
        Ok(())
    } else {
        Err(StoreError::MissingColumn {
            path: ms.to_path_buf(),
            column,
        })
    }
}

/// Read every cell of a 2D complex column into a (row, dim0, dim1) cube. All
/// cells must share a shape.
fn read_complex_cube(
    t: &mut Table,
    ms: &Path,
    column: &'static str,
) -> Result<Array3<c32>, StoreError> {
    ensure_column(t, ms, column)?;
    let num_rows = t.n_rows();
    if num_rows == 0 {
        return Ok(Array3::zeros((0, 0, 0)));
    }

    let first: Array2<c32> = t.get_cell(column, 0)?;
    let shape = first.dim();
    let mut cube = Array3::zeros((num_rows as usize, shape.0, shape.1));
    cube.slice_mut(s![0, .., ..]).assign(&first);
    for row in 1..num_rows {
        let cell: Array2<c32> = t.get_cell(column, row)?;
        if cell.dim() != shape {
            return Err(StoreError::BadCellShape {
                path: ms.to_path_buf(),
                column,
                row,
                expected: shape,
                got: cell.dim(),
            });
        }
        cube.slice_mut(s![row as usize, .., ..]).assign(&cell);
    }
    Ok(cube)
}

/// Visibility subsets stored as casacore measurement sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsStore;

impl VisStore for MsStore {
    fn chan_freqs(&self, subset: &Path) -> Result<Vec<f64>, StoreError> {
        let mut spw_table = open_table(subset, Some("SPECTRAL_WINDOW"), TableOpenMode::Read)?;
        if spw_table.n_rows() == 0 {
            return Err(StoreError::NoChannelFreqs(subset.to_path_buf()));
        }
        let freqs: Vec<f64> = spw_table.get_cell_as_vec("CHAN_FREQ", 0)?;
        if freqs.is_empty() {
            return Err(StoreError::NoChannelFreqs(subset.to_path_buf()));
        }
        trace!("{}: {} channel frequencies", subset.display(), freqs.len());
        Ok(freqs)
    }

    fn read_column(&self, subset: &Path, column: DataColumn) -> Result<Array3<c32>, StoreError> {
        debug!("Reading {} from {}", column.ms_column(), subset.display());
        let mut main_table = open_table(subset, None, TableOpenMode::Read)?;
        read_complex_cube(&mut main_table, subset, column.ms_column())
    }

    fn write_columns(
        &self,
        subset: &Path,
        columns: &[(DataColumn, &Array3<c32>)],
    ) -> Result<(), StoreError> {
        let mut main_table = open_table(subset, None, TableOpenMode::ReadWrite)?;
        let num_rows = main_table.n_rows() as usize;
        for (column, cube) in columns {
            ensure_column(&mut main_table, subset, column.ms_column())?;
            if cube.len_of(Axis(0)) != num_rows {
                return Err(StoreError::RowCountMismatch {
                    path: subset.to_path_buf(),
                    column: column.ms_column(),
                    expected: num_rows,
                    got: cube.len_of(Axis(0)),
                });
            }
        }

        for (column, cube) in columns {
            debug!("Writing {} to {}", column.ms_column(), subset.display());
            for (i_row, cell) in cube.outer_iter().enumerate() {
                main_table.put_cell(column.ms_column(), i_row as u64, &cell.to_owned())?;
            }
        }
        // The table is flushed when it's closed.
        drop(main_table);
        Ok(())
    }
}

/// The solutions of a gain table, one per row.
#[derive(Debug, Clone)]
pub struct GainSolutions {
    pub path: PathBuf,
    /// [MJD seconds]
    pub times: Vec<f64>,
    pub antennas: Vec<i32>,
    /// Shaped (row, channel, polarisation).
    pub gains: Array3<c32>,
}

/// Read the TIME, ANTENNA1 and CPARAM columns of a gain table.
pub fn read_gain_table(table: &Path) -> Result<GainSolutions, StoreError> {
    let mut t = open_table(table, None, TableOpenMode::Read)?;
    let times: Vec<f64> = t.get_col_as_vec("TIME")?;
    let antennas: Vec<i32> = t.get_col_as_vec("ANTENNA1")?;
    let gains = read_complex_cube(&mut t, table, "CPARAM")?;
    Ok(GainSolutions {
        path: table.to_path_buf(),
        times,
        antennas,
        gains,
    })
}
