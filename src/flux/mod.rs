// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turning fitted fluxes into model and residual visibilities.
//!
//! The UV fitter leaves a table of (frequency, flux[, error]) rows. Here that
//! spectrum is matched to the channels of a visibility subset and written
//! back as the subset's model column, and optionally as residuals (observed
//! minus model) in its corrected column.

mod error;

pub use error::{FitResultError, FluxModelError};

use std::path::{Path, PathBuf};

use log::{debug, trace};
use marlu::c32;
use ndarray::prelude::*;
use vec1::Vec1;

use crate::{
    constants::DEGENERATE_FIT_ROWS,
    store::{DataColumn, VisStore},
};

/// One row of a fit result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRow {
    /// [Hz]
    pub freq: f64,
    /// [Jy]
    pub flux: f64,
    pub error: Option<f64>,
}

/// The fluxes fitted to one (field, spw) subset.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub rows: Vec1<FitRow>,
}

impl FitResult {
    /// Parse a whitespace-separated table. Blank lines and `#` comments are
    /// ignored. `source` is only used in error messages.
    pub fn parse(contents: &str, source: &Path) -> Result<FitResult, FitResultError> {
        let mut rows = vec![];
        for (i_line, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = || FitResultError::Malformed {
                path: source.to_path_buf(),
                line: i_line + 1,
                content: line.to_string(),
            };
            let values = line
                .split_whitespace()
                .map(|v| v.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| malformed())?;
            match values.as_slice() {
                [freq, flux] => rows.push(FitRow {
                    freq: *freq,
                    flux: *flux,
                    error: None,
                }),
                [freq, flux, error, ..] => rows.push(FitRow {
                    freq: *freq,
                    flux: *flux,
                    error: Some(*error),
                }),
                _ => return Err(malformed()),
            }
        }

        let rows =
            Vec1::try_from_vec(rows).map_err(|_| FitResultError::Empty(source.to_path_buf()))?;
        Ok(FitResult { rows })
    }

    pub fn read(path: &Path) -> Result<FitResult, FitResultError> {
        let contents = std::fs::read_to_string(path).map_err(|err| FitResultError::IO {
            path: path.to_path_buf(),
            err,
        })?;
        FitResult::parse(&contents, path)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn freqs(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.freq).collect()
    }

    pub fn fluxes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.flux).collect()
    }

    pub fn mean_flux(&self) -> f64 {
        self.rows.iter().map(|r| r.flux).sum::<f64>() / self.len() as f64
    }

    /// Tiny results (e.g. a band-averaged fit) carry one flux for the whole
    /// band.
    pub fn is_degenerate(&self) -> bool {
        self.len() <= DEGENERATE_FIT_ROWS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Ascending,
    Descending,
}

fn direction(freqs: &[f64], what: &'static str) -> Result<Direction, FluxModelError> {
    if freqs.windows(2).all(|w| w[0] < w[1]) {
        Ok(Direction::Ascending)
    } else if freqs.windows(2).all(|w| w[0] > w[1]) {
        Ok(Direction::Descending)
    } else {
        Err(FluxModelError::NotMonotonic(what))
    }
}

/// Map a fit result onto the channels of a subset, in the subset's channel
/// order. Degenerate results are broadcast to every channel. The result and
/// the subset may list frequencies in opposite orders; any other disagreement
/// is an error.
pub fn align_spectrum(fit: &FitResult, chan_freqs: &[f64]) -> Result<Array1<f64>, FluxModelError> {
    let num_chans = chan_freqs.len();
    if fit.is_degenerate() {
        trace!("Degenerate fit result ({} rows); using its mean flux", fit.len());
        return Ok(Array1::from_elem(num_chans, fit.mean_flux()));
    }
    if fit.len() != num_chans {
        return Err(FluxModelError::LengthMismatch {
            fit: fit.len(),
            channels: num_chans,
        });
    }

    let mut fluxes = fit.fluxes();
    let fit_dir = direction(&fit.freqs(), "fit result")?;
    let chan_dir = direction(chan_freqs, "subset")?;
    if fit_dir != chan_dir {
        trace!("Fit result and subset frequencies run in opposite directions");
        fluxes.reverse();
    }
    Ok(Array1::from(fluxes))
}

/// Polarisation indices that receive the Stokes I model.
fn parallel_hands(num_pols: usize) -> Vec<usize> {
    match num_pols {
        0 => vec![],
        1 => vec![0],
        4 => vec![0, 3],
        _ => vec![0, 1],
    }
}

/// A (row, channel, polarisation) cube with `spectrum` in the parallel hands
/// of every row and zero elsewhere.
pub fn model_cube(shape: (usize, usize, usize), spectrum: ArrayView1<f64>) -> Array3<c32> {
    let (_, num_chans, num_pols) = shape;
    debug_assert_eq!(num_chans, spectrum.len());
    let mut cube = Array3::zeros(shape);
    for i_pol in parallel_hands(num_pols) {
        for (i_chan, &flux) in spectrum.iter().enumerate() {
            cube.slice_mut(s![.., i_chan, i_pol])
                .fill(c32::new(flux as f32, 0.0));
        }
    }
    cube
}

/// What [`extract`] should do with a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluxModelOptions {
    /// The column residuals are made from.
    pub data_column: DataColumn,
    pub write_residuals: bool,
    pub save_model: bool,
    /// Use the mean flux in every channel rather than the spectrum.
    pub meansub: bool,
}

/// What [`extract`] wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxModelSummary {
    pub subset: PathBuf,
    pub spectrum: Array1<f64>,
    pub wrote_model: bool,
    pub wrote_residuals: bool,
}

/// Build the model of a subset from its fit result, then write the model
/// and/or residuals. Everything is computed before the subset is opened for
/// writing, so a bad fit result leaves the subset untouched.
pub fn extract(
    store: &dyn VisStore,
    subset: &Path,
    fit_result: &Path,
    opts: FluxModelOptions,
) -> Result<FluxModelSummary, FluxModelError> {
    if opts.write_residuals && opts.data_column == DataColumn::Model {
        return Err(FluxModelError::ResidualColumn(opts.data_column));
    }

    let fit = FitResult::read(fit_result)?;
    let chan_freqs = store.chan_freqs(subset)?;
    let mut spectrum = align_spectrum(&fit, &chan_freqs)?;
    if opts.meansub {
        let mean = spectrum.mean().unwrap_or(0.0);
        spectrum.fill(mean);
    }
    debug!(
        "{}: model from {} ({} channels)",
        subset.display(),
        fit_result.display(),
        spectrum.len()
    );

    let base_column = if opts.write_residuals {
        opts.data_column
    } else {
        DataColumn::Data
    };
    let base = store.read_column(subset, base_column)?;
    if base.len_of(Axis(1)) != chan_freqs.len() {
        return Err(FluxModelError::ChannelMismatch {
            column: base_column,
            expected: chan_freqs.len(),
            got: base.len_of(Axis(1)),
        });
    }
    let model = model_cube(base.dim(), spectrum.view());
    let residuals = if opts.write_residuals {
        Some(&base - &model)
    } else {
        None
    };

    let mut writes: Vec<(DataColumn, &Array3<c32>)> = vec![];
    if opts.save_model {
        writes.push((DataColumn::Model, &model));
    }
    if let Some(r) = residuals.as_ref() {
        writes.push((DataColumn::Corrected, r));
    }
    if !writes.is_empty() {
        store.write_columns(subset, &writes)?;
    }

    Ok(FluxModelSummary {
        subset: subset.to_path_buf(),
        spectrum,
        wrote_model: opts.save_model,
        wrote_residuals: opts.write_residuals,
    })
}
