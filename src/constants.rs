// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

Defaults for the external solvers live here so that the CLI help texts and the
parameter structs agree.
 */

/// The intent that marks science-target scans. Everything else is kept by the
/// target-removal filter.
pub(crate) const TARGET_INTENT: &str = "OBSERVE_TARGET";

/// The default number of workers handed to the UV fitter.
pub(crate) const DEFAULT_FIT_WORKERS: usize = 8;

/// Gain solutions below this signal-to-noise ratio are flagged.
pub(crate) const DEFAULT_MIN_SNR: f64 = 2.0;

/// The default solution interval of the phase-only solves (per integration).
pub(crate) const DEFAULT_PHASE_SOLINT: &str = "int";

/// The default solution interval of the amplitude+phase solves (per scan).
pub(crate) const DEFAULT_AMP_PHASE_SOLINT: &str = "inf";

/// Channel width used to collapse every channel of a window into one.
pub(crate) const AVERAGE_ALL_CHANNELS: u32 = 10000;

/// Fit results with at most this many rows are treated as a single flux
/// value.
pub(crate) const DEGENERATE_FIT_ROWS: usize = 4;

/// Dishes larger than this [metres] get the narrower imaging field.
pub(crate) const LARGE_DISH_DIAMETER_M: f64 = 10.0;

/// Imaging half-field factor [arcsec] for large dishes.
pub(crate) const LARGE_DISH_FIELD_ARCSEC: f64 = 120.0;

/// Imaging half-field factor [arcsec] for small dishes.
pub(crate) const SMALL_DISH_FIELD_ARCSEC: f64 = 180.0;

/// Pixels per synthesized beam.
pub(crate) const PIXELS_PER_BEAM: f64 = 5.0;

/// The calibration-script line that names the "apply" step (0-indexed).
pub(crate) const SCRIPT_STEP_LINE: usize = 21;

/// If the script's step line names this title, the apply-only run stops one
/// step earlier.
pub(crate) const SCRIPT_APPLY_STEP_TITLE: &str = "Application of the bandpass and gain cal tables";

/// Sigma-clipping threshold used by the spectrum plots.
pub(crate) const SPECTRUM_CLIP_SIGMA: f64 = 3.0;

/// Detection markers are drawn this many RMS above the spectrum maximum.
pub(crate) const SPECTRUM_MARKER_RMS: f64 = 2.5;

/// The spectrum plot's y-range padding in RMS.
pub(crate) const SPECTRUM_YRANGE_RMS: f64 = 5.0;
