// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reduction pipeline for calibrator-quasar observations.
//!
//! Raw observatory archives are unpacked, imported and calibrated with an
//! external toolkit, after which every calibrator field is self-calibrated
//! against a point-source model fitted in the UV plane. The per-channel flux
//! of each spectral window is the main product.

pub mod cli;
pub(crate) mod constants;
pub mod dataset;
pub mod flux;
pub(crate) mod glob;
mod params;
pub mod pipeline;
pub mod plot;
pub mod products;
pub mod selfcal;
pub mod spw;
pub mod steplog;
pub mod store;
pub mod toolkit;

#[cfg(test)]
mod tests;

use crossbeam_utils::atomic::AtomicCell;

/// Are progress bars being drawn? This should only ever be enabled by CLI
/// code.
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);

// Re-exports.
pub use cli::{Qsocal, QsocalError};
pub use dataset::{ArchiveName, Dataset};
pub use flux::{FitResult, FluxModelOptions};
pub use products::ProductPaths;
pub use selfcal::{CalMode, GainTable, SelfCalEngine};
pub use store::DataColumn;
