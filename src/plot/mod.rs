// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Diagnostic plots of gain solutions and flux spectra.
//!
//! The numbers behind every plot are always available; drawing them needs the
//! "plotting" feature. Each plot is written as PNG and SVG.

#[cfg(feature = "plotting")]
mod draw;
mod error;
pub mod gains;
pub mod spectrum;

pub use error::PlotError;

/// Image formats every plot is written in.
pub const PLOT_EXTENSIONS: [&str; 2] = ["png", "svg"];
