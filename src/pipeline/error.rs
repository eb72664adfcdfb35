// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors that stop the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    dataset::UnpackError, glob::GlobError, spw::SpwRegistryError, toolkit::ToolkitError,
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Couldn't find the raw ASDM of the dataset: {0}")]
    NoAsdm(GlobError),

    #[error("The toolkit reported no antennas common to every scan of {0}")]
    NoAntennas(PathBuf),

    #[error("{0} has no calibrator intents; refusing to keep every scan")]
    NoCalibratorIntents(PathBuf),

    #[error("Line {line} of the calibration script {path} doesn't name a step (expected <n>: '<title>')")]
    BadScript { path: PathBuf, line: usize },

    #[error("The synthesized beam of {path} is {beam} arcsec; can't size the images")]
    BadBeam { path: PathBuf, beam: f64 },

    #[error(transparent)]
    Unpack(#[from] UnpackError),

    #[error(transparent)]
    Spw(#[from] SpwRegistryError),

    #[error(transparent)]
    Toolkit(#[from] ToolkitError),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
