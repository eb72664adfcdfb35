// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::{flux::FitResultError, store::StoreError};

#[derive(Error, Debug)]
pub enum PlotError {
    #[cfg(not(feature = "plotting"))]
    #[error("qsocal was not compiled with the \"plotting\" feature.\nYou need to compile qsocal from source with this feature to draw plots.")]
    NoPlottingFeature,

    #[error("{0} has too few unclipped channels to fit a continuum")]
    TooFewChannels(String),

    #[error("The continuum of {0} crosses zero; can't normalise the spectrum")]
    ZeroContinuum(String),

    #[error("{0} contains no gain solutions")]
    NoSolutions(String),

    #[cfg(feature = "plotting")]
    #[error("Error from the plotters library: {0}")]
    Draw(#[from] super::draw::DrawError),

    #[error(transparent)]
    FitResult(#[from] FitResultError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
