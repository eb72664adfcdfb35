// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all qsocal-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use super::{flux_model::FluxModelArgsError, plot_gains::GainPlotArgsError, run::RunArgsError};
use crate::{
    dataset::UnpackError,
    flux::{FitResultError, FluxModelError},
    glob::GlobError,
    pipeline::PipelineError,
    plot::PlotError,
    selfcal::{SelfCalError, StageError},
    spw::SpwRegistryError,
    store::StoreError,
    toolkit::ToolkitError,
};

/// The *only* publicly visible error from qsocal. Variants are the categories
/// a user acts on, not the modules errors come from.
#[derive(Error, Debug)]
pub enum QsocalError {
    /// The input data isn't where it was said to be.
    #[error("{0}\n\nCheck the archive path and the working directory; nothing has been modified.")]
    MissingInput(String),

    /// The spectral windows couldn't be discovered or recovered.
    #[error("{0}\n\nRe-running the import step regenerates the spectral window cache.")]
    Discovery(String),

    /// The UV fitter left an unusable fit result.
    #[error("{0}\n\nThe fitter's output can be inspected under specdata/.")]
    Fit(String),

    /// The external toolkit (or its bridge) failed.
    #[error("{0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv) to see the toolkit's output.")]
    Toolkit(String),

    /// Reading or writing visibilities failed.
    #[error("{0}")]
    Store(String),

    /// A diagnostic plot couldn't be drawn.
    #[error("{0}")]
    Plot(String),

    /// An error related to argument files.
    #[error("{0}\n\nArgument files are TOML or JSON with the same names as the long command-line options.")]
    ArgFile(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

// Binary sub-command errors.

impl From<RunArgsError> for QsocalError {
    fn from(e: RunArgsError) -> Self {
        let s = e.to_string();
        match e {
            RunArgsError::NoArchive => Self::MissingInput(s),
            RunArgsError::EmptyCommand(_)
            | RunArgsError::ZeroFitWorkers
            | RunArgsError::BadMinSnr(_)
            | RunArgsError::EmptySolint(_)
            | RunArgsError::BadStep(_) => Self::Generic(s),
        }
    }
}

impl From<FluxModelArgsError> for QsocalError {
    fn from(e: FluxModelArgsError) -> Self {
        let s = e.to_string();
        match e {
            FluxModelArgsError::NoSubset | FluxModelArgsError::NoFitResult => {
                Self::MissingInput(s)
            }
            FluxModelArgsError::BadColumn(_) | FluxModelArgsError::NothingToWrite => {
                Self::Generic(s)
            }
        }
    }
}

impl From<GainPlotArgsError> for QsocalError {
    fn from(e: GainPlotArgsError) -> Self {
        let s = e.to_string();
        match e {
            GainPlotArgsError::NoTables => Self::MissingInput(s),
            GainPlotArgsError::BadMode(_) | GainPlotArgsError::UnknownExtension(_) => {
                Self::Plot(s)
            }
        }
    }
}

// Library errors.

impl From<UnpackError> for QsocalError {
    fn from(e: UnpackError) -> Self {
        let s = e.to_string();
        match e {
            UnpackError::MissingInput { .. } | UnpackError::BadArchiveName(_) => {
                Self::MissingInput(s)
            }
            UnpackError::Extract { .. } | UnpackError::IO(_) => Self::Generic(s),
        }
    }
}

impl From<SpwRegistryError> for QsocalError {
    fn from(e: SpwRegistryError) -> Self {
        let s = e.to_string();
        match e {
            SpwRegistryError::NoCache { .. }
            | SpwRegistryError::ForeignCache { .. }
            | SpwRegistryError::BadCache { .. }
            | SpwRegistryError::NoSpws(_) => Self::Discovery(s),
            SpwRegistryError::IO(e) => Self::from(e),
        }
    }
}

impl From<ToolkitError> for QsocalError {
    fn from(e: ToolkitError) -> Self {
        Self::Toolkit(e.to_string())
    }
}

impl From<StoreError> for QsocalError {
    fn from(e: StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<FitResultError> for QsocalError {
    fn from(e: FitResultError) -> Self {
        Self::Fit(e.to_string())
    }
}

impl From<FluxModelError> for QsocalError {
    fn from(e: FluxModelError) -> Self {
        let s = e.to_string();
        match e {
            FluxModelError::Fit(e) => Self::from(e),
            FluxModelError::Store(e) => Self::from(e),
            FluxModelError::LengthMismatch { .. }
            | FluxModelError::NotMonotonic(_)
            | FluxModelError::ChannelMismatch { .. } => Self::Fit(s),
            FluxModelError::ResidualColumn(_) => Self::Generic(s),
        }
    }
}

impl From<SelfCalError> for QsocalError {
    fn from(e: SelfCalError) -> Self {
        // Keep the field and stage in the message.
        let s = e.to_string();
        match e.err {
            StageError::Toolkit(_) => Self::Toolkit(s),
            StageError::Fit(_) => Self::Fit(s),
            StageError::FluxModel(FluxModelError::Store(_)) => Self::Store(s),
            StageError::FluxModel(_) => Self::Fit(s),
            StageError::IO(_) => Self::Generic(s),
        }
    }
}

impl From<PlotError> for QsocalError {
    fn from(e: PlotError) -> Self {
        let s = e.to_string();
        match e {
            PlotError::FitResult(e) => Self::from(e),
            PlotError::Store(e) => Self::from(e),
            PlotError::IO(e) => Self::from(e),
            _ => Self::Plot(s),
        }
    }
}

impl From<PipelineError> for QsocalError {
    fn from(e: PipelineError) -> Self {
        let s = e.to_string();
        match e {
            PipelineError::NoAsdm(_) => Self::MissingInput(s),
            PipelineError::NoAntennas(_)
            | PipelineError::NoCalibratorIntents(_)
            | PipelineError::BadScript { .. }
            | PipelineError::BadBeam { .. } => Self::Toolkit(s),
            PipelineError::Unpack(e) => Self::from(e),
            PipelineError::Spw(e) => Self::from(e),
            PipelineError::Toolkit(e) => Self::from(e),
            PipelineError::Glob(e) => Self::from(e),
            PipelineError::IO(e) => Self::from(e),
        }
    }
}

impl From<GlobError> for QsocalError {
    fn from(e: GlobError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<std::io::Error> for QsocalError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
