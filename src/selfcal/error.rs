// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with self-calibrating a field.

use thiserror::Error;

use super::Stage;
use crate::{
    flux::{FitResultError, FluxModelError},
    toolkit::ToolkitError,
};

/// Self-calibration of one field stopped. Other fields are unaffected.
#[derive(Error, Debug)]
#[error("Self-calibration of {field} stopped at {stage}: {err}")]
pub struct SelfCalError {
    pub field: String,
    pub stage: Stage,
    #[source]
    pub err: StageError,
}

impl SelfCalError {
    /// Did the UV fitter leave an unusable result?
    pub fn is_fit_failure(&self) -> bool {
        matches!(
            self.err,
            StageError::Fit(_) | StageError::FluxModel(FluxModelError::Fit(_))
        )
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),

    #[error(transparent)]
    Fit(#[from] FitResultError),

    #[error(transparent)]
    FluxModel(#[from] FluxModelError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
