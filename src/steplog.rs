// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The per-dataset analysis log. Each finished step appends one line.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::Path,
};

use log::debug;
use strum_macros::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    #[strum(serialize = "OK")]
    Ok,
    #[strum(serialize = "Partially failed")]
    PartiallyFailed,
    /// Only logged what it would do.
    #[strum(serialize = "Planned")]
    Planned,
}

impl StepStatus {
    pub fn from_failures(any_failed: bool) -> StepStatus {
        if any_failed {
            StepStatus::PartiallyFailed
        } else {
            StepStatus::Ok
        }
    }

    pub fn is_failure(self) -> bool {
        self == StepStatus::PartiallyFailed
    }
}

/// Append `step<N>:<status>` to the log at `log`, creating it if necessary.
pub(crate) fn append(log: &Path, step: u8, status: StepStatus) -> Result<(), std::io::Error> {
    if let Some(dir) = log.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(log)?;
    writeln!(f, "step{step}:{status}")?;
    debug!("{}: step{step}:{status}", log.display());
    Ok(())
}
