// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The vendor calibration script: generating it, and running its "apply"
//! steps.

use std::path::Path;

use itertools::Itertools;
use log::{debug, info, warn};

use super::{Pipeline, PipelineError};
use crate::{
    constants::{SCRIPT_APPLY_STEP_TITLE, SCRIPT_STEP_LINE},
    toolkit::{execute, Task},
};

/// The script steps to run in apply-only mode. The script's header lists its
/// steps one per line as `<n>: '<title>',`; when the line at
/// [`SCRIPT_STEP_LINE`] names the application of the calibration tables, the
/// final step is left out.
pub fn apply_steps(script: &str, path: &Path) -> Result<Vec<u8>, PipelineError> {
    let bad_script = || PipelineError::BadScript {
        path: path.to_path_buf(),
        line: SCRIPT_STEP_LINE + 1,
    };
    let line = script.lines().nth(SCRIPT_STEP_LINE).ok_or_else(bad_script)?;
    let title = line
        .split(':')
        .nth(1)
        .and_then(|s| s.split('\'').nth(1))
        .ok_or_else(bad_script)?;
    debug!("Script step on line {}: '{title}'", SCRIPT_STEP_LINE + 1);

    let last = if title == SCRIPT_APPLY_STEP_TITLE { 16 } else { 17 };
    Ok((0..=last).collect())
}

impl Pipeline<'_> {
    /// Step 2: pick the reference antenna and write the calibration script.
    /// Returns the reference antenna and its dish diameter.
    pub(super) fn reduction_script(&self, plan_only: bool) -> Result<(String, f64), PipelineError> {
        let paths = &self.dataset.paths;
        let vis = paths.vis();
        let refant = self
            .toolkit
            .common_antennas(&vis)?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::NoAntennas(vis.clone()))?;

        execute(
            self.toolkit,
            &Task::GenerateReductionScript {
                vis,
                script: paths.calibration_script(),
                refant: refant.clone(),
                corr_ant_pos: false,
            },
            plan_only,
        )?;

        let dish_diameter = self.toolkit.antenna_diameter(&refant)?;
        info!("Reference antenna {refant} ({dish_diameter} m)");
        Ok((refant, dish_diameter))
    }

    /// Step 4: run the calibration script in apply-only mode.
    pub(super) fn calibrate(&self, plan_only: bool) -> Result<(), PipelineError> {
        let script = self.dataset.paths.calibration_script();
        let steps = if plan_only && !script.exists() {
            warn!(
                "{} doesn't exist yet; planning every script step",
                script.display()
            );
            (0..=17).collect()
        } else {
            apply_steps(&std::fs::read_to_string(&script)?, &script)?
        };
        debug!("Script steps: {}", steps.iter().join(","));

        execute(
            self.toolkit,
            &Task::RunCalibrationScript {
                script,
                steps,
                apply_only: true,
            },
            plan_only,
        )?;
        Ok(())
    }

    /// The calibrator fields of the calibrated visibilities, sorted and
    /// without duplicates.
    pub(super) fn calibrator_fields(&self) -> Result<Vec<String>, PipelineError> {
        let fields = self
            .toolkit
            .calibrators(&self.dataset.paths.split_vis())?
            .into_iter()
            .sorted()
            .dedup()
            .collect::<Vec<_>>();
        if fields.is_empty() {
            warn!("No calibrator fields in {}", self.dataset.paths.split_vis().display());
        }
        Ok(fields)
    }
}
