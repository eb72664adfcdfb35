// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dropping the science-target scans so that only calibrators remain.

use std::{collections::BTreeSet, fs};

use itertools::Itertools;
use log::{debug, info};

use super::{Observation, Pipeline, PipelineError};
use crate::{
    constants::TARGET_INTENT,
    toolkit::{execute, remove_path, MstransformParams, Task, TaskColumn},
};

/// Every distinct intent other than the science-target one, sorted.
pub fn calibrator_intents(intents: &[String]) -> Vec<String> {
    intents
        .iter()
        .filter(|i| i.as_str() != TARGET_INTENT)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// An intent selection matching any of `intents` (and their sub-intents).
pub fn intent_selection(intents: &[String]) -> String {
    format!("{}*", intents.iter().join("*,"))
}

impl Pipeline<'_> {
    /// Step 3: the original visibilities are kept as `<ms>.org` and `<ms>` is
    /// replaced by its calibrator scans, flags included.
    pub(super) fn remove_targets(
        &self,
        obs: &Observation,
        plan_only: bool,
    ) -> Result<(), PipelineError> {
        let paths = &self.dataset.paths;
        let intents = calibrator_intents(&self.toolkit.intents_from_asdm(&obs.asdm)?);
        if intents.is_empty() {
            return Err(PipelineError::NoCalibratorIntents(obs.asdm.clone()));
        }
        let selection = intent_selection(&intents);
        info!("Keeping intents {selection}");

        let (vis, vis_org) = (paths.vis(), paths.vis_org());
        if plan_only {
            info!("[plan] move {} to {}", vis.display(), vis_org.display());
        } else {
            remove_path(&vis_org)?;
            debug!("Moving {} to {}", vis.display(), vis_org.display());
            fs::rename(&vis, &vis_org)?;
        }

        execute(
            self.toolkit,
            &Task::Mstransform(MstransformParams {
                vis: vis_org,
                outputvis: vis,
                datacolumn: TaskColumn::All,
                spw: None,
                field: None,
                intent: Some(selection),
                keepflags: true,
                reindex: true,
                combinespws: false,
            }),
            plan_only,
        )?;
        Ok(())
    }
}
