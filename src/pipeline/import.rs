// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Unpacking and importing the raw data.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use super::{Pipeline, PipelineError};
use crate::{
    glob::single_match_in,
    products::SpwId,
    spw,
    toolkit::{execute, remove_path, ImportAsdmParams, Task},
};

/// ASDM tables imported verbatim alongside the visibilities.
const ASIS_TABLES: &str = "Antenna Station Receiver Source CalAtmosphere CalWVR CorrelatorMode SBSummary";

/// Where the raw ASDM sits inside an unpacked project tree.
const RAW_ASDM_PATTERN: &str = "*/*/*/raw/*";

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> Result<(), std::io::Error> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> Result<(), std::io::Error> {
    std::os::windows::fs::symlink_dir(original, link)
}

impl Pipeline<'_> {
    /// Step 0.
    pub(super) fn unpack(&self, plan_only: bool) -> Result<(), PipelineError> {
        if plan_only {
            info!("[plan] unpack into {}", self.dataset.paths.root().display());
            return Ok(());
        }
        self.dataset.unpack()?;
        Ok(())
    }

    /// Step 1: import the raw ASDM and discover its science windows.
    pub(super) fn import(&self, plan_only: bool) -> Result<(PathBuf, Vec<SpwId>), PipelineError> {
        let paths = &self.dataset.paths;
        let asdm = match single_match_in(&paths.project_dir(), RAW_ASDM_PATTERN) {
            Ok(asdm) => asdm,
            Err(e) if plan_only => {
                warn!("{e}; planning with {}", paths.asdm_link().display());
                paths.asdm_link()
            }
            Err(e) => return Err(PipelineError::NoAsdm(e)),
        };
        debug!("Raw ASDM: {}", asdm.display());

        let link = paths.asdm_link();
        let task = Task::ImportAsdm(ImportAsdmParams {
            asdm: link.clone(),
            vis: paths.vis(),
            asis: ASIS_TABLES.to_string(),
            bdfflags: true,
            lazy: true,
            flagbackup: false,
        });
        if !plan_only {
            remove_path(&link)?;
            symlink(&asdm, &link)?;
            fs::create_dir_all(paths.tempfiles_dir())?;
        }
        execute(self.toolkit, &task, plan_only)?;

        let spws = if plan_only {
            self.planned_spws()?
        } else {
            let (spws, source) = spw::discover(self.toolkit, paths, &paths.vis())?;
            debug!("Spectral windows from {source:?}");
            spws
        };
        Ok((asdm, spws))
    }

    /// The science windows, without writing the cache.
    fn planned_spws(&self) -> Result<Vec<SpwId>, PipelineError> {
        let paths = &self.dataset.paths;
        let cache = paths.spw_cache();
        if cache.exists() {
            return Ok(spw::read_cache(&cache, paths.session())?);
        }
        let spws = self.toolkit.science_spws(&paths.vis())?;
        info!("[plan] science spectral windows: {spws:?}");
        Ok(spws)
    }
}
