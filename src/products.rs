// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Names of every artifact the pipeline reads or writes.
//!
//! Producers and consumers of a product both ask [`ProductPaths`] for its
//! location; no other code assembles artifact names.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{dataset::ArchiveName, selfcal::CalMode};

/// A spectral-window identifier, as reported by the toolkit.
pub type SpwId = u32;

/// Selects either one spectral window or all of them combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpwSel {
    All,
    Id(SpwId),
}

impl fmt::Display for SpwSel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpwSel::All => write!(f, "all"),
            SpwSel::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Which self-calibration round a fit belongs to. This also tags fit-result
/// filenames.
#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitIntent {
    /// The fit against data that has not been self-calibrated.
    #[strum(serialize = "noselfcal")]
    NoSelfCal,

    /// The fit against self-calibrated (corrected) data.
    #[strum(serialize = "selfcal")]
    SelfCal,
}

/// Suffix of a temporary subset made while combining spectral windows.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum TmpStage {
    #[strum(serialize = "tmp")]
    Averaged,
    #[strum(serialize = "tmp2")]
    Combined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPaths {
    root: PathBuf,
    project_id: String,
    session: String,
}

impl ProductPaths {
    /// All products of a dataset live in a directory named after its session,
    /// inside `working_dir`.
    pub fn new(working_dir: &Path, archive: &ArchiveName) -> ProductPaths {
        ProductPaths {
            root: working_dir.join(&archive.session),
            project_id: archive.project_id.clone(),
            session: archive.session.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// The directory the archive extracts its project tree into.
    pub fn project_dir(&self) -> PathBuf {
        self.root.join(&self.project_id)
    }

    /// The plain archive, once moved into the session directory.
    pub fn archive(&self) -> PathBuf {
        self.root.join(self.archive_file_name())
    }

    pub fn archive_file_name(&self) -> String {
        format!("{}_{}.asdm.sdm.tar", self.project_id, self.session)
    }

    /// Where the raw ASDM is linked into the working directory.
    pub fn asdm_link(&self) -> PathBuf {
        self.root.join(format!("{}.asdm.sdm", self.session))
    }

    pub fn vis(&self) -> PathBuf {
        self.root.join(self.vis_name())
    }

    fn vis_name(&self) -> String {
        format!("{}.ms", self.session)
    }

    /// The imported visibilities before target removal.
    pub fn vis_org(&self) -> PathBuf {
        self.root.join(format!("{}.org", self.vis_name()))
    }

    pub fn flag_versions(&self, vis: &Path) -> PathBuf {
        suffixed(vis, ".flagversions")
    }

    /// The calibrated calibrator visibilities written by the vendor script.
    pub fn split_vis(&self) -> PathBuf {
        self.root.join(self.split_name())
    }

    fn split_name(&self) -> String {
        format!("{}.split", self.vis_name())
    }

    /// The vendor calibration script for this dataset.
    pub fn calibration_script(&self) -> PathBuf {
        self.root
            .join(format!("{}.scriptForCalibration.py", self.vis_name()))
    }

    pub fn calibrated_dir(&self) -> PathBuf {
        self.root.join("calibrated")
    }

    /// A (field, spw) visibility subset.
    pub fn subset(&self, field: &str, spw: SpwSel) -> PathBuf {
        self.calibrated_dir().join(self.subset_name(field, spw))
    }

    fn subset_name(&self, field: &str, spw: SpwSel) -> String {
        format!("{}.{field}.spw_{spw}", self.split_name())
    }

    /// A temporary subset made while combining spectral windows.
    pub fn tmp_subset(&self, field: &str, stage: TmpStage) -> PathBuf {
        suffixed(&self.subset(field, SpwSel::All), &format!(".{stage}"))
    }

    /// The space-saved, self-calibrated combined subset.
    pub fn residual_subset(&self, field: &str) -> PathBuf {
        suffixed(&self.subset(field, SpwSel::All), ".selfcal.residual")
    }

    /// The text summary written next to a visibility set.
    pub fn listobs(&self, vis: &Path) -> PathBuf {
        suffixed(vis, ".listobs")
    }

    pub fn specdata_dir(&self) -> PathBuf {
        self.root.join("specdata")
    }

    pub fn fit_result(&self, field: &str, spw: SpwSel, intent: Option<FitIntent>) -> PathBuf {
        let mut name = self.subset_name(field, spw);
        if let Some(intent) = intent {
            name.push('.');
            name.push_str(&intent.to_string());
        }
        name.push_str(".dat");
        self.specdata_dir().join(name)
    }

    pub fn caltables_dir(&self) -> PathBuf {
        self.root.join("caltables")
    }

    pub fn gain_table(&self, field: &str, spw: SpwSel, mode: CalMode, round: u8) -> PathBuf {
        self.caltables_dir().join(format!(
            "{}.{mode}_{round}",
            self.subset_name(field, spw)
        ))
    }

    /// The gain plot for one calibration mode; `ext` is the image format.
    pub fn gain_plot(&self, field: &str, spw: SpwSel, mode: CalMode, ext: &str) -> PathBuf {
        self.caltables_dir().join(format!(
            "{}.gainplot.{mode}.{ext}",
            self.subset_name(field, spw)
        ))
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("imsg")
    }

    /// The base name of the continuum image products for a field.
    pub fn image_base(&self, field: &str) -> PathBuf {
        self.images_dir().join(format!(
            "{}.{field}.residual.allspw.selfcal.mfs.briggs.robust_0.5.dirty",
            self.session
        ))
    }

    pub fn specplot_dir(&self) -> PathBuf {
        self.root.join("specplot")
    }

    pub fn spec_plot(&self, field: &str, spw: SpwId, ext: &str) -> PathBuf {
        self.specplot_dir()
            .join(format!("{}.{field}.spw{spw}.{ext}", self.session))
    }

    pub fn tempfiles_dir(&self) -> PathBuf {
        self.root.join("tempfiles")
    }

    /// The on-disk cache of the science spectral windows.
    pub fn spw_cache(&self) -> PathBuf {
        self.tempfiles_dir().join("spws.json")
    }

    /// Request/response exchange directory of the toolkit bridge.
    pub fn requests_dir(&self) -> PathBuf {
        self.tempfiles_dir().join("requests")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn step_log(&self) -> PathBuf {
        self.log_dir()
            .join(format!("{}.analysis.log", self.session))
    }

    /// The packed calibrated directory written by the final space saving.
    pub fn calibrated_archive(&self) -> PathBuf {
        self.root.join("calibrated.tar.gz")
    }
}

/// Append `suffix` to the final component of `path`.
pub(crate) fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}
