// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The boundary to the external scientific toolkit.
//!
//! Everything that touches the physics (importing raw data, splitting,
//! solving and applying gains, imaging, UV fitting) is done by an external
//! toolkit. Callers describe what they want with validated parameter structs
//! ([`Task`], [`Query`], [`UvFitParams`]); implementations of [`Toolkit`] and
//! [`UvFitter`] carry them across the process boundary.

mod casa;
mod error;

pub use casa::{CasaRunner, CasaToolkit, UvMultiFit, BRIDGE_PROTOCOL_VERSION};
pub use error::ToolkitError;

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, trace};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

use crate::{products::SpwId, store::DataColumn};

/// The data column a toolkit task reads.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskColumn {
    #[strum(serialize = "all")]
    All,
    #[strum(serialize = "data")]
    Data,
    #[strum(serialize = "corrected")]
    Corrected,
}

/// Gain solution type: `G` solves each polarisation independently, `T`
/// solves one solution for both.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GainType {
    G,
    T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportAsdmParams {
    pub asdm: PathBuf,
    pub vis: PathBuf,
    /// Extra ASDM tables to import verbatim.
    pub asis: String,
    pub bdfflags: bool,
    pub lazy: bool,
    pub flagbackup: bool,
}

/// Parameters shared by the splitting tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MstransformParams {
    pub vis: PathBuf,
    pub outputvis: PathBuf,
    pub datacolumn: TaskColumn,
    pub spw: Option<String>,
    pub field: Option<String>,
    pub intent: Option<String>,
    pub keepflags: bool,
    pub reindex: bool,
    pub combinespws: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitParams {
    pub vis: PathBuf,
    pub outputvis: PathBuf,
    pub datacolumn: TaskColumn,
    pub spw: Option<String>,
    pub field: Option<String>,
    pub intent: Option<String>,
    /// Number of channels to average together.
    pub width: Option<u32>,
    pub keepflags: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaincalParams {
    pub vis: PathBuf,
    pub caltable: PathBuf,
    pub field: String,
    pub solint: String,
    pub refant: String,
    pub gaintype: GainType,
    /// `p` or `ap`.
    pub calmode: String,
    pub minsnr: f64,
    /// Tables applied on the fly before solving.
    pub gaintable: Vec<PathBuf>,
    pub solnorm: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplycalParams {
    pub vis: PathBuf,
    pub gaintable: Vec<PathBuf>,
    pub interp: String,
    pub flagbackup: bool,
    pub applymode: String,
    pub calwt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcleanParams {
    pub vis: PathBuf,
    pub imagename: PathBuf,
    pub datacolumn: TaskColumn,
    pub imsize: u32,
    pub cell: String,
    pub weighting: String,
    pub robust: f64,
    pub deconvolver: String,
    pub gridder: String,
    pub specmode: String,
    pub threshold: String,
    pub niter: u32,
    pub nterms: u32,
    pub pbcor: bool,
    pub restoringbeam: String,
}

impl TcleanParams {
    /// Extensions of the image products written by `tclean`.
    pub const PRODUCT_EXTENSIONS: [&'static str; 8] = [
        ".image",
        ".mask",
        ".model",
        ".image.pbcor",
        ".psf",
        ".residual",
        ".pb",
        ".sumwt",
    ];
}

/// A store-mutating operation of the toolkit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "task", content = "params", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Task {
    ImportAsdm(ImportAsdmParams),
    Mstransform(MstransformParams),
    Split(SplitParams),
    Listobs {
        vis: PathBuf,
        listfile: PathBuf,
    },
    /// Reset the corrected column, optionally adding a model column.
    Clearcal {
        vis: PathBuf,
        addmodel: bool,
    },
    Gaincal(GaincalParams),
    Applycal(ApplycalParams),
    /// Recompute visibility weights from the scatter of a column, in place.
    Statwt {
        vis: PathBuf,
        datacolumn: TaskColumn,
    },
    Tclean(TcleanParams),
    Exportfits {
        imagename: PathBuf,
        fitsimage: PathBuf,
    },
    /// Write the vendor calibration script for `vis` to `script`.
    GenerateReductionScript {
        vis: PathBuf,
        script: PathBuf,
        refant: String,
        corr_ant_pos: bool,
    },
    /// Run `steps` of a vendor calibration script.
    RunCalibrationScript {
        script: PathBuf,
        steps: Vec<u8>,
        apply_only: bool,
    },
}

impl Task {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Everything this task creates. Existing artifacts at these paths are
    /// removed before the task runs.
    pub fn outputs(&self) -> Vec<PathBuf> {
        use crate::products::suffixed;

        match self {
            Task::ImportAsdm(p) => vec![p.vis.clone(), suffixed(&p.vis, ".flagversions")],
            Task::Mstransform(MstransformParams { outputvis, .. })
            | Task::Split(SplitParams { outputvis, .. }) => {
                vec![outputvis.clone(), suffixed(outputvis, ".flagversions")]
            }
            Task::Listobs { listfile, .. } => vec![listfile.clone()],
            Task::Gaincal(p) => vec![p.caltable.clone()],
            Task::Tclean(p) => TcleanParams::PRODUCT_EXTENSIONS
                .iter()
                .map(|ext| suffixed(&p.imagename, ext))
                .collect(),
            Task::Exportfits { fitsimage, .. } => vec![fitsimage.clone()],
            Task::GenerateReductionScript { script, .. } => vec![script.clone()],
            Task::Clearcal { .. }
            | Task::Applycal(_)
            | Task::Statwt { .. }
            | Task::RunCalibrationScript { .. } => vec![],
        }
    }
}

/// A read-only lookup against the toolkit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "query", content = "params", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Query {
    /// Spectral windows tagged as science-quality.
    ScienceSpws { vis: PathBuf },
    /// Antennas present in every scan, best first.
    CommonAntennas { vis: PathBuf },
    /// Dish diameter of an antenna [metres].
    AntennaDiameter { antenna: String },
    /// Scan intents recorded in the raw archive, per scan.
    IntentsFromAsdm { asdm: PathBuf },
    /// Calibrator fields of a visibility set.
    Calibrators { vis: PathBuf },
    /// Estimated synthesized beam [arcsec].
    SynthesizedBeam { vis: PathBuf },
    /// The nearest efficient image size not smaller than `size`.
    OptimumImageSize { size: u32 },
    /// Channel counts of the spectral windows of a visibility set.
    NumChannels { vis: PathBuf },
}

impl Query {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

fn decode<T: DeserializeOwned>(query: &Query, value: serde_json::Value) -> Result<T, ToolkitError> {
    trace!("{} -> {value}", query.name());
    serde_json::from_value(value).map_err(|err| ToolkitError::BadQueryValue {
        query: query.name().to_string(),
        err,
    })
}

/// The external toolkit. Typed lookups are provided on top of [`Toolkit::query`].
pub trait Toolkit: Sync {
    fn run_task(&self, task: &Task) -> Result<(), ToolkitError>;

    fn query(&self, query: &Query) -> Result<serde_json::Value, ToolkitError>;

    fn science_spws(&self, vis: &Path) -> Result<Vec<SpwId>, ToolkitError> {
        let q = Query::ScienceSpws {
            vis: vis.to_path_buf(),
        };
        let v = self.query(&q)?;
        decode(&q, v)
    }

    fn common_antennas(&self, vis: &Path) -> Result<Vec<String>, ToolkitError> {
        let q = Query::CommonAntennas {
            vis: vis.to_path_buf(),
        };
        let v = self.query(&q)?;
        decode(&q, v)
    }

    fn antenna_diameter(&self, antenna: &str) -> Result<f64, ToolkitError> {
        let q = Query::AntennaDiameter {
            antenna: antenna.to_string(),
        };
        let v = self.query(&q)?;
        decode(&q, v)
    }

    /// The scan intents of the raw archive, flattened.
    fn intents_from_asdm(&self, asdm: &Path) -> Result<Vec<String>, ToolkitError> {
        let q = Query::IntentsFromAsdm {
            asdm: asdm.to_path_buf(),
        };
        let v = self.query(&q)?;
        let per_scan: Vec<Vec<String>> = decode(&q, v)?;
        Ok(per_scan.into_iter().flatten().collect())
    }

    fn calibrators(&self, vis: &Path) -> Result<Vec<String>, ToolkitError> {
        let q = Query::Calibrators {
            vis: vis.to_path_buf(),
        };
        let v = self.query(&q)?;
        decode(&q, v)
    }

    fn synthesized_beam(&self, vis: &Path) -> Result<f64, ToolkitError> {
        let q = Query::SynthesizedBeam {
            vis: vis.to_path_buf(),
        };
        let v = self.query(&q)?;
        decode(&q, v)
    }

    fn optimum_image_size(&self, size: u32) -> Result<u32, ToolkitError> {
        let q = Query::OptimumImageSize { size };
        let v = self.query(&q)?;
        decode(&q, v)
    }

    /// The channel count of the first spectral window of `vis`.
    fn num_channels(&self, vis: &Path) -> Result<usize, ToolkitError> {
        let q = Query::NumChannels {
            vis: vis.to_path_buf(),
        };
        let v = self.query(&q)?;
        let counts: Vec<usize> = decode(&q, v)?;
        counts
            .first()
            .copied()
            .ok_or_else(|| ToolkitError::EmptyQueryValue {
                query: q.name().to_string(),
            })
    }
}

/// Parameters of a point-source fit in the UV plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvFitParams {
    pub vis: PathBuf,
    /// Spectral window index within `vis`.
    pub spw: String,
    pub column: DataColumn,
    /// Field index within `vis`.
    pub field: String,
    pub stokes: String,
    /// Worker count of the fitter.
    pub ncpu: usize,
    /// Correct for the primary beam.
    pub pbeam: bool,
    /// [metres]
    pub dish_diameter: f64,
    pub chanwidth: u32,
    /// Model variables; `p[i]` are free parameters.
    pub var: Vec<String>,
    pub p_ini: Vec<f64>,
    pub model: Vec<String>,
    pub bounds: Vec<(Option<f64>, Option<f64>)>,
    /// Fit each channel separately rather than the whole band at once.
    pub one_fit_per_channel: bool,
    pub outfile: PathBuf,
}

impl UvFitParams {
    /// A single unresolved source at the phase centre with one non-negative
    /// flux parameter, starting from 1 Jy.
    pub fn point_source(
        vis: &Path,
        column: DataColumn,
        dish_diameter: f64,
        ncpu: usize,
        mfs: bool,
        outfile: &Path,
    ) -> UvFitParams {
        UvFitParams {
            vis: vis.to_path_buf(),
            spw: "0".to_string(),
            column,
            field: "0".to_string(),
            stokes: "I".to_string(),
            ncpu,
            pbeam: true,
            dish_diameter,
            chanwidth: 1,
            var: vec!["0,0,p[0]".to_string()],
            p_ini: vec![1.0],
            model: vec!["delta".to_string()],
            bounds: vec![(Some(0.0), None)],
            one_fit_per_channel: !mfs,
            outfile: outfile.to_path_buf(),
        }
    }
}

/// The external UV-plane fitter.
pub trait UvFitter: Sync {
    /// Run a fit, leaving its (frequency, flux[, error]) table at
    /// `params.outfile`.
    fn fit(&self, params: &UvFitParams) -> Result<(), ToolkitError>;
}

/// Remove a file, symlink or directory tree. Missing paths are fine.
pub(crate) fn remove_path(path: &Path) -> Result<(), std::io::Error> {
    match fs::symlink_metadata(path) {
        Ok(m) if m.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Run `task` after removing anything at its output paths. In plan-only mode
/// the task is logged and nothing is touched.
pub fn execute(toolkit: &dyn Toolkit, task: &Task, plan_only: bool) -> Result<(), ToolkitError> {
    if plan_only {
        info!("[plan] {}", task.name());
        debug!("{}", serde_json::to_string(task)?);
        return Ok(());
    }

    for output in task.outputs() {
        trace!("Removing {}", output.display());
        remove_path(&output)?;
    }
    debug!("Running {}", task.name());
    toolkit.run_task(task)
}

/// Run a fit after removing its old result. In plan-only mode the fit is only
/// logged.
pub fn execute_fit(
    fitter: &dyn UvFitter,
    params: &UvFitParams,
    plan_only: bool,
) -> Result<(), ToolkitError> {
    if plan_only {
        info!("[plan] uv fit of {}", params.vis.display());
        debug!("{}", serde_json::to_string(params)?);
        return Ok(());
    }

    remove_path(&params.outfile)?;
    if let Some(dir) = params.outfile.parent() {
        fs::create_dir_all(dir)?;
    }
    debug!(
        "Fitting {} ({} column, one fit per channel: {})",
        params.vis.display(),
        params.column,
        params.one_fit_per_channel
    );
    fitter.fit(params)
}
