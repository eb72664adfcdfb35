// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Recording stand-ins for the toolkit, the fitter and the visibility store.
//! Tasks leave empty artifacts at their output paths so that later stages see
//! what they would see in a real run.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use marlu::c32;
use ndarray::prelude::*;
use serde_json::json;

use crate::{
    constants::SCRIPT_APPLY_STEP_TITLE,
    products::SpwId,
    store::{DataColumn, StoreError, VisStore},
    toolkit::{
        GaincalParams, Query, Task, TcleanParams, Toolkit, ToolkitError, UvFitParams, UvFitter,
    },
};

fn touch_dir(path: &Path) {
    fs::create_dir_all(path).unwrap();
}

fn touch_file(path: &Path, contents: &str) {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[derive(Debug)]
pub(crate) struct MockToolkit {
    pub(crate) tasks: Mutex<Vec<Task>>,
    pub(crate) queries: Mutex<Vec<Query>>,
    /// `None` makes the science-spw query fail.
    pub(crate) science_spws: Option<Vec<SpwId>>,
    pub(crate) antennas: Vec<String>,
    pub(crate) dish_diameter: f64,
    pub(crate) intents: Vec<Vec<String>>,
    pub(crate) calibrators: Vec<String>,
    /// [arcsec]
    pub(crate) beam: f64,
    /// Channels left after combining spectral windows.
    pub(crate) combined_channels: usize,
    /// Whether the generated script has the apply-only header.
    pub(crate) script_applies_tables: bool,
    /// Directories the calibration script leaves behind.
    pub(crate) script_outputs: Vec<PathBuf>,
    /// Tasks with this name fail.
    pub(crate) failing_task: Option<&'static str>,
}

impl Default for MockToolkit {
    fn default() -> Self {
        MockToolkit {
            tasks: Mutex::new(vec![]),
            queries: Mutex::new(vec![]),
            science_spws: Some(vec![17, 19]),
            antennas: vec!["DA41".to_string(), "DV08".to_string()],
            dish_diameter: 12.0,
            intents: vec![
                vec!["CALIBRATE_BANDPASS".to_string()],
                vec!["CALIBRATE_PHASE".to_string(), "OBSERVE_TARGET".to_string()],
                vec!["OBSERVE_TARGET".to_string()],
                vec!["CALIBRATE_PHASE".to_string()],
            ],
            calibrators: vec!["J1924-2914".to_string()],
            beam: 0.5,
            combined_channels: 1,
            script_applies_tables: true,
            script_outputs: vec![],
            failing_task: None,
        }
    }
}

impl MockToolkit {
    pub(crate) fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }

    pub(crate) fn task_names(&self) -> Vec<&'static str> {
        self.tasks().iter().map(|t| t.name()).collect()
    }

    pub(crate) fn gaincals(&self) -> Vec<GaincalParams> {
        self.tasks()
            .into_iter()
            .filter_map(|t| match t {
                Task::Gaincal(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }
}

impl Toolkit for MockToolkit {
    fn run_task(&self, task: &Task) -> Result<(), ToolkitError> {
        self.tasks.lock().unwrap().push(task.clone());
        if self.failing_task == Some(task.name()) {
            return Err(ToolkitError::TaskFailed {
                task: task.name().to_string(),
                message: "mock failure".to_string(),
            });
        }

        match task {
            Task::ImportAsdm(p) => touch_dir(&p.vis),
            Task::Mstransform(p) => touch_dir(&p.outputvis),
            Task::Split(p) => touch_dir(&p.outputvis),
            Task::Listobs { listfile, .. } => touch_file(listfile, "listobs"),
            Task::Gaincal(p) => touch_dir(&p.caltable),
            Task::Tclean(p) => {
                for ext in TcleanParams::PRODUCT_EXTENSIONS {
                    touch_dir(&crate::products::suffixed(&p.imagename, ext));
                }
            }
            Task::Exportfits { fitsimage, .. } => touch_file(fitsimage, "SIMPLE"),
            Task::GenerateReductionScript { script, .. } => {
                let mut contents = String::new();
                for i in 0..crate::constants::SCRIPT_STEP_LINE {
                    contents.push_str(&format!("# header line {i}\n"));
                }
                let title = if self.script_applies_tables {
                    SCRIPT_APPLY_STEP_TITLE
                } else {
                    "Flagging"
                };
                contents.push_str(&format!("  16: '{title}',\n"));
                contents.push_str("  17: 'Split out corrected column'}\n");
                touch_file(script, &contents);
            }
            Task::RunCalibrationScript { .. } => {
                for p in &self.script_outputs {
                    touch_dir(p);
                }
            }
            Task::Clearcal { .. } | Task::Applycal(_) | Task::Statwt { .. } => (),
        }
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<serde_json::Value, ToolkitError> {
        self.queries.lock().unwrap().push(query.clone());
        let failed = || ToolkitError::QueryFailed {
            query: query.name().to_string(),
            message: "mock failure".to_string(),
        };
        Ok(match query {
            Query::ScienceSpws { .. } => {
                let spws = self.science_spws.clone().ok_or_else(failed)?;
                json!(spws)
            }
            Query::CommonAntennas { .. } => json!(self.antennas),
            Query::AntennaDiameter { .. } => json!(self.dish_diameter),
            Query::IntentsFromAsdm { .. } => json!(self.intents),
            Query::Calibrators { .. } => json!(self.calibrators),
            Query::SynthesizedBeam { .. } => json!(self.beam),
            // Round up to the next multiple of 10.
            Query::OptimumImageSize { size } => json!((size + 9) / 10 * 10),
            Query::NumChannels { .. } => json!([self.combined_channels]),
        })
    }
}

/// Writes a flat flux table for every fit.
#[derive(Debug)]
pub(crate) struct MockFitter {
    pub(crate) fits: Mutex<Vec<UvFitParams>>,
    /// Rows written by per-channel fits.
    pub(crate) channels: usize,
    /// Fits of visibility sets whose path contains this write an empty table.
    pub(crate) empty_for: Option<String>,
}

impl Default for MockFitter {
    fn default() -> Self {
        MockFitter {
            fits: Mutex::new(vec![]),
            channels: 8,
            empty_for: None,
        }
    }
}

impl MockFitter {
    pub(crate) fn fits(&self) -> Vec<UvFitParams> {
        self.fits.lock().unwrap().clone()
    }
}

impl UvFitter for MockFitter {
    fn fit(&self, params: &UvFitParams) -> Result<(), ToolkitError> {
        self.fits.lock().unwrap().push(params.clone());
        if let Some(s) = self.empty_for.as_deref() {
            if params.vis.display().to_string().contains(s) {
                touch_file(&params.outfile, "");
                return Ok(());
            }
        }

        let rows = if params.one_fit_per_channel {
            self.channels
        } else {
            1
        };
        let mut contents = "# Frequency (Hz)  Flux (Jy)  Error (Jy)\n".to_string();
        for i in 0..rows {
            contents.push_str(&format!(
                "{:.6e} {:.4} 0.01\n",
                230e9 + i as f64 * 1e6,
                1.0 + i as f64 * 0.1
            ));
        }
        touch_file(&params.outfile, &contents);
        Ok(())
    }
}

/// Visibility subsets held in memory. Subsets spring into existence with
/// `freqs` channels and `rows` x `pols` visibilities the first time they are
/// touched.
#[derive(Debug)]
pub(crate) struct MemoryStore {
    pub(crate) freqs: Vec<f64>,
    pub(crate) rows: usize,
    pub(crate) pols: usize,
    pub(crate) columns: Mutex<HashMap<(PathBuf, DataColumn), Array3<c32>>>,
    pub(crate) writes: Mutex<Vec<(PathBuf, Vec<DataColumn>)>>,
}

impl MemoryStore {
    pub(crate) fn new(freqs: Vec<f64>, rows: usize, pols: usize) -> MemoryStore {
        MemoryStore {
            freqs,
            rows,
            pols,
            columns: Mutex::new(HashMap::new()),
            writes: Mutex::new(vec![]),
        }
    }

    /// Set a column of a subset.
    pub(crate) fn put(&self, subset: &Path, column: DataColumn, cube: Array3<c32>) {
        self.columns
            .lock()
            .unwrap()
            .insert((subset.to_path_buf(), column), cube);
    }

    pub(crate) fn get(&self, subset: &Path, column: DataColumn) -> Array3<c32> {
        self.read_column(subset, column).unwrap()
    }

    pub(crate) fn writes(&self) -> Vec<(PathBuf, Vec<DataColumn>)> {
        self.writes.lock().unwrap().clone()
    }
}

impl VisStore for MemoryStore {
    fn chan_freqs(&self, _: &Path) -> Result<Vec<f64>, StoreError> {
        Ok(self.freqs.clone())
    }

    fn read_column(&self, subset: &Path, column: DataColumn) -> Result<Array3<c32>, StoreError> {
        let shape = (self.rows, self.freqs.len(), self.pols);
        let mut columns = self.columns.lock().unwrap();
        let cube = columns
            .entry((subset.to_path_buf(), column))
            .or_insert_with(|| match column {
                DataColumn::Model => Array3::zeros(shape),
                DataColumn::Data | DataColumn::Corrected => {
                    Array3::from_elem(shape, c32::new(5.0, 0.0))
                }
            });
        Ok(cube.clone())
    }

    fn write_columns(
        &self,
        subset: &Path,
        columns: &[(DataColumn, &Array3<c32>)],
    ) -> Result<(), StoreError> {
        for (column, cube) in columns {
            if cube.len_of(Axis(0)) != self.rows {
                return Err(StoreError::RowCountMismatch {
                    path: subset.to_path_buf(),
                    column: column.ms_column(),
                    expected: self.rows,
                    got: cube.len_of(Axis(0)),
                });
            }
        }
        let mut stored = self.columns.lock().unwrap();
        for (column, cube) in columns {
            stored.insert((subset.to_path_buf(), *column), (*cube).clone());
        }
        self.writes.lock().unwrap().push((
            subset.to_path_buf(),
            columns.iter().map(|(c, _)| *c).collect(),
        ));
        Ok(())
    }
}
