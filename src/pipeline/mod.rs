// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The full reduction of one dataset, from the raw archive to spectra.
//!
//! Each step appends `step<N>:<status>` to the dataset's analysis log when it
//! finishes. Steps that mutate data stop the pipeline on the first error;
//! diagnostics (plots) and failures of individual fields only mark their step
//! as partially failed.

mod cleanup;
mod error;
mod imaging;
mod import;
mod plots;
mod script;
mod target;

pub use error::PipelineError;
pub use imaging::ImageGeometry;
pub use script::apply_steps;
pub use target::{calibrator_intents, intent_selection};

use std::path::PathBuf;

use log::info;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::{
    dataset::Dataset,
    products::SpwId,
    selfcal::{FieldOutcome, SelfCalEngine, SelfCalError, SelfCalOptions},
    steplog::{self, StepStatus},
    store::VisStore,
    toolkit::{Toolkit, UvFitter},
};

/// The steps of the pipeline, in the order they run.
#[derive(Debug, Display, EnumIter, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    #[strum(serialize = "unpack")]
    Unpack,
    #[strum(serialize = "import")]
    Import,
    #[strum(serialize = "reduction script")]
    ReductionScript,
    #[strum(serialize = "target removal")]
    RemoveTargets,
    #[strum(serialize = "calibration")]
    Calibrate,
    #[strum(serialize = "self-calibration")]
    SelfCal,
    #[strum(serialize = "continuum imaging")]
    Imaging,
    #[strum(serialize = "space saving")]
    SpaceSave,
    #[strum(serialize = "spectrum plots")]
    SpectrumPlots,
}

impl Step {
    /// The step's number in the analysis log.
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Step> {
        Step::iter().find(|s| s.number() == n)
    }
}

/// How the pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub selfcal: SelfCalOptions,
    /// Remove intermediate products once they're no longer needed.
    pub space_save: bool,
    /// Compress the raw archive and the calibrated subsets when saving space.
    pub gzip: bool,
    /// Re-weight the combined subsets before imaging.
    pub statwt: bool,
    pub plots: bool,
    /// Self-calibrate several fields at once.
    pub parallel_fields: bool,
    /// Steps that only log what they would do.
    pub plan_steps: Vec<Step>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            selfcal: SelfCalOptions::default(),
            space_save: false,
            gzip: false,
            statwt: false,
            plots: true,
            parallel_fields: false,
            plan_steps: vec![],
        }
    }
}

/// What running the pipeline did.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Every finished step, in order.
    pub steps: Vec<(Step, StepStatus)>,
    pub fields: Vec<Result<FieldOutcome, SelfCalError>>,
}

impl PipelineReport {
    pub fn all_ok(&self) -> bool {
        !self.steps.iter().any(|(_, s)| s.is_failure())
    }
}

/// The facts about a dataset learned by the early steps and used by the
/// later ones.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Observation {
    /// The raw ASDM inside the unpacked project tree.
    pub(crate) asdm: PathBuf,
    pub(crate) spws: Vec<SpwId>,
    pub(crate) refant: String,
    /// [metres]
    pub(crate) dish_diameter: f64,
}

pub struct Pipeline<'a> {
    dataset: &'a Dataset,
    toolkit: &'a dyn Toolkit,
    fitter: &'a dyn UvFitter,
    store: &'a dyn VisStore,
    options: &'a PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        dataset: &'a Dataset,
        toolkit: &'a dyn Toolkit,
        fitter: &'a dyn UvFitter,
        store: &'a dyn VisStore,
        options: &'a PipelineOptions,
    ) -> Pipeline<'a> {
        Pipeline {
            dataset,
            toolkit,
            fitter,
            store,
            options,
        }
    }

    fn plan_only(&self, step: Step) -> bool {
        self.options.plan_steps.contains(&step)
    }

    /// Log the end of a step. Planned steps are logged as such, but never
    /// create the dataset's directory.
    fn finish(
        &self,
        step: Step,
        status: StepStatus,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let planned = self.plan_only(step);
        let status = if planned { StepStatus::Planned } else { status };
        info!("step{} ({step}): {status}", step.number());
        if !planned || self.dataset.paths.root().exists() {
            steplog::append(&self.dataset.paths.step_log(), step.number(), status)?;
        }
        report.steps.push((step, status));
        Ok(())
    }

    /// Run every step.
    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::default();

        self.unpack(self.plan_only(Step::Unpack))?;
        self.finish(Step::Unpack, StepStatus::Ok, &mut report)?;

        let (asdm, spws) = self.import(self.plan_only(Step::Import))?;
        self.finish(Step::Import, StepStatus::Ok, &mut report)?;

        let (refant, dish_diameter) =
            self.reduction_script(self.plan_only(Step::ReductionScript))?;
        self.finish(Step::ReductionScript, StepStatus::Ok, &mut report)?;
        let obs = Observation {
            asdm,
            spws,
            refant,
            dish_diameter,
        };

        self.remove_targets(&obs, self.plan_only(Step::RemoveTargets))?;
        self.finish(Step::RemoveTargets, StepStatus::Ok, &mut report)?;

        let plan = self.plan_only(Step::Calibrate);
        self.calibrate(plan)?;
        let fields = self.calibrator_fields()?;
        let geometry = ImageGeometry::for_vis(
            self.toolkit,
            &self.dataset.paths.split_vis(),
            obs.dish_diameter,
        )?;
        info!(
            "Calibrator fields: {}; images of {} px with {} cells",
            fields.join(", "),
            geometry.imsize,
            geometry.cell
        );
        self.finish(Step::Calibrate, StepStatus::Ok, &mut report)?;
        if self.options.space_save {
            self.early_space_save(plan)?;
        }

        let plan = self.plan_only(Step::SelfCal);
        let selfcal_options = SelfCalOptions {
            space_save: self.options.space_save,
            plan_only: plan,
            ..self.options.selfcal.clone()
        };
        let engine = SelfCalEngine::new(
            self.toolkit,
            self.fitter,
            self.store,
            &self.dataset.paths,
            &selfcal_options,
        );
        report.fields = engine.run_fields(
            &fields,
            &obs.refant,
            obs.dish_diameter,
            &obs.spws,
            self.options.parallel_fields,
        );
        let calibrated: Vec<String> = report
            .fields
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|o| o.field.clone())
            .collect();
        let mut failed = calibrated.len() != fields.len();
        if self.options.plots && !plan {
            failed |= !self.gain_plots(&calibrated);
        }
        self.finish(Step::SelfCal, StepStatus::from_failures(failed), &mut report)?;

        self.image(&calibrated, &geometry, self.plan_only(Step::Imaging))?;
        self.finish(Step::Imaging, StepStatus::Ok, &mut report)?;

        if self.options.space_save {
            self.final_space_save(&calibrated, self.plan_only(Step::SpaceSave))?;
        }
        self.finish(Step::SpaceSave, StepStatus::Ok, &mut report)?;

        let plan = self.plan_only(Step::SpectrumPlots);
        let failed = if self.options.plots && !plan {
            !self.spectrum_plots(&fields, &obs.spws)
        } else {
            false
        };
        self.finish(
            Step::SpectrumPlots,
            StepStatus::from_failures(failed),
            &mut report,
        )?;

        Ok(report)
    }
}
