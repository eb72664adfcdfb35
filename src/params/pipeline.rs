// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::{info, warn};

use crate::{
    dataset::Dataset,
    pipeline::{Pipeline, PipelineError, PipelineOptions, PipelineReport},
    store::MsStore,
    toolkit::{CasaRunner, CasaToolkit, UvMultiFit},
};

pub(crate) struct PipelineParams {
    pub(crate) dataset: Dataset,
    /// e.g. `casa --nologger --nogui -c`
    pub(crate) casa_command: String,
    /// The fitter may need a different installation of the toolkit.
    pub(crate) fitter_command: String,
    pub(crate) options: PipelineOptions,
}

impl PipelineParams {
    pub(crate) fn run(&self) -> Result<PipelineReport, PipelineError> {
        let paths = &self.dataset.paths;
        let toolkit = CasaToolkit::new(CasaRunner::new(
            &self.casa_command,
            paths.root(),
            &paths.requests_dir(),
        )?);
        let fitter = UvMultiFit::new(CasaRunner::new(
            &self.fitter_command,
            paths.root(),
            &paths.requests_dir(),
        )?);
        let store = MsStore;

        let report = Pipeline::new(&self.dataset, &toolkit, &fitter, &store, &self.options).run()?;

        for result in &report.fields {
            match result {
                Ok(outcome) => info!(
                    "{}: {} spectral windows self-calibrated",
                    outcome.field,
                    outcome.spw_fits.len()
                ),
                Err(e) => warn!("{e}"),
            }
        }
        if report.all_ok() {
            info!("Every step of {} succeeded", paths.session());
        } else {
            for (step, status) in report.steps.iter().filter(|(_, s)| s.is_failure()) {
                warn!("step{} ({step}): {status}", step.number());
            }
        }
        Ok(report)
    }
}
