// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use log::info;

use crate::{
    flux::{extract, FluxModelError, FluxModelOptions},
    store::MsStore,
};

pub(crate) struct FluxModelParams {
    pub(crate) subset: PathBuf,
    pub(crate) fit_result: PathBuf,
    pub(crate) options: FluxModelOptions,
}

impl FluxModelParams {
    pub(crate) fn run(&self) -> Result<(), FluxModelError> {
        let summary = extract(&MsStore, &self.subset, &self.fit_result, self.options)?;
        let mean = summary.spectrum.mean().unwrap_or(0.0);
        info!(
            "{}: {} channels, mean flux {mean:.4} Jy",
            summary.subset.display(),
            summary.spectrum.len()
        );
        if summary.wrote_model {
            info!("Wrote the MODEL_DATA column");
        }
        if summary.wrote_residuals {
            info!("Wrote residuals to the CORRECTED_DATA column");
        }
        Ok(())
    }
}
