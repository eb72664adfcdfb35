// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Diagnostic plots. A plot that can't be made is reported but stops nothing.

use std::{fs, path::PathBuf};

use log::{info, warn};
use strum::IntoEnumIterator;

use super::Pipeline;
use crate::{
    plot::{gains::plot_gain_tables, spectrum::plot_fit_result, PLOT_EXTENSIONS},
    products::{FitIntent, SpwId, SpwSel},
    selfcal::CalMode,
};

impl Pipeline<'_> {
    /// Gains of both rounds of every mode, for each field. Returns whether
    /// every plot was drawn.
    pub(super) fn gain_plots(&self, fields: &[String]) -> bool {
        let paths = &self.dataset.paths;
        let mut all_ok = true;
        for field in fields {
            for mode in CalMode::iter() {
                let outputs: Vec<PathBuf> = PLOT_EXTENSIONS
                    .iter()
                    .map(|ext| paths.gain_plot(field, SpwSel::All, mode, ext))
                    .collect();
                let result = plot_gain_tables(
                    &format!("{} {field} spw:all", paths.session()),
                    mode,
                    &paths.gain_table(field, SpwSel::All, mode, 0),
                    &paths.gain_table(field, SpwSel::All, mode, 1),
                    &outputs,
                );
                if let Err(e) = result {
                    warn!("Couldn't plot the {mode} gains of {field}: {e}");
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    /// Step 8: the line-to-continuum spectrum of every (field, spw). Returns
    /// whether every plot was drawn.
    pub(super) fn spectrum_plots(&self, fields: &[String], spws: &[SpwId]) -> bool {
        let paths = &self.dataset.paths;
        if let Err(e) = fs::create_dir_all(paths.specplot_dir()) {
            warn!("Couldn't create {}: {e}", paths.specplot_dir().display());
            return false;
        }

        let mut all_ok = true;
        for field in fields {
            for &spw in spws {
                let outputs: Vec<PathBuf> = PLOT_EXTENSIONS
                    .iter()
                    .map(|ext| paths.spec_plot(field, spw, ext))
                    .collect();
                let result = plot_fit_result(
                    &format!("{}: {field} spw{spw}", paths.session()),
                    &paths.fit_result(field, SpwSel::Id(spw), Some(FitIntent::SelfCal)),
                    &outputs,
                );
                match result {
                    Ok(()) => info!("Plotted the spectrum of {field} spw{spw}"),
                    Err(e) => {
                        warn!("Couldn't plot the spectrum of {field} spw{spw}: {e}");
                        all_ok = false;
                    }
                }
            }
        }
        all_ok
    }
}

