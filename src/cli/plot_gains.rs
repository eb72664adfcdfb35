// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Plot the gains of a pair of round-0/round-1 tables.

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use itertools::Itertools;
use log::{debug, info};
use strum::IntoEnumIterator;

use crate::{
    plot::{gains::plot_gain_tables, PLOT_EXTENSIONS},
    products::suffixed,
    selfcal::CalMode,
    QsocalError,
};

lazy_static::lazy_static! {
    static ref MODE_HELP: String =
        format!("The calibration mode of the tables. Modes: {}. Default: the mode named in the first table's file name, otherwise {}", CalMode::iter().join(", "), CalMode::Phase);

    static ref OUTPUTS_HELP: String =
        format!("Paths to the plots. Supported formats: {}. Default: the first table's path with a .png extension appended", PLOT_EXTENSIONS.join(", "));
}

#[derive(Parser, Debug)]
pub(super) struct GainPlotArgs {
    /// The round-0 and round-1 gain tables, in that order.
    #[clap(name = "TABLES", parse(from_os_str))]
    tables: Vec<PathBuf>,

    #[clap(short, long, help = MODE_HELP.as_str())]
    mode: Option<String>,

    /// The plot title. Default: the first table's file name.
    #[clap(short, long)]
    title: Option<String>,

    #[clap(short, long, multiple_values(true), help = OUTPUTS_HELP.as_str())]
    outputs: Option<Vec<PathBuf>>,
}

/// The mode a table's name ends with, e.g. `...spw_all.amp_phase_0`.
fn mode_from_name(table: &std::path::Path) -> Option<CalMode> {
    let name = table.file_name()?.to_str()?;
    let (_, suffix) = name.rsplit_once('.')?;
    let (mode, _round) = suffix.rsplit_once('_')?;
    CalMode::from_str(mode).ok()
}

impl GainPlotArgs {
    pub(super) fn run(self) -> Result<(), QsocalError> {
        debug!("{:#?}", self);

        let GainPlotArgs {
            tables,
            mode,
            title,
            outputs,
        } = self;

        let (table0, table1) = match tables.as_slice() {
            [t0, t1] => (t0, t1),
            _ => return Err(GainPlotArgsError::NoTables.into()),
        };
        let mode = match mode {
            Some(m) => CalMode::from_str(&m).map_err(|_| GainPlotArgsError::BadMode(m))?,
            None => mode_from_name(table0).unwrap_or(CalMode::Phase),
        };
        let title = title.unwrap_or_else(|| {
            table0
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        });
        let outputs = outputs.unwrap_or_else(|| vec![suffixed(table0, ".png")]);
        for output in &outputs {
            let ext = output
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase());
            if !matches!(ext.as_deref(), Some(e) if PLOT_EXTENSIONS.contains(&e)) {
                return Err(GainPlotArgsError::UnknownExtension(output.clone()).into());
            }
        }

        plot_gain_tables(&title, mode, table0, table1, &outputs)?;
        for output in &outputs {
            info!("Wrote {}", output.display());
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub(super) enum GainPlotArgsError {
    #[error("Exactly two gain tables (round 0 and round 1) are needed")]
    NoTables,

    #[error("'{0}' is not a calibration mode; expected phase or amp_phase")]
    BadMode(String),

    #[error("Can't plot to {0}; the extension must be png or svg")]
    UnknownExtension(PathBuf),
}
