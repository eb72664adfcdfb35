// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Write the model (and residuals) of one subset from a fit result.

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::common::{display_warnings, InfoPrinter, ARG_FILE_HELP};
use crate::{
    flux::FluxModelOptions, params::FluxModelParams, store::DataColumn, QsocalError,
};

lazy_static::lazy_static! {
    static ref DATA_COLUMN_HELP: String =
        format!("The column residuals are made from. Columns: {}. Default: {}", DataColumn::iter().join(", "), DataColumn::Corrected);
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct FluxModelArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The visibility subset (measurement set) to model.
    #[clap(short, long, help_heading = "INPUT FILES")]
    pub(super) subset: Option<PathBuf>,

    /// The UV fitter's result for the subset: rows of frequency [Hz], flux
    /// [Jy] and optionally the flux error.
    #[clap(short, long, help_heading = "INPUT FILES")]
    pub(super) fit_result: Option<PathBuf>,

    #[clap(long, help = DATA_COLUMN_HELP.as_str(), help_heading = "MODEL")]
    pub(super) data_column: Option<String>,

    /// Write data minus model into the CORRECTED_DATA column.
    #[clap(long, help_heading = "MODEL")]
    #[serde(default)]
    pub(super) write_residuals: bool,

    /// Don't write the model into the MODEL_DATA column.
    #[clap(long, help_heading = "MODEL")]
    #[serde(default)]
    pub(super) no_model: bool,

    /// Use the mean flux in every channel.
    #[clap(long, help_heading = "MODEL")]
    #[serde(default)]
    pub(super) meansub: bool,
}

impl FluxModelArgs {
    pub(super) fn merge(self) -> Result<FluxModelArgs, QsocalError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let FluxModelArgs {
                args_file: _,
                subset,
                fit_result,
                data_column,
                write_residuals,
                no_model,
                meansub,
            } = unpack_arg_file!(arg_file);

            Ok(FluxModelArgs {
                args_file: None,
                subset: cli_args.subset.or(subset),
                fit_result: cli_args.fit_result.or(fit_result),
                data_column: cli_args.data_column.or(data_column),
                write_residuals: cli_args.write_residuals || write_residuals,
                no_model: cli_args.no_model || no_model,
                meansub: cli_args.meansub || meansub,
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<FluxModelParams, QsocalError> {
        debug!("{:#?}", self);

        let FluxModelArgs {
            args_file: _,
            subset,
            fit_result,
            data_column,
            write_residuals,
            no_model,
            meansub,
        } = self;

        let subset = subset.ok_or(FluxModelArgsError::NoSubset)?;
        let fit_result = fit_result.ok_or(FluxModelArgsError::NoFitResult)?;
        let data_column = match data_column {
            None => DataColumn::Corrected,
            Some(s) => DataColumn::from_str(&s.to_lowercase())
                .map_err(|_| FluxModelArgsError::BadColumn(s))?,
        };
        if no_model && !write_residuals {
            return Err(FluxModelArgsError::NothingToWrite.into());
        }

        let mut printer = InfoPrinter::new("Flux model".into());
        printer.push_block(vec![
            format!("Subset: {}", subset.display()).into(),
            format!("Fit result: {}", fit_result.display()).into(),
        ]);
        let mut writes = vec![];
        if !no_model {
            writes.push("model".to_string());
        }
        if write_residuals {
            writes.push(format!("residuals from the {data_column} column"));
        }
        printer.push_line(format!("Writing {}", writes.join(" and ")).into());
        if meansub {
            printer.push_line("Every channel gets the mean flux".into());
        }
        printer.display();
        display_warnings();

        Ok(FluxModelParams {
            subset,
            fit_result,
            options: FluxModelOptions {
                data_column,
                write_residuals,
                save_model: !no_model,
                meansub,
            },
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), QsocalError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub(super) enum FluxModelArgsError {
    #[error("No visibility subset was specified (--subset)")]
    NoSubset,

    #[error("No fit result was specified (--fit-result)")]
    NoFitResult,

    #[error("'{0}' is not a data column; expected one of data, corrected or model")]
    BadColumn(String),

    #[error("--no-model without --write-residuals would write nothing")]
    NothingToWrite,
}
