// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parse pipeline arguments into parameters.

#[cfg(test)]
mod tests;

use std::{borrow::Cow, path::PathBuf};

use clap::Parser;
use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::common::{display_warnings, plural, InfoPrinter, Warn, ARG_FILE_HELP};
use crate::{
    constants::{
        DEFAULT_AMP_PHASE_SOLINT, DEFAULT_FIT_WORKERS, DEFAULT_MIN_SNR, DEFAULT_PHASE_SOLINT,
    },
    dataset::Dataset,
    params::PipelineParams,
    pipeline::{PipelineOptions, Step},
    selfcal::SelfCalOptions,
    QsocalError,
};

/// How the toolkit is started when nothing else is said.
const DEFAULT_CASA_COMMAND: &str = "casa --nologger --nogui --agg -c";

lazy_static::lazy_static! {
    static ref CASA_COMMAND_HELP: String =
        format!("The command that runs a Python script inside the toolkit; the script and its arguments are appended. Default: '{DEFAULT_CASA_COMMAND}'");

    static ref FIT_WORKERS_HELP: String =
        format!("The number of workers the UV fitter may use. Default: {DEFAULT_FIT_WORKERS}");

    static ref MIN_SNR_HELP: String =
        format!("Solutions below this signal-to-noise ratio are flagged. Default: {DEFAULT_MIN_SNR}");

    static ref PHASE_SOLINT_HELP: String =
        format!("The solution interval of the phase-only gain solves. Default: {DEFAULT_PHASE_SOLINT}");

    static ref AMP_PHASE_SOLINT_HELP: String =
        format!("The solution interval of the amplitude+phase gain solves. Default: {DEFAULT_AMP_PHASE_SOLINT} (per scan)");

    static ref PLAN_STEPS_HELP: String =
        format!("Steps that only log what they would do. Steps: {}", Step::iter().map(|s| format!("{}={s}", s.number())).join(", "));
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct DataArgs {
    /// The observatory archive, named
    /// <project>_uid___<session>.asdm.sdm[.tar[.gz]]. It needn't exist if the
    /// session directory already holds its contents.
    #[clap(short, long, help_heading = "INPUT DATA")]
    pub(super) archive: Option<PathBuf>,

    /// The directory that holds (or will hold) the session directory. Default:
    /// the archive's directory.
    #[clap(short, long, help_heading = "INPUT DATA")]
    pub(super) working_dir: Option<PathBuf>,
}

impl DataArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            archive: self.archive.or(other.archive),
            working_dir: self.working_dir.or(other.working_dir),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ToolkitArgs {
    #[clap(long, help = CASA_COMMAND_HELP.as_str(), help_heading = "TOOLKIT")]
    pub(super) casa_command: Option<String>,

    /// The command that runs the UV fitter's scripts, if it differs from the
    /// toolkit command.
    #[clap(long, help_heading = "TOOLKIT")]
    pub(super) fitter_command: Option<String>,
}

impl ToolkitArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            casa_command: self.casa_command.or(other.casa_command),
            fitter_command: self.fitter_command.or(other.fitter_command),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SelfCalArgs {
    #[clap(long, help = FIT_WORKERS_HELP.as_str(), help_heading = "SELF-CALIBRATION")]
    pub(super) fit_workers: Option<usize>,

    #[clap(long, help = MIN_SNR_HELP.as_str(), help_heading = "SELF-CALIBRATION")]
    pub(super) min_snr: Option<f64>,

    #[clap(long, help = PHASE_SOLINT_HELP.as_str(), help_heading = "SELF-CALIBRATION")]
    pub(super) phase_solint: Option<String>,

    #[clap(long, help = AMP_PHASE_SOLINT_HELP.as_str(), help_heading = "SELF-CALIBRATION")]
    pub(super) amp_phase_solint: Option<String>,

    /// Model every channel with the mean fitted flux rather than the fitted
    /// spectrum.
    #[clap(long, help_heading = "SELF-CALIBRATION")]
    #[serde(default)]
    pub(super) meansub: bool,

    /// Self-calibrate several fields at once.
    #[clap(long, help_heading = "SELF-CALIBRATION")]
    #[serde(default)]
    pub(super) parallel_fields: bool,
}

impl SelfCalArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            fit_workers: self.fit_workers.or(other.fit_workers),
            min_snr: self.min_snr.or(other.min_snr),
            phase_solint: self.phase_solint.or(other.phase_solint),
            amp_phase_solint: self.amp_phase_solint.or(other.amp_phase_solint),
            meansub: self.meansub || other.meansub,
            parallel_fields: self.parallel_fields || other.parallel_fields,
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct StepArgs {
    /// Remove intermediate products as soon as they're no longer needed.
    #[clap(long, help_heading = "STEPS")]
    #[serde(default)]
    pub(super) space_save: bool,

    /// When saving space, also gzip the raw archive and pack the calibrated
    /// subsets into calibrated.tar.gz.
    #[clap(long, help_heading = "STEPS")]
    #[serde(default)]
    pub(super) gzip: bool,

    /// Re-weight the combined subsets from their scatter before imaging.
    #[clap(long, help_heading = "STEPS")]
    #[serde(default)]
    pub(super) statwt: bool,

    /// Don't draw gain or spectrum plots.
    #[clap(long, help_heading = "STEPS")]
    #[serde(default)]
    pub(super) no_plots: bool,

    /// Only log what every step would do; nothing is run or modified.
    #[clap(long, help_heading = "STEPS")]
    #[serde(default)]
    pub(super) plan_only: bool,

    #[clap(long, multiple_values(true), help = PLAN_STEPS_HELP.as_str(), help_heading = "STEPS")]
    pub(super) plan_steps: Option<Vec<u8>>,
}

impl StepArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            space_save: self.space_save || other.space_save,
            gzip: self.gzip || other.gzip,
            statwt: self.statwt || other.statwt,
            no_plots: self.no_plots || other.no_plots,
            plan_only: self.plan_only || other.plan_only,
            plan_steps: self.plan_steps.or(other.plan_steps),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct RunArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "data")]
    #[serde(default)]
    pub(super) data_args: DataArgs,

    #[clap(flatten)]
    #[serde(rename = "toolkit")]
    #[serde(default)]
    pub(super) toolkit_args: ToolkitArgs,

    #[clap(flatten)]
    #[serde(rename = "self-calibration")]
    #[serde(default)]
    pub(super) selfcal_args: SelfCalArgs,

    #[clap(flatten)]
    #[serde(rename = "steps")]
    #[serde(default)]
    pub(super) step_args: StepArgs,
}

impl RunArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<RunArgs, QsocalError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Ensure all of the file args are accounted for by pattern
            // matching.
            let RunArgs {
                args_file: _,
                data_args,
                toolkit_args,
                selfcal_args,
                step_args,
            } = unpack_arg_file!(arg_file);

            Ok(RunArgs {
                args_file: None,
                data_args: cli_args.data_args.merge(data_args),
                toolkit_args: cli_args.toolkit_args.merge(toolkit_args),
                selfcal_args: cli_args.selfcal_args.merge(selfcal_args),
                step_args: cli_args.step_args.merge(step_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self) -> Result<PipelineParams, QsocalError> {
        debug!("{:#?}", self);

        let RunArgs {
            args_file: _,
            data_args: DataArgs {
                archive,
                working_dir,
            },
            toolkit_args:
                ToolkitArgs {
                    casa_command,
                    fitter_command,
                },
            selfcal_args:
                SelfCalArgs {
                    fit_workers,
                    min_snr,
                    phase_solint,
                    amp_phase_solint,
                    meansub,
                    parallel_fields,
                },
            step_args:
                StepArgs {
                    space_save,
                    gzip,
                    statwt,
                    no_plots,
                    plan_only,
                    plan_steps,
                },
        } = self;

        let archive = archive.ok_or(RunArgsError::NoArchive)?;
        let dataset = Dataset::locate(&archive, working_dir.as_deref())?;

        let casa_command = casa_command.unwrap_or_else(|| DEFAULT_CASA_COMMAND.to_string());
        if casa_command.trim().is_empty() {
            return Err(RunArgsError::EmptyCommand("toolkit").into());
        }
        let fitter_command = fitter_command.unwrap_or_else(|| casa_command.clone());
        if fitter_command.trim().is_empty() {
            return Err(RunArgsError::EmptyCommand("fitter").into());
        }

        let fit_workers = fit_workers.unwrap_or(DEFAULT_FIT_WORKERS);
        if fit_workers == 0 {
            return Err(RunArgsError::ZeroFitWorkers.into());
        }
        let min_snr = min_snr.unwrap_or(DEFAULT_MIN_SNR);
        if !(min_snr.is_finite() && min_snr >= 0.0) {
            return Err(RunArgsError::BadMinSnr(min_snr).into());
        }
        let phase_solint = phase_solint.unwrap_or_else(|| DEFAULT_PHASE_SOLINT.to_string());
        if phase_solint.trim().is_empty() {
            return Err(RunArgsError::EmptySolint("phase").into());
        }
        let amp_phase_solint =
            amp_phase_solint.unwrap_or_else(|| DEFAULT_AMP_PHASE_SOLINT.to_string());
        if amp_phase_solint.trim().is_empty() {
            return Err(RunArgsError::EmptySolint("amplitude+phase").into());
        }

        let plan_steps: Vec<Step> = if plan_only {
            if plan_steps.is_some() {
                "--plan-only covers every step; ignoring --plan-steps".warn();
            }
            Step::iter().collect()
        } else {
            let mut steps = plan_steps
                .unwrap_or_default()
                .into_iter()
                .map(|n| Step::from_number(n).ok_or(RunArgsError::BadStep(n)))
                .collect::<Result<Vec<_>, _>>()?;
            steps.sort_unstable();
            steps.dedup();
            steps
        };

        if gzip && !space_save {
            "--gzip only applies when saving space (--space-save); nothing will be compressed"
                .warn();
        }
        if parallel_fields {
            let block: Vec<Cow<'static, str>> = vec![
                "Fields will be self-calibrated in parallel.".into(),
                format!("Each fit may use up to {fit_workers} workers of its own.").into(),
            ];
            block.warn();
        }

        let mut printer = InfoPrinter::new("Pipeline set up".into());
        printer.push_block(vec![
            format!("Archive: {}", archive.display()).into(),
            format!("Session directory: {}", dataset.paths.root().display()).into(),
        ]);
        let mut toolkit_block: Vec<Cow<'static, str>> =
            vec![format!("Toolkit: {casa_command}").into()];
        if fitter_command != casa_command {
            toolkit_block.push(format!("Fitter: {fitter_command}").into());
        }
        printer.push_block(toolkit_block);
        printer.push_block(vec![
            format!(
                "Self-calibration: phase solint {phase_solint}, amp+phase solint {amp_phase_solint}, min. SNR {min_snr}"
            )
            .into(),
            format!("{} per fit", plural(fit_workers, "worker", "workers")).into(),
        ]);
        if meansub {
            printer.push_line("Models use the mean flux of every spectral window".into());
        }
        if space_save && gzip {
            printer.push_line("Saving space; compressing the archive and the calibrated subsets".into());
        } else if space_save {
            printer.push_line("Saving space".into());
        }
        if !plan_steps.is_empty() {
            printer.push_line(
                format!(
                    "Plan only: {}",
                    plan_steps
                        .iter()
                        .map(|s| format!("step{} ({s})", s.number()))
                        .join(", ")
                )
                .into(),
            );
        }
        printer.display();
        display_warnings();

        let options = PipelineOptions {
            selfcal: SelfCalOptions {
                fit_workers,
                min_snr,
                phase_solint,
                amp_phase_solint,
                meansub,
                // The pipeline decides these per step.
                space_save: false,
                plan_only: false,
            },
            space_save,
            gzip: gzip && space_save,
            statwt,
            plots: !no_plots,
            parallel_fields,
            plan_steps,
        };
        Ok(PipelineParams {
            dataset,
            casa_command,
            fitter_command,
            options,
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
pub(super) enum RunArgsError {
    #[error("No archive was specified (--archive)")]
    NoArchive,

    #[error("The {0} command is empty")]
    EmptyCommand(&'static str),

    #[error("The UV fitter needs at least one worker")]
    ZeroFitWorkers,

    #[error("The minimum SNR must be a non-negative number, not {0}")]
    BadMinSnr(f64),

    #[error("The {0} solution interval is empty")]
    EmptySolint(&'static str),

    #[error("There is no step {0}; steps are numbered 0 to 8")]
    BadStep(u8),
}
