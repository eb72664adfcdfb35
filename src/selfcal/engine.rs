// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{
    fs,
    path::{Path, PathBuf},
};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;

use super::{
    CalMode, FieldContext, GainChain, GainTable, SelfCalError, SelfCalOptions, Stage, StageError,
};
use crate::{
    constants::AVERAGE_ALL_CHANNELS,
    flux::{self, FitResult, FluxModelOptions},
    products::{FitIntent, ProductPaths, SpwId, SpwSel, TmpStage},
    store::{DataColumn, VisStore},
    toolkit::{
        execute, execute_fit, remove_path, ApplycalParams, GainType, GaincalParams,
        MstransformParams, SplitParams, Task, TaskColumn, Toolkit, UvFitParams, UvFitter,
    },
    PROGRESS_BARS,
};

/// Only on-source integrations are split out.
const ON_SOURCE: &str = "*ON_SOURCE*";

/// The fit results of one spectral window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpwFits {
    pub spw: SpwId,
    pub subset: PathBuf,
    pub noselfcal: PathBuf,
    pub selfcal: PathBuf,
}

/// What self-calibrating a field produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOutcome {
    pub field: String,
    /// The band-averaged subset every gain table was solved on.
    pub combined: PathBuf,
    pub initial_fit: PathBuf,
    pub refined_fit: PathBuf,
    /// Every solved table, in solve order.
    pub gains: GainChain,
    pub spw_fits: Vec<SpwFits>,
}

/// Drives the toolkit and the fitter through the self-calibration of
/// calibrator fields. Fields share nothing, so several may run at once.
pub struct SelfCalEngine<'a> {
    toolkit: &'a dyn Toolkit,
    fitter: &'a dyn UvFitter,
    store: &'a dyn VisStore,
    paths: &'a ProductPaths,
    options: &'a SelfCalOptions,
}

impl<'a> SelfCalEngine<'a> {
    pub fn new(
        toolkit: &'a dyn Toolkit,
        fitter: &'a dyn UvFitter,
        store: &'a dyn VisStore,
        paths: &'a ProductPaths,
        options: &'a SelfCalOptions,
    ) -> SelfCalEngine<'a> {
        SelfCalEngine {
            toolkit,
            fitter,
            store,
            paths,
            options,
        }
    }

    /// Self-calibrate every field. A failed field is reported in its slot of
    /// the result and doesn't stop the others.
    pub fn run_fields(
        &self,
        fields: &[String],
        refant: &str,
        dish_diameter: f64,
        spws: &[SpwId],
        parallel: bool,
    ) -> Vec<Result<FieldOutcome, SelfCalError>> {
        let draw_target = if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        };
        let style = ProgressStyle::with_template(
            "{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} fields ({elapsed_precise}<{eta_precise})",
        )
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        let progress = ProgressBar::with_draw_target(Some(fields.len() as u64), draw_target)
            .with_style(style)
            .with_position(0)
            .with_message("Self-calibrating");

        let run = |field: &String| {
            let ctx = FieldContext {
                field: field.as_str(),
                refant,
                dish_diameter,
                spws,
            };
            let result = self.run_field(&ctx);
            if let Err(e) = &result {
                warn!("{e}");
            }
            progress.inc(1);
            result
        };
        let results: Vec<_> = if parallel {
            fields.par_iter().map(run).collect()
        } else {
            fields.iter().map(run).collect()
        };
        progress.abandon_with_message("Finished self-calibration");
        results
    }

    /// Run every stage for one field, stopping at the first failure.
    pub fn run_field(&self, ctx: &FieldContext) -> Result<FieldOutcome, SelfCalError> {
        info!(
            "Self-calibrating {} (refant {}, spws {:?})",
            ctx.field, ctx.refant, ctx.spws
        );

        let combined = self
            .average_split(ctx)
            .map_err(ctx.at(Stage::AverageSplit))?;

        // Round 0.
        let initial_fit = self
            .fit_and_model(
                ctx,
                &combined,
                FitIntent::NoSelfCal,
                FluxModelOptions {
                    data_column: DataColumn::Data,
                    write_residuals: false,
                    save_model: true,
                    meansub: self.options.meansub,
                },
            )
            .map_err(ctx.at(Stage::InitialFit))?;
        let mut gains = GainChain::default();
        let table = self
            .solve(ctx, &combined, CalMode::Phase, 0, GainType::G, &gains)
            .map_err(ctx.at(Stage::SolvePhase0))?;
        gains.push(table);
        let table = self
            .solve(ctx, &combined, CalMode::AmpPhase, 0, GainType::T, &gains)
            .map_err(ctx.at(Stage::SolveAmpPhase0))?;
        gains.push(table);
        let round0 = gains.round(0);
        self.apply(&combined, &round0)
            .map_err(ctx.at(Stage::Apply0))?;

        // Round 1.
        let refined_fit = self
            .fit_and_model(
                ctx,
                &combined,
                FitIntent::SelfCal,
                FluxModelOptions {
                    data_column: DataColumn::Corrected,
                    write_residuals: true,
                    save_model: true,
                    meansub: self.options.meansub,
                },
            )
            .map_err(ctx.at(Stage::RefinedFit))?;
        let table = self
            .solve(ctx, &combined, CalMode::Phase, 1, GainType::T, &gains)
            .map_err(ctx.at(Stage::SolvePhase1))?;
        gains.push(table);
        let table = self
            .solve(ctx, &combined, CalMode::AmpPhase, 1, GainType::T, &gains)
            .map_err(ctx.at(Stage::SolveAmpPhase1))?;
        gains.push(table);

        let mut spw_fits = Vec::with_capacity(ctx.spws.len());
        for &spw in ctx.spws {
            let fits = self
                .per_spw(ctx, spw, &round0)
                .map_err(ctx.at(Stage::PerSpwApply))?;
            spw_fits.push(fits);
        }

        info!("Finished self-calibrating {}", ctx.field);
        Ok(FieldOutcome {
            field: ctx.field.to_string(),
            combined,
            initial_fit,
            refined_fit,
            gains,
            spw_fits,
        })
    }

    fn plan_only(&self) -> bool {
        self.options.plan_only
    }

    fn run(&self, task: Task) -> Result<(), StageError> {
        execute(self.toolkit, &task, self.plan_only())?;
        Ok(())
    }

    fn listobs(&self, vis: &Path) -> Result<(), StageError> {
        self.run(Task::Listobs {
            vis: vis.to_path_buf(),
            listfile: self.paths.listobs(vis),
        })
    }

    /// Remove a subset along with its flag backups and summary.
    fn remove_subset(&self, vis: &Path) -> Result<(), StageError> {
        if self.plan_only() {
            info!("[plan] remove {}", vis.display());
            return Ok(());
        }
        debug!("Removing {}", vis.display());
        remove_path(vis)?;
        remove_path(&self.paths.flag_versions(vis))?;
        remove_path(&self.paths.listobs(vis))?;
        Ok(())
    }

    fn create_dir(&self, dir: &Path) -> Result<(), StageError> {
        if !self.plan_only() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Collapse every science window of the field into a single channel.
    fn average_split(&self, ctx: &FieldContext) -> Result<PathBuf, StageError> {
        let averaged = self.paths.tmp_subset(ctx.field, TmpStage::Averaged);
        let combined_spws = self.paths.tmp_subset(ctx.field, TmpStage::Combined);
        let combined = self.paths.subset(ctx.field, SpwSel::All);
        self.create_dir(&self.paths.calibrated_dir())?;

        self.run(Task::Split(SplitParams {
            vis: self.paths.split_vis(),
            outputvis: averaged.clone(),
            datacolumn: TaskColumn::Corrected,
            spw: Some(ctx.spws.iter().join(",")),
            field: Some(ctx.field.to_string()),
            intent: Some(ON_SOURCE.to_string()),
            width: Some(AVERAGE_ALL_CHANNELS),
            keepflags: false,
        }))?;
        self.listobs(&averaged)?;

        self.run(Task::Mstransform(MstransformParams {
            vis: averaged.clone(),
            outputvis: combined_spws.clone(),
            datacolumn: TaskColumn::All,
            spw: None,
            field: Some(ctx.field.to_string()),
            intent: None,
            keepflags: false,
            reindex: true,
            combinespws: true,
        }))?;
        self.listobs(&combined_spws)?;

        if self.plan_only() {
            info!(
                "[plan] average {} again if it has more than one channel",
                combined_spws.display()
            );
        } else if self.toolkit.num_channels(&combined_spws)? > 1 {
            self.run(Task::Split(SplitParams {
                vis: combined_spws.clone(),
                outputvis: combined.clone(),
                datacolumn: TaskColumn::All,
                spw: None,
                field: Some(ctx.field.to_string()),
                intent: Some(ON_SOURCE.to_string()),
                width: Some(AVERAGE_ALL_CHANNELS),
                keepflags: false,
            }))?;
        } else {
            debug!(
                "{} already has a single channel; keeping it",
                combined_spws.display()
            );
            remove_path(&combined)?;
            remove_path(&self.paths.flag_versions(&combined))?;
            fs::rename(&combined_spws, &combined)?;
        }
        self.listobs(&combined)?;

        self.remove_subset(&averaged)?;
        self.remove_subset(&combined_spws)?;
        Ok(combined)
    }

    /// Fit a point source to `subset`. The result is checked before anyone
    /// relies on it.
    fn fit(
        &self,
        ctx: &FieldContext,
        subset: &Path,
        spw: SpwSel,
        column: DataColumn,
        intent: FitIntent,
    ) -> Result<PathBuf, StageError> {
        let outfile = self.paths.fit_result(ctx.field, spw, Some(intent));
        let params = UvFitParams::point_source(
            subset,
            column,
            ctx.dish_diameter,
            self.options.fit_workers,
            spw == SpwSel::All,
            &outfile,
        );
        execute_fit(self.fitter, &params, self.plan_only())?;
        if !self.plan_only() {
            let fit = FitResult::read(&outfile)?;
            debug!(
                "{}: {} rows, mean flux {:.4} Jy",
                outfile.display(),
                fit.len(),
                fit.mean_flux()
            );
        }
        Ok(outfile)
    }

    /// Fit the combined subset and write the fitted model back into it.
    fn fit_and_model(
        &self,
        ctx: &FieldContext,
        combined: &Path,
        intent: FitIntent,
        opts: FluxModelOptions,
    ) -> Result<PathBuf, StageError> {
        if intent == FitIntent::NoSelfCal {
            // The model column must exist before it can be written.
            self.run(Task::Clearcal {
                vis: combined.to_path_buf(),
                addmodel: true,
            })?;
        }
        let fit_result = self.fit(ctx, combined, SpwSel::All, opts.data_column, intent)?;
        if self.plan_only() {
            info!("[plan] model {} from {}", combined.display(), fit_result.display());
        } else {
            let summary = flux::extract(self.store, combined, &fit_result, opts)?;
            info!(
                "{} {intent} flux: {:.4} Jy",
                ctx.field,
                summary.spectrum.mean().unwrap_or(0.0)
            );
        }
        Ok(fit_result)
    }

    fn solve(
        &self,
        ctx: &FieldContext,
        combined: &Path,
        mode: CalMode,
        round: u8,
        gaintype: GainType,
        prior: &GainChain,
    ) -> Result<GainTable, StageError> {
        let caltable = self.paths.gain_table(ctx.field, SpwSel::All, mode, round);
        self.create_dir(&self.paths.caltables_dir())?;
        let (solint, solnorm) = match mode {
            CalMode::Phase => (&self.options.phase_solint, false),
            CalMode::AmpPhase => (&self.options.amp_phase_solint, true),
        };
        debug!(
            "Solving {mode}_{round} for {} on top of {} tables",
            ctx.field,
            prior.tables().len()
        );
        self.run(Task::Gaincal(GaincalParams {
            vis: combined.to_path_buf(),
            caltable: caltable.clone(),
            field: "0".to_string(),
            solint: solint.clone(),
            refant: ctx.refant.to_string(),
            gaintype,
            calmode: mode.solver_code().to_string(),
            minsnr: self.options.min_snr,
            gaintable: prior.paths(),
            solnorm,
        }))?;
        Ok(GainTable {
            path: caltable,
            mode,
            round,
        })
    }

    fn apply(&self, vis: &Path, tables: &GainChain) -> Result<(), StageError> {
        self.run(Task::Applycal(ApplycalParams {
            vis: vis.to_path_buf(),
            gaintable: tables.paths(),
            interp: "linear".to_string(),
            flagbackup: false,
            applymode: "calflag".to_string(),
            calwt: false,
        }))
    }

    /// Split one window at full resolution and fit it channel by channel,
    /// before and after applying the round-0 gains.
    fn per_spw(
        &self,
        ctx: &FieldContext,
        spw: SpwId,
        round0: &GainChain,
    ) -> Result<SpwFits, StageError> {
        let sel = SpwSel::Id(spw);
        let subset = self.paths.subset(ctx.field, sel);
        self.create_dir(&self.paths.calibrated_dir())?;

        self.run(Task::Mstransform(MstransformParams {
            vis: self.paths.split_vis(),
            outputvis: subset.clone(),
            datacolumn: TaskColumn::Corrected,
            spw: Some(spw.to_string()),
            field: Some(ctx.field.to_string()),
            intent: Some(ON_SOURCE.to_string()),
            keepflags: false,
            reindex: true,
            combinespws: false,
        }))?;
        self.listobs(&subset)?;

        let noselfcal = self.fit(ctx, &subset, sel, DataColumn::Data, FitIntent::NoSelfCal)?;
        self.apply(&subset, round0)?;
        let selfcal = self.fit(ctx, &subset, sel, DataColumn::Corrected, FitIntent::SelfCal)?;

        if self.options.space_save {
            self.remove_subset(&subset)?;
        }
        Ok(SpwFits {
            spw,
            subset,
            noselfcal,
            selfcal,
        })
    }
}
