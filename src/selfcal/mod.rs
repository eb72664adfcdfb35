// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Self-calibration of calibrator fields against a point-source model.
//!
//! Each field runs through the same fixed sequence of [`Stage`]s. Round 0
//! fits the uncalibrated band-averaged data and solves phase-only then
//! amplitude+phase gains, which are applied before the round-1 fit. Round 1
//! solves again on top of every earlier table. Finally each spectral window
//! is split at full resolution and fitted channel by channel before and after
//! applying the round-0 gains.

mod engine;
mod error;
#[cfg(test)]
mod tests;

pub use engine::{FieldOutcome, SelfCalEngine, SpwFits};
pub use error::{SelfCalError, StageError};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    constants::{
        DEFAULT_AMP_PHASE_SOLINT, DEFAULT_FIT_WORKERS, DEFAULT_MIN_SNR, DEFAULT_PHASE_SOLINT,
    },
    products::SpwId,
};

/// What a gain table corrects.
#[derive(
    Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum CalMode {
    #[strum(serialize = "phase")]
    Phase,

    #[strum(serialize = "amp_phase")]
    AmpPhase,
}

impl CalMode {
    /// The toolkit's name for this mode.
    pub fn solver_code(self) -> &'static str {
        match self {
            CalMode::Phase => "p",
            CalMode::AmpPhase => "ap",
        }
    }
}

/// A solved gain table. Later rounds write new tables rather than modifying
/// old ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GainTable {
    pub path: PathBuf,
    pub mode: CalMode,
    /// 0 for the initial round, 1 for the refinement.
    pub round: u8,
}

/// Gain tables in the order they were solved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GainChain(Vec<GainTable>);

impl GainChain {
    pub fn push(&mut self, table: GainTable) {
        self.0.push(table);
    }

    pub fn tables(&self) -> &[GainTable] {
        &self.0
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.0.iter().map(|t| t.path.clone()).collect()
    }

    /// The tables of a single round.
    pub fn round(&self, round: u8) -> GainChain {
        GainChain(self.0.iter().filter(|t| t.round == round).cloned().collect())
    }
}

/// The steps of self-calibrating one field, in order.
#[derive(Debug, Display, EnumIter, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    AverageSplit,
    InitialFit,
    SolvePhase0,
    SolveAmpPhase0,
    Apply0,
    RefinedFit,
    SolvePhase1,
    SolveAmpPhase1,
    PerSpwApply,
}

/// Knobs of the self-calibration engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfCalOptions {
    /// Workers handed to the UV fitter.
    pub fit_workers: usize,
    pub min_snr: f64,
    pub phase_solint: String,
    pub amp_phase_solint: String,
    /// Model every channel with the mean flux.
    pub meansub: bool,
    /// Remove the per-spw subsets once they're fitted.
    pub space_save: bool,
    /// Log the stages without running them.
    pub plan_only: bool,
}

impl Default for SelfCalOptions {
    fn default() -> Self {
        SelfCalOptions {
            fit_workers: DEFAULT_FIT_WORKERS,
            min_snr: DEFAULT_MIN_SNR,
            phase_solint: DEFAULT_PHASE_SOLINT.to_string(),
            amp_phase_solint: DEFAULT_AMP_PHASE_SOLINT.to_string(),
            meansub: false,
            space_save: false,
            plan_only: false,
        }
    }
}

/// Everything a stage needs to know about the field it works on.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub field: &'a str,
    /// The reference antenna of every gain solve.
    pub refant: &'a str,
    /// Dish diameter of the reference antenna [metres].
    pub dish_diameter: f64,
    pub spws: &'a [SpwId],
}

impl<'a> FieldContext<'a> {
    fn at(&self, stage: Stage) -> impl Fn(StageError) -> SelfCalError + 'a {
        let field = self.field;
        move |err| SelfCalError {
            field: field.to_string(),
            stage,
            err,
        }
    }
}
