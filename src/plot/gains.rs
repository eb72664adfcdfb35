// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gain solutions against time.

use std::path::{Path, PathBuf};

use log::debug;
use ndarray::prelude::*;

use super::PlotError;
use crate::{
    selfcal::CalMode,
    store::{read_gain_table, GainSolutions},
};

/// One scatter series of a gain plot.
#[derive(Debug, Clone, PartialEq)]
pub struct GainSeries {
    pub round: u8,
    pub pol: usize,
    /// (minutes since the table's first solution, phase [deg] or amplitude)
    pub points: Vec<(f64, f64)>,
}

/// Everything drawn on the gain plot of one calibration mode.
#[derive(Debug, Clone, PartialEq)]
pub struct GainPlot {
    pub title: String,
    pub mode: CalMode,
    pub series: Vec<GainSeries>,
}

impl GainPlot {
    pub fn y_label(&self) -> &'static str {
        match self.mode {
            CalMode::Phase => "Gain phase [deg]",
            CalMode::AmpPhase => "Gain amplitude",
        }
    }

    /// The (x, y) extent of every series.
    pub fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let mut points = self.series.iter().flat_map(|s| s.points.iter());
        let &(x, y) = points.next()?;
        Some(points.fold(((x, x), (y, y)), |((x0, x1), (y0, y1)), &(x, y)| {
            ((x0.min(x), x1.max(x)), (y0.min(y), y1.max(y)))
        }))
    }
}

/// The first-channel gains of `pol` against time.
fn series(sols: &GainSolutions, mode: CalMode, round: u8, pol: usize) -> GainSeries {
    let t0 = sols.times.first().copied().unwrap_or(0.0);
    let points = sols
        .times
        .iter()
        .zip(sols.gains.slice(s![.., 0, pol]).iter())
        .filter(|(_, g)| !(g.re.is_nan() || g.im.is_nan()))
        .map(|(&t, g)| {
            let y = match mode {
                CalMode::Phase => g.arg().to_degrees() as f64,
                CalMode::AmpPhase => g.norm() as f64,
            };
            ((t - t0) / 60.0, y)
        })
        .collect();
    GainSeries { round, pol, points }
}

/// The round-0 gains in every polarisation (phase only, since the amplitude
/// solutions are polarisation-independent) and the round-1 gains in the first.
pub fn gain_plot(
    title: &str,
    mode: CalMode,
    round0: &GainSolutions,
    round1: &GainSolutions,
) -> Result<GainPlot, PlotError> {
    for sols in [round0, round1] {
        if sols.gains.is_empty() {
            return Err(PlotError::NoSolutions(sols.path.display().to_string()));
        }
    }

    let round0_pols = match mode {
        CalMode::Phase => round0.gains.len_of(Axis(2)).min(2),
        CalMode::AmpPhase => 1,
    };
    let mut plot_series: Vec<GainSeries> = (0..round0_pols)
        .map(|pol| series(round0, mode, 0, pol))
        .collect();
    plot_series.push(series(round1, mode, 1, 0));
    Ok(GainPlot {
        title: title.to_string(),
        mode,
        series: plot_series,
    })
}

/// Read the tables of both rounds and draw their gains to each of `outputs`.
pub fn plot_gain_tables(
    title: &str,
    mode: CalMode,
    table0: &Path,
    table1: &Path,
    outputs: &[PathBuf],
) -> Result<(), PlotError> {
    let round0 = read_gain_table(table0)?;
    let round1 = read_gain_table(table1)?;
    let plot = gain_plot(title, mode, &round0, &round1)?;
    debug!(
        "Gain plot {title} ({mode}): {} series",
        plot.series.len()
    );
    draw_gain_plot(&plot, outputs)
}

#[cfg(feature = "plotting")]
pub fn draw_gain_plot(plot: &GainPlot, outputs: &[PathBuf]) -> Result<(), PlotError> {
    for output in outputs {
        super::draw::gains(plot, output)?;
    }
    Ok(())
}

#[cfg(not(feature = "plotting"))]
pub fn draw_gain_plot(_: &GainPlot, _: &[PathBuf]) -> Result<(), PlotError> {
    Err(PlotError::NoPlottingFeature)
}
