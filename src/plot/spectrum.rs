// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Line-to-continuum spectra of the self-calibrated per-channel fits.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::debug;

use super::PlotError;
use crate::{
    constants::{SPECTRUM_CLIP_SIGMA, SPECTRUM_MARKER_RMS, SPECTRUM_YRANGE_RMS},
    flux::FitResult,
};

/// Iterations of the sigma clipping.
const MAX_CLIP_ITERS: usize = 5;

/// Everything drawn on a spectrum plot.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumPlot {
    pub title: String,
    pub freqs_ghz: Vec<f64>,
    /// Flux divided by the fitted continuum.
    pub ratio: Vec<f64>,
    /// Channels excluded from the continuum fit.
    pub clipped: Vec<bool>,
    /// Scatter of the unclipped ratio.
    pub rms: f64,
    /// Height of the markers above clipped channels.
    pub marker_level: f64,
    pub y_range: (f64, f64),
}

fn median(values: &[f64]) -> f64 {
    let sorted: Vec<f64> = values.iter().copied().sorted_by(|a, b| a.total_cmp(b)).collect();
    let n = sorted.len();
    if n == 0 {
        f64::NAN
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Iteratively flag values further than `sigma` standard deviations from the
/// median of the values still unflagged. Returns the flags.
pub fn sigma_clip(values: &[f64], sigma: f64, max_iters: usize) -> Vec<bool> {
    let mut clipped: Vec<bool> = values.iter().map(|v| !v.is_finite()).collect();
    for _ in 0..max_iters {
        let kept: Vec<f64> = values
            .iter()
            .zip(&clipped)
            .filter(|&(_, &c)| !c)
            .map(|(&v, _)| v)
            .collect();
        if kept.is_empty() {
            break;
        }
        let centre = median(&kept);
        let limit = sigma * std_dev(&kept);

        let mut changed = false;
        for (v, c) in values.iter().zip(clipped.iter_mut()) {
            if !*c && (v - centre).abs() > limit {
                *c = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    clipped
}

/// Least-squares straight line through the points; (slope, intercept).
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len() as f64;
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx.abs() < f64::EPSILON {
        return None;
    }
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

/// The (lower, upper) edge of every channel, halfway to its neighbours.
pub fn channel_edges(xs: &[f64]) -> Vec<(f64, f64)> {
    let n = xs.len();
    (0..n)
        .map(|i| {
            let lower = match i {
                0 if n > 1 => xs[0] - (xs[1] - xs[0]) / 2.0,
                0 => xs[0],
                _ => (xs[i - 1] + xs[i]) / 2.0,
            };
            let upper = match i {
                _ if i + 1 < n => (xs[i] + xs[i + 1]) / 2.0,
                _ if n > 1 => xs[i] + (xs[i] - xs[i - 1]) / 2.0,
                _ => xs[i],
            };
            (lower, upper)
        })
        .collect()
}

/// Vertices of a step line centred on each channel.
pub fn step_line(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    channel_edges(xs)
        .into_iter()
        .zip(ys)
        .flat_map(|((lower, upper), &y)| [(lower, y), (upper, y)])
        .collect()
}

/// Fit a continuum to a per-channel flux spectrum and normalise by it.
pub fn analyse(title: &str, fit: &FitResult) -> Result<SpectrumPlot, PlotError> {
    let freqs_ghz: Vec<f64> = fit.freqs().into_iter().map(|f| f / 1e9).collect();
    let fluxes = fit.fluxes();
    let clipped = sigma_clip(&fluxes, SPECTRUM_CLIP_SIGMA, MAX_CLIP_ITERS);

    let (kept_freqs, kept_fluxes): (Vec<f64>, Vec<f64>) = freqs_ghz
        .iter()
        .zip(&fluxes)
        .zip(&clipped)
        .filter(|&(_, &c)| !c)
        .map(|((&f, &s), _)| (f, s))
        .unzip();
    let (slope, intercept) = linear_fit(&kept_freqs, &kept_fluxes)
        .ok_or_else(|| PlotError::TooFewChannels(title.to_string()))?;

    let continuum: Vec<f64> = freqs_ghz.iter().map(|f| slope * f + intercept).collect();
    if continuum.iter().any(|c| c.abs() < f64::EPSILON) {
        return Err(PlotError::ZeroContinuum(title.to_string()));
    }
    let ratio: Vec<f64> = fluxes
        .iter()
        .zip(&continuum)
        .map(|(s, c)| s / c)
        .collect();

    let kept_ratio: Vec<f64> = ratio
        .iter()
        .zip(&clipped)
        .filter(|&(_, &c)| !c)
        .map(|(&r, _)| r)
        .collect();
    let rms = std_dev(&kept_ratio);
    let kept_max = kept_ratio.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (min, max) = ratio
        .iter()
        .copied()
        .filter(|r| r.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r), hi.max(r))
        });
    debug!(
        "{title}: continuum {slope:.4} Jy/GHz * f + {intercept:.4} Jy, {} of {} channels clipped, rms {rms:.4}",
        clipped.iter().filter(|&&c| c).count(),
        clipped.len()
    );

    Ok(SpectrumPlot {
        title: title.to_string(),
        freqs_ghz,
        ratio,
        clipped,
        rms,
        marker_level: kept_max + SPECTRUM_MARKER_RMS * rms,
        y_range: (
            min - SPECTRUM_YRANGE_RMS * rms,
            max + SPECTRUM_YRANGE_RMS * rms,
        ),
    })
}

/// Read a fit result and draw its spectrum to each of `outputs`.
pub fn plot_fit_result(title: &str, fit_result: &Path, outputs: &[PathBuf]) -> Result<(), PlotError> {
    let fit = FitResult::read(fit_result)?;
    let plot = analyse(title, &fit)?;
    draw_spectrum_plot(&plot, outputs)
}

#[cfg(feature = "plotting")]
pub fn draw_spectrum_plot(plot: &SpectrumPlot, outputs: &[PathBuf]) -> Result<(), PlotError> {
    for output in outputs {
        super::draw::spectrum(plot, output)?;
    }
    Ok(())
}

#[cfg(not(feature = "plotting"))]
pub fn draw_spectrum_plot(_: &SpectrumPlot, _: &[PathBuf]) -> Result<(), PlotError> {
    Err(PlotError::NoPlottingFeature)
}
