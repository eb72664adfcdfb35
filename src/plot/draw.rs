// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Drawing with plotters. The output format follows the file extension.

use std::path::{Path, PathBuf};

use plotters::{coord::Shift, prelude::*};
use thiserror::Error;

use super::{
    gains::GainPlot,
    spectrum::{channel_edges, step_line, SpectrumPlot},
};

const X_PIXELS: u32 = 1200;
const Y_PIXELS: u32 = 900;

/// Fraction of the data range added around each axis.
const MARGIN_FRACTION: f64 = 0.05;

fn is_svg(output: &Path) -> bool {
    output
        .extension()
        .map(|e| e.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}

/// Widen a (possibly empty) range so that plotters can draw it.
fn padded(lo: f64, hi: f64) -> std::ops::Range<f64> {
    let span = hi - lo;
    if span.abs() < f64::EPSILON || !span.is_finite() {
        let half = if lo.abs() > 0.0 { lo.abs() * 0.1 } else { 1.0 };
        return (lo - half)..(lo + half);
    }
    let pad = span * MARGIN_FRACTION;
    (lo - pad)..(hi + pad)
}

pub(super) fn gains(plot: &GainPlot, output: &Path) -> Result<(), DrawError> {
    let result = if is_svg(output) {
        draw_gains(
            SVGBackend::new(output, (X_PIXELS, Y_PIXELS)).into_drawing_area(),
            plot,
        )
    } else {
        draw_gains(
            BitMapBackend::new(output, (X_PIXELS, Y_PIXELS)).into_drawing_area(),
            plot,
        )
    };
    result.map_err(|message| DrawError::Gains {
        path: output.to_path_buf(),
        message,
    })
}

pub(super) fn spectrum(plot: &SpectrumPlot, output: &Path) -> Result<(), DrawError> {
    let result = if is_svg(output) {
        draw_spectrum(
            SVGBackend::new(output, (X_PIXELS, Y_PIXELS)).into_drawing_area(),
            plot,
        )
    } else {
        draw_spectrum(
            BitMapBackend::new(output, (X_PIXELS, Y_PIXELS)).into_drawing_area(),
            plot,
        )
    };
    result.map_err(|message| DrawError::Spectrum {
        path: output.to_path_buf(),
        message,
    })
}

fn draw_gains<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    plot: &GainPlot,
) -> Result<(), String> {
    root.fill(&WHITE).map_err(|e| e.to_string())?;
    let ((x0, x1), (y0, y1)) = plot.bounds().unwrap_or(((0.0, 1.0), (0.0, 1.0)));

    let mut chart = ChartBuilder::on(&root)
        .caption(&plot.title, ("sans-serif", 30))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(padded(x0, x1), padded(y0, y1))
        .map_err(|e| e.to_string())?;
    chart
        .configure_mesh()
        .light_line_style(&WHITE)
        .x_desc("Time since the first solution [min]")
        .y_desc(plot.y_label())
        .draw()
        .map_err(|e| e.to_string())?;

    for series in &plot.series {
        let (colour, size) = if series.round == 0 {
            (BLUE, 3_u32)
        } else {
            (RED, 2_u32)
        };
        chart
            .draw_series(
                series
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), size, colour.filled())),
            )
            .map_err(|e| e.to_string())?;
    }

    root.present().map_err(|e| e.to_string())?;
    Ok(())
}

fn draw_spectrum<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    plot: &SpectrumPlot,
) -> Result<(), String> {
    root.fill(&WHITE).map_err(|e| e.to_string())?;
    let edges = channel_edges(&plot.freqs_ghz);
    let (x0, x1) = edges
        .iter()
        .flat_map(|&(l, u)| [l, u])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
    let (y0, y1) = plot.y_range;

    let mut chart = ChartBuilder::on(&root)
        .caption(&plot.title, ("sans-serif", 30))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(padded(x0, x1), padded(y0, y1))
        .map_err(|e| e.to_string())?;
    chart
        .configure_mesh()
        .light_line_style(&WHITE)
        .x_desc("frequency [GHz]")
        .y_desc("line/continuum")
        .draw()
        .map_err(|e| e.to_string())?;

    chart
        .draw_series(LineSeries::new(
            step_line(&plot.freqs_ghz, &plot.ratio),
            &BLUE,
        ))
        .map_err(|e| e.to_string())?;

    for (&(lower, upper), _) in edges.iter().zip(&plot.clipped).filter(|&(_, &c)| c) {
        chart
            .draw_series(LineSeries::new(
                [(lower, plot.marker_level), (upper, plot.marker_level)],
                RED.stroke_width(5),
            ))
            .map_err(|e| e.to_string())?;
    }

    root.present().map_err(|e| e.to_string())?;
    Ok(())
}

#[derive(Error, Debug)]
pub enum DrawError {
    #[error("While drawing gains to {path}: {message}")]
    Gains { path: PathBuf, message: String },

    #[error("While drawing a spectrum to {path}: {message}")]
    Spectrum { path: PathBuf, message: String },
}
