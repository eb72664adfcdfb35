// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dirty continuum images of the self-calibrated fields.

use std::{fs, path::Path};

use log::{debug, info};

use super::{Pipeline, PipelineError};
use crate::{
    constants::{
        LARGE_DISH_DIAMETER_M, LARGE_DISH_FIELD_ARCSEC, PIXELS_PER_BEAM, SMALL_DISH_FIELD_ARCSEC,
    },
    products::{suffixed, SpwSel},
    toolkit::{execute, remove_path, Task, TaskColumn, TcleanParams, Toolkit},
};

/// Image products exported to FITS; the rest are removed.
const EXPORTED_PRODUCTS: [&str; 3] = [".image", ".image.pbcor", ".psf"];

/// The size and pixel scale of the continuum images.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry {
    /// [pixels]
    pub imsize: u32,
    /// e.g. `0.100arcsec`
    pub cell: String,
}

impl ImageGeometry {
    /// The image size before rounding up to an efficient size. Larger dishes
    /// have a smaller primary beam, so their images cover less sky.
    pub fn unoptimised_size(beam_arcsec: f64, dish_diameter: f64) -> u32 {
        let field = if dish_diameter > LARGE_DISH_DIAMETER_M {
            LARGE_DISH_FIELD_ARCSEC
        } else {
            SMALL_DISH_FIELD_ARCSEC
        };
        (field / beam_arcsec * PIXELS_PER_BEAM) as u32
    }

    pub fn cell(beam_arcsec: f64) -> String {
        format!("{:.3}arcsec", beam_arcsec / PIXELS_PER_BEAM)
    }

    /// Size the images of `vis` from its estimated synthesized beam.
    pub fn for_vis(
        toolkit: &dyn Toolkit,
        vis: &Path,
        dish_diameter: f64,
    ) -> Result<ImageGeometry, PipelineError> {
        let beam = toolkit.synthesized_beam(vis)?;
        if !(beam.is_finite() && beam > 0.0) {
            return Err(PipelineError::BadBeam {
                path: vis.to_path_buf(),
                beam,
            });
        }
        let size = ImageGeometry::unoptimised_size(beam, dish_diameter);
        let imsize = toolkit.optimum_image_size(size)?;
        debug!("Beam {beam} arcsec: {size} px rounded to {imsize} px");
        Ok(ImageGeometry {
            imsize,
            cell: ImageGeometry::cell(beam),
        })
    }
}

impl Pipeline<'_> {
    /// Step 6: image the corrected column of every field's combined subset.
    pub(super) fn image(
        &self,
        fields: &[String],
        geometry: &ImageGeometry,
        plan_only: bool,
    ) -> Result<(), PipelineError> {
        let paths = &self.dataset.paths;
        if !plan_only {
            fs::create_dir_all(paths.images_dir())?;
        }

        for field in fields {
            let vis = paths.subset(field, SpwSel::All);
            if self.options.statwt {
                execute(
                    self.toolkit,
                    &Task::Statwt {
                        vis: vis.clone(),
                        datacolumn: TaskColumn::Corrected,
                    },
                    plan_only,
                )?;
            }

            let imagename = paths.image_base(field);
            info!("Imaging {field}");
            execute(
                self.toolkit,
                &Task::Tclean(TcleanParams {
                    vis,
                    imagename: imagename.clone(),
                    datacolumn: TaskColumn::Corrected,
                    imsize: geometry.imsize,
                    cell: geometry.cell.clone(),
                    weighting: "briggs".to_string(),
                    robust: 0.5,
                    deconvolver: "hogbom".to_string(),
                    gridder: "standard".to_string(),
                    specmode: "mfs".to_string(),
                    threshold: "0mJy".to_string(),
                    niter: 0,
                    nterms: 2,
                    pbcor: true,
                    restoringbeam: "common".to_string(),
                }),
                plan_only,
            )?;

            for ext in EXPORTED_PRODUCTS {
                let image = suffixed(&imagename, ext);
                execute(
                    self.toolkit,
                    &Task::Exportfits {
                        fitsimage: suffixed(&image, ".fits"),
                        imagename: image,
                    },
                    plan_only,
                )?;
            }
            if !plan_only {
                for ext in TcleanParams::PRODUCT_EXTENSIONS {
                    remove_path(&suffixed(&imagename, ext))?;
                }
            }
        }
        Ok(())
    }
}
