// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Space saving: removing intermediate products and packing up the results.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use flate2::{write::GzEncoder, Compression};
use log::{debug, info, warn};

use super::{Pipeline, PipelineError};
use crate::{
    glob::glob_in,
    products::{suffixed, SpwSel},
    toolkit::{execute, remove_path, MstransformParams, Task, TaskColumn},
};

/// Remove `path`, or only say so in plan-only mode.
fn discard(path: &Path, plan_only: bool) -> Result<(), std::io::Error> {
    if plan_only {
        info!("[plan] remove {}", path.display());
        return Ok(());
    }
    if fs::symlink_metadata(path).is_ok() {
        debug!("Removing {}", path.display());
    }
    remove_path(path)
}

/// The final path component, escaped for use in a glob pattern.
fn escaped_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    glob::Pattern::escape(&name)
}

/// gzip `path` (quickly) to `<path>.gz`, removing the original.
fn gzip_file(path: &Path) -> Result<PathBuf, std::io::Error> {
    let out = suffixed(path, ".gz");
    info!("Compressing {}", path.display());
    let mut reader = BufReader::new(File::open(path)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(&out)?), Compression::fast());
    std::io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()?;
    fs::remove_file(path)?;
    Ok(out)
}

/// Pack `dir` into the gzipped tarball `archive`, under the directory's own
/// name.
fn pack_dir(dir: &Path, archive: &Path) -> Result<(), std::io::Error> {
    info!("Packing {} into {}", dir.display(), archive.display());
    let name = dir.file_name().map(PathBuf::from).unwrap_or_default();
    let encoder = GzEncoder::new(BufWriter::new(File::create(archive)?), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(name, dir)?;
    builder.into_inner()?.finish()?.flush()?;
    Ok(())
}

impl Pipeline<'_> {
    /// After calibration, only the calibrated calibrator visibilities are
    /// needed.
    pub(super) fn early_space_save(&self, plan_only: bool) -> Result<(), PipelineError> {
        let paths = &self.dataset.paths;
        let root = paths.root();
        let vis = paths.vis();
        let ms = escaped_name(&vis);

        let mut doomed = vec![
            vis.clone(),
            paths.vis_org(),
            paths.flag_versions(&vis),
            suffixed(&vis, ".tsys"),
        ];
        for pattern in [
            format!("{ms}.wvr*"),
            format!("{ms}.*.png"),
            format!("{ms}.split.*"),
            "*.asdm.sdm".to_string(),
        ] {
            doomed.extend(glob_in(root, &pattern)?);
        }
        doomed.push(paths.project_dir());

        for path in doomed {
            discard(&path, plan_only)?;
        }
        Ok(())
    }

    /// Step 7: keep the residuals of the combined subsets, the logs and the
    /// products; optionally compress what's left.
    pub(super) fn final_space_save(
        &self,
        fields: &[String],
        plan_only: bool,
    ) -> Result<(), PipelineError> {
        let paths = &self.dataset.paths;
        let root = paths.root();

        let mut doomed = glob_in(root, "*.last")?;
        doomed.push(root.join("byspw"));
        doomed.extend(glob_in(root, &format!("{}*", glob::Pattern::escape(paths.session())))?);
        doomed.push(paths.project_dir());
        for path in doomed {
            discard(&path, plan_only)?;
        }

        for field in fields {
            let subset = paths.subset(field, SpwSel::All);
            let residual = paths.residual_subset(field);
            execute(
                self.toolkit,
                &Task::Mstransform(MstransformParams {
                    vis: subset.clone(),
                    outputvis: residual.clone(),
                    datacolumn: TaskColumn::Corrected,
                    spw: None,
                    field: None,
                    intent: None,
                    keepflags: true,
                    reindex: true,
                    combinespws: false,
                }),
                plan_only,
            )?;
            execute(
                self.toolkit,
                &Task::Listobs {
                    listfile: paths.listobs(&residual),
                    vis: residual,
                },
                plan_only,
            )?;
            discard(&subset, plan_only)?;
            discard(&paths.listobs(&subset), plan_only)?;
        }

        self.collect_logs(plan_only)?;
        // The toolkit exchanges requests through here.
        discard(&paths.tempfiles_dir(), plan_only)?;

        if self.options.gzip {
            match glob_in(root, "*.tar")?.first() {
                Some(tar) if !plan_only => {
                    gzip_file(tar)?;
                }
                Some(tar) => info!("[plan] compress {}", tar.display()),
                None => warn!("No archive in {} to compress", root.display()),
            }

            let calibrated = paths.calibrated_dir();
            let archive = paths.calibrated_archive();
            discard(&archive, plan_only)?;
            if plan_only {
                info!("[plan] pack {} into {}", calibrated.display(), archive.display());
            } else {
                pack_dir(&calibrated, &archive)?;
            }
            discard(&calibrated, plan_only)?;
        }
        Ok(())
    }

    /// Toolkit logs, listobs summaries and the archive's logs in the working
    /// directory's `log` go to the dataset's log directory.
    fn collect_logs(&self, plan_only: bool) -> Result<(), PipelineError> {
        let paths = &self.dataset.paths;
        let log_dir = paths.log_dir();
        if plan_only {
            info!("[plan] collect logs into {}", log_dir.display());
            return Ok(());
        }
        fs::create_dir_all(&log_dir)?;
        for log in glob_in(paths.root(), "casa-*.log")? {
            if let Some(name) = log.file_name() {
                fs::rename(&log, log_dir.join(name))?;
            }
        }
        for listobs in glob_in(&paths.calibrated_dir(), "*.listobs")? {
            if let Some(name) = listobs.file_name() {
                fs::copy(&listobs, log_dir.join(name))?;
            }
        }
        if let Some(working_dir) = paths.root().parent() {
            let pattern = format!("{}*.log", glob::Pattern::escape(&paths.archive_file_name()));
            for log in glob_in(&working_dir.join("log"), &pattern)? {
                if let Some(name) = log.file_name() {
                    fs::rename(&log, log_dir.join(name))?;
                }
            }
        }
        Ok(())
    }
}
