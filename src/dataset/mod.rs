// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Locating observatory archives and unpacking them into a working directory.
//!
//! An archive named `<project>_uid___<session>.asdm.sdm.tar[.gz]` is moved
//! into a directory named after its session (`uid___<session>`) and extracted
//! there. That directory is the root of every product of the dataset.

mod error;
#[cfg(test)]
mod tests;

pub use error::UnpackError;

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use log::{debug, info};
use regex::Regex;

use crate::products::{suffixed, ProductPaths};

lazy_static::lazy_static! {
    static ref ARCHIVE_NAME_REGEX: Regex =
        Regex::new(r"^(?P<project>.+?)_(?P<session>uid___.+?)\.asdm\.sdm(?:\.tar(?:\.gz)?)?$").unwrap();
}

/// The identifiers encoded in an archive filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    /// e.g. `2019.1.01234.S`
    pub project_id: String,
    /// e.g. `uid___A002_Xe1f219_X6d0`
    pub session: String,
}

impl ArchiveName {
    /// Parse an archive filename (not a path). The `.tar` and `.gz` suffixes
    /// are optional.
    pub fn parse(file_name: &str) -> Result<ArchiveName, UnpackError> {
        let caps = ARCHIVE_NAME_REGEX
            .captures(file_name)
            .ok_or_else(|| UnpackError::BadArchiveName(file_name.to_string()))?;
        Ok(ArchiveName {
            project_id: caps["project"].to_string(),
            session: caps["session"].to_string(),
        })
    }

    /// Parse the filename part of a path.
    pub fn from_path(archive: &Path) -> Result<ArchiveName, UnpackError> {
        let file_name = archive
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| UnpackError::BadArchiveName(archive.display().to_string()))?;
        ArchiveName::parse(file_name)
    }
}

/// A located dataset: its identifiers and the names of its products.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub archive: ArchiveName,
    pub paths: ProductPaths,
}

impl Dataset {
    /// Resolve an archive to a dataset without touching the filesystem. If
    /// `working_dir` isn't given, the archive's directory is used. Product
    /// paths are always absolute, as external tools run inside the session
    /// directory.
    pub fn locate(archive: &Path, working_dir: Option<&Path>) -> Result<Dataset, UnpackError> {
        let name = ArchiveName::from_path(archive)?;
        let working_dir = match working_dir {
            Some(w) => w.to_path_buf(),
            None => match archive.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            },
        };
        let working_dir = if working_dir.is_absolute() {
            working_dir
        } else {
            std::env::current_dir()?.join(working_dir)
        };
        let paths = ProductPaths::new(&working_dir, &name);
        Ok(Dataset {
            archive: name,
            paths,
        })
    }

    /// Guarantee that the session directory exists and holds the extracted
    /// archive.
    ///
    /// A plain or gzipped archive found next to the session directory is
    /// moved into it. A gzipped archive is decompressed before extraction.
    /// Extraction is skipped when the project tree already exists, so calling
    /// this twice leaves the directory untouched.
    pub fn unpack(&self) -> Result<(), UnpackError> {
        let root = self.paths.root();
        let working_dir = root.parent().unwrap_or_else(|| Path::new("."));
        let file_name = self.paths.archive_file_name();
        let plain = working_dir.join(&file_name);
        let gzipped = suffixed(&plain, ".gz");
        let plain_in_root = self.paths.archive();
        let gzipped_in_root = suffixed(&plain_in_root, ".gz");

        if plain.exists() {
            debug!("Moving {} into {}", plain.display(), root.display());
            fs::create_dir_all(root)?;
            fs::rename(&plain, &plain_in_root)?;
        } else if gzipped.exists() {
            debug!("Moving {} into {}", gzipped.display(), root.display());
            fs::create_dir_all(root)?;
            fs::rename(&gzipped, &gzipped_in_root)?;
        } else if !root.is_dir() {
            return Err(UnpackError::MissingInput {
                archive: plain,
                session_dir: root.to_path_buf(),
            });
        }

        let project_dir = self.paths.project_dir();
        if project_dir.is_dir() {
            info!(
                "{} is already unpacked; not extracting again",
                project_dir.display()
            );
            return Ok(());
        }

        if !plain_in_root.exists() && gzipped_in_root.exists() {
            gunzip(&gzipped_in_root, &plain_in_root)?;
        }
        if !plain_in_root.exists() {
            return Err(UnpackError::MissingInput {
                archive: plain,
                session_dir: root.to_path_buf(),
            });
        }

        info!("Extracting {}", plain_in_root.display());
        let mut archive = tar::Archive::new(BufReader::new(File::open(&plain_in_root)?));
        archive
            .unpack(root)
            .map_err(|err| UnpackError::Extract {
                archive: plain_in_root.clone(),
                err,
            })?;
        Ok(())
    }
}

/// Decompress `gz` into `out` and remove `gz`, as `gzip -d` would.
fn gunzip(gz: &Path, out: &Path) -> Result<(), UnpackError> {
    debug!("Decompressing {}", gz.display());
    let mut decoder = GzDecoder::new(BufReader::new(File::open(gz)?));
    let mut writer = BufWriter::new(File::create(out)?);
    if let Err(err) = std::io::copy(&mut decoder, &mut writer).and_then(|_| writer.flush()) {
        drop(writer);
        // Don't leave a truncated archive behind; it would be picked up next
        // time.
        fs::remove_file(out)?;
        return Err(UnpackError::Extract {
            archive: gz.to_path_buf(),
            err,
        });
    }
    drop(writer);
    fs::remove_file(gz)?;
    Ok(())
}
