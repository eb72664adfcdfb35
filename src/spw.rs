// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The science spectral windows of a dataset.
//!
//! Windows are asked of the toolkit and written to a cache inside the
//! dataset's working directory. If the toolkit can't answer (e.g. the
//! visibilities were removed by an earlier space-saving run), the cache is
//! used instead.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    products::{ProductPaths, SpwId},
    toolkit::{Toolkit, ToolkitError},
};

/// Where the windows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpwSource {
    Toolkit,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SpwCache {
    /// The session the windows belong to.
    session: String,
    spws: Vec<SpwId>,
}

#[derive(Error, Debug)]
pub enum SpwRegistryError {
    #[error("Couldn't discover the spectral windows of {vis} ({discovery}), and there is no cache at {cache}")]
    NoCache {
        vis: PathBuf,
        cache: PathBuf,
        discovery: ToolkitError,
    },

    #[error("The spectral window cache {path} belongs to session {got}, not {expected}")]
    ForeignCache {
        path: PathBuf,
        expected: String,
        got: String,
    },

    #[error("The spectral window cache {path} is unreadable: {err}")]
    BadCache {
        path: PathBuf,
        err: serde_json::Error,
    },

    #[error("The toolkit reported no science spectral windows for {0}")]
    NoSpws(PathBuf),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// Discover the science windows of `vis`, falling back to the cache.
pub fn discover(
    toolkit: &dyn Toolkit,
    paths: &ProductPaths,
    vis: &Path,
) -> Result<(Vec<SpwId>, SpwSource), SpwRegistryError> {
    let cache = paths.spw_cache();
    match toolkit.science_spws(vis) {
        Ok(spws) => {
            if spws.is_empty() {
                return Err(SpwRegistryError::NoSpws(vis.to_path_buf()));
            }
            write_cache(&cache, paths.session(), &spws)?;
            info!("Science spectral windows: {spws:?}");
            Ok((spws, SpwSource::Toolkit))
        }

        Err(discovery) if cache.exists() => {
            warn!("Couldn't discover the spectral windows of {}: {discovery}", vis.display());
            let spws = read_cache(&cache, paths.session())?;
            warn!("Using the cached spectral windows {spws:?} from {}", cache.display());
            Ok((spws, SpwSource::Cache))
        }

        Err(discovery) => Err(SpwRegistryError::NoCache {
            vis: vis.to_path_buf(),
            cache,
            discovery,
        }),
    }
}

fn write_cache(path: &Path, session: &str, spws: &[SpwId]) -> Result<(), SpwRegistryError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let cache = SpwCache {
        session: session.to_string(),
        spws: spws.to_vec(),
    };
    let contents = serde_json::to_string_pretty(&cache).map_err(|err| {
        SpwRegistryError::BadCache {
            path: path.to_path_buf(),
            err,
        }
    })?;
    fs::write(path, contents)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// The cached windows of `session`.
pub fn read_cache(path: &Path, session: &str) -> Result<Vec<SpwId>, SpwRegistryError> {
    let contents = fs::read(path)?;
    let cache: SpwCache =
        serde_json::from_slice(&contents).map_err(|err| SpwRegistryError::BadCache {
            path: path.to_path_buf(),
            err,
        })?;
    if cache.session != session {
        return Err(SpwRegistryError::ForeignCache {
            path: path.to_path_buf(),
            expected: session.to_string(),
            got: cache.session,
        });
    }
    Ok(cache.spws)
}
