// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions to glob files.

use std::path::{Path, PathBuf};

use glob::glob;
use thiserror::Error;

/// Given a glob pattern, get all of the matches from the filesystem. Matches
/// are sorted.
pub(crate) fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobCrate(e)),
        }
    }
    entries.sort();
    Ok(entries)
}

/// The same as `get_all_matches_from_glob`, but only a single result is
/// expected to be returned from the glob match. If there are no results, or
/// more than one, an error is returned.
pub(crate) fn get_single_match_from_glob(g: &str) -> Result<PathBuf, GlobError> {
    let entries = get_all_matches_from_glob(g)?;
    match entries.as_slice() {
        [] => Err(GlobError::NoMatches {
            glob: g.to_string(),
        }),
        [e] => Ok(e.clone()),
        _ => Err(GlobError::MoreThanOneMatch {
            glob: g.to_string(),
        }),
    }
}

/// Glob relative to a directory. The directory itself is escaped so that
/// special characters in it aren't treated as patterns.
pub(crate) fn glob_in(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, GlobError> {
    let dir = glob::Pattern::escape(&dir.display().to_string());
    get_all_matches_from_glob(&format!("{dir}/{pattern}"))
}

/// [`get_single_match_from_glob`], relative to a directory.
pub(crate) fn single_match_in(dir: &Path, pattern: &str) -> Result<PathBuf, GlobError> {
    let dir = glob::Pattern::escape(&dir.display().to_string());
    get_single_match_from_glob(&format!("{dir}/{pattern}"))
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error("No glob matches were found for {glob}")]
    NoMatches { glob: String },

    #[error("More than one glob matches were found for {glob}; we require only one match")]
    MoreThanOneMatch { glob: String },

    #[error(transparent)]
    GlobCrate(#[from] glob::GlobError),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),
}
