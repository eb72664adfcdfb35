// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with locating and unpacking datasets.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnpackError {
    #[error("'{0}' is not an archive name of the form <project>_uid___<session>.asdm.sdm[.tar[.gz]]")]
    BadArchiveName(String),

    #[error("Neither the archive '{archive}' (plain or gzipped) nor an unpacked session directory '{session_dir}' exists. You may need to download the data first.")]
    MissingInput {
        archive: PathBuf,
        session_dir: PathBuf,
    },

    #[error("Couldn't extract '{archive}': {err}")]
    Extract {
        archive: PathBuf,
        err: std::io::Error,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
