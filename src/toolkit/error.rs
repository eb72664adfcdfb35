// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors from the external toolkit boundary.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("The toolkit command is empty")]
    EmptyCommand,

    #[error("Couldn't start '{cmd}': {err}")]
    Spawn { cmd: String, err: std::io::Error },

    #[error("'{cmd}' exited with {status}:\n{stderr}")]
    ExitStatus {
        cmd: String,
        status: String,
        stderr: String,
    },

    #[error("The toolkit didn't write a response to {0}")]
    MissingResponse(PathBuf),

    #[error("Couldn't decode the toolkit response {path}: {err}")]
    BadResponse {
        path: PathBuf,
        err: serde_json::Error,
    },

    #[error("The toolkit bridge speaks protocol version {got}, but version {expected} is required")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("Toolkit task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error("Toolkit query '{query}' failed: {message}")]
    QueryFailed { query: String, message: String },

    #[error("Toolkit query '{query}' returned an unexpected value: {err}")]
    BadQueryValue {
        query: String,
        err: serde_json::Error,
    },

    #[error("Toolkit query '{query}' returned nothing")]
    EmptyQueryValue { query: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
