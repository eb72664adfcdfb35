// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Talking to CASA through a small, versioned bridge script.
//!
//! Every call writes a JSON request, runs the configured command on the bridge
//! script with the request and response paths as arguments, and reads the JSON
//! response back. The bridge checks the protocol version before doing
//! anything.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::{Query, Task, Toolkit, ToolkitError, UvFitParams, UvFitter};

/// Bump this whenever the request or response layout changes.
pub const BRIDGE_PROTOCOL_VERSION: u32 = 1;

const BRIDGE_SCRIPT: &str = include_str!("bridge.py");
const BRIDGE_FILE_NAME: &str = "qsocal_bridge.py";

/// Lines of stderr kept when a command fails.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum RequestKind {
    Task,
    Query,
    Fit,
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    version: u32,
    kind: RequestKind,
    body: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    version: u32,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// Runs one external command against the bridge script.
#[derive(Debug)]
pub struct CasaRunner {
    program: String,
    args: Vec<String>,
    /// Commands run here.
    workdir: PathBuf,
    /// Requests, responses and the bridge script live here.
    exchange_dir: PathBuf,
    counter: AtomicUsize,
    /// Serialises (re)writing the bridge script.
    bridge_lock: Mutex<()>,
}

impl CasaRunner {
    /// `command` is split on whitespace, e.g. `casa --nologger --nogui -c`.
    pub fn new(command: &str, workdir: &Path, exchange_dir: &Path) -> Result<CasaRunner, ToolkitError> {
        let mut words = command.split_whitespace().map(|s| s.to_string());
        let program = words.next().ok_or(ToolkitError::EmptyCommand)?;
        Ok(CasaRunner {
            program,
            args: words.collect(),
            workdir: workdir.to_path_buf(),
            exchange_dir: exchange_dir.to_path_buf(),
            counter: AtomicUsize::new(0),
            bridge_lock: Mutex::new(()),
        })
    }

    pub fn command_line(&self) -> String {
        let mut s = self.program.clone();
        for a in &self.args {
            s.push(' ');
            s.push_str(a);
        }
        s
    }

    /// The bridge script, written out again whenever it is missing (space
    /// saving may remove the exchange directory between calls).
    fn bridge(&self) -> Result<PathBuf, ToolkitError> {
        let path = self.exchange_dir.join(BRIDGE_FILE_NAME);
        let _guard = self
            .bridge_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !path.exists() {
            trace!("Writing {}", path.display());
            fs::create_dir_all(&self.exchange_dir)?;
            fs::write(&path, BRIDGE_SCRIPT)?;
        }
        Ok(path)
    }

    fn call(
        &self,
        kind: RequestKind,
        name: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ToolkitError> {
        let bridge = self.bridge()?;
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let stem = format!("{}_{n:05}_{name}", std::process::id());
        let request_file = self.exchange_dir.join(format!("{stem}.request.json"));
        let response_file = self.exchange_dir.join(format!("{stem}.response.json"));

        let request = Request {
            version: BRIDGE_PROTOCOL_VERSION,
            kind,
            body,
        };
        fs::write(&request_file, serde_json::to_vec_pretty(&request)?)?;
        scopeguard::defer! {
            let _ = fs::remove_file(&request_file);
            let _ = fs::remove_file(&response_file);
        }

        let cmd = self.command_line();
        debug!("{cmd} {} ({name})", bridge.display());
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&bridge)
            .arg(&request_file)
            .arg(&response_file)
            .current_dir(&self.workdir)
            .output()
            .map_err(|err| ToolkitError::Spawn {
                cmd: cmd.clone(),
                err,
            })?;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            trace!("{line}");
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(ToolkitError::ExitStatus {
                cmd,
                status: output.status.to_string(),
                stderr: tail,
            });
        }

        if !response_file.exists() {
            return Err(ToolkitError::MissingResponse(response_file.clone()));
        }
        let contents = fs::read(&response_file)?;
        let response: Response =
            serde_json::from_slice(&contents).map_err(|err| ToolkitError::BadResponse {
                path: response_file.clone(),
                err,
            })?;
        parse_response(kind, name, response)
    }
}

fn parse_response(
    kind: RequestKind,
    name: &str,
    response: Response,
) -> Result<serde_json::Value, ToolkitError> {
    if response.version != BRIDGE_PROTOCOL_VERSION {
        return Err(ToolkitError::VersionMismatch {
            expected: BRIDGE_PROTOCOL_VERSION,
            got: response.version,
        });
    }
    if response.ok {
        return Ok(response.value);
    }

    let message = response
        .error
        .unwrap_or_else(|| "<no message>".to_string());
    Err(match kind {
        RequestKind::Query => ToolkitError::QueryFailed {
            query: name.to_string(),
            message,
        },
        RequestKind::Task | RequestKind::Fit => ToolkitError::TaskFailed {
            task: name.to_string(),
            message,
        },
    })
}

/// The main toolkit, driven through a [`CasaRunner`].
#[derive(Debug)]
pub struct CasaToolkit {
    runner: CasaRunner,
}

impl CasaToolkit {
    pub fn new(runner: CasaRunner) -> CasaToolkit {
        CasaToolkit { runner }
    }
}

impl Toolkit for CasaToolkit {
    fn run_task(&self, task: &Task) -> Result<(), ToolkitError> {
        let body = serde_json::to_value(task)?;
        self.runner.call(RequestKind::Task, task.name(), &body)?;
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<serde_json::Value, ToolkitError> {
        let body = serde_json::to_value(query)?;
        self.runner.call(RequestKind::Query, query.name(), &body)
    }
}

/// The UV-plane fitter, which may run under a different command than the main
/// toolkit.
#[derive(Debug)]
pub struct UvMultiFit {
    runner: CasaRunner,
}

impl UvMultiFit {
    pub fn new(runner: CasaRunner) -> UvMultiFit {
        UvMultiFit { runner }
    }
}

impl UvFitter for UvMultiFit {
    fn fit(&self, params: &UvFitParams) -> Result<(), ToolkitError> {
        let body = serde_json::to_value(params)?;
        self.runner.call(RequestKind::Fit, "uvmultifit", &body)?;
        Ok(())
    }
}
