// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod no_stderr;
mod run;
mod utilities;

use std::{process::Output, str::from_utf8};

use assert_cmd::{output::OutputError, Command};

/// An archive name that parses; the file itself needn't exist.
const ARCHIVE: &str = "2019.1.01234.S_uid___A002_Xe1f219_X6d0.asdm.sdm.tar";
const SESSION: &str = "uid___A002_Xe1f219_X6d0";

fn qsocal() -> Command {
    Command::cargo_bin("qsocal").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

#[test]
fn help_lists_the_subcommands() {
    let cmd = qsocal().arg("--help").ok();
    assert!(cmd.is_ok());
    let (stdout, _) = get_cmd_output(cmd);
    for sub_command in ["run", "flux-model", "plot-gains"] {
        assert!(stdout.contains(sub_command), "{sub_command} missing from:\n{stdout}");
    }
}

#[test]
fn run_help_groups_its_options() {
    let cmd = qsocal().args(["run", "--help"]).ok();
    assert!(cmd.is_ok());
    let (stdout, _) = get_cmd_output(cmd);
    for heading in ["INPUT DATA", "TOOLKIT", "SELF-CALIBRATION", "STEPS"] {
        assert!(stdout.contains(heading), "{heading} missing from:\n{stdout}");
    }
    assert!(stdout.contains("--space-save"));
    assert!(stdout.contains("--plan-steps"));
}

#[test]
fn no_subcommand_is_an_error() {
    let cmd = qsocal().ok();
    assert!(cmd.is_err());
}
