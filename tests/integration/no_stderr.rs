// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests to ensure there is no stderr output for successful commands.

use tempfile::TempDir;

use crate::{get_cmd_output, qsocal, ARCHIVE};

#[test]
fn test_run_dry_run_no_stderr() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let archive = tmp_dir.path().join(ARCHIVE);

    #[rustfmt::skip]
    let cmd = qsocal()
        .args([
            "run",
            "--archive", &format!("{}", archive.display()),
            "--gzip",
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "dry run failed: {}", cmd.err().unwrap());
    // Warnings go through the logger, i.e. stdout.
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
    assert!(stdout.contains("--gzip only applies"), "{stdout}");
}
