// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs;

use tempfile::TempDir;

use crate::{get_cmd_output, qsocal, ARCHIVE, SESSION};

#[test]
fn dry_run_touches_nothing() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let archive = tmp_dir.path().join(ARCHIVE);

    #[rustfmt::skip]
    let cmd = qsocal()
        .args([
            "run",
            "--archive", &format!("{}", archive.display()),
            "--space-save",
            "--plan-steps", "7", "8",
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "dry run failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Pipeline set up"), "{stdout}");
    assert!(stdout.contains(SESSION), "{stdout}");
    assert!(stdout.contains("step7 (space saving)"), "{stdout}");
    assert!(stdout.contains("Dry run -- exiting now."), "{stdout}");

    assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 0);
}

#[test]
fn save_toml_then_read_it_back() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let archive = tmp_dir.path().join(ARCHIVE);
    let toml = tmp_dir.path().join("args.toml");

    #[rustfmt::skip]
    let cmd = qsocal()
        .args([
            "run",
            "--archive", &format!("{}", archive.display()),
            "--fit-workers", "3",
            "--statwt",
            "--save-toml", &format!("{}", toml.display()),
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
    let contents = fs::read_to_string(&toml).unwrap();
    assert!(contents.contains("fit_workers = 3"), "{contents}");
    assert!(contents.contains("statwt = true"), "{contents}");

    // The file alone is enough to parse the same run.
    let cmd = qsocal()
        .args(["run", &format!("{}", toml.display()), "--dry-run"])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("3 workers per fit"), "{stdout}");
}

#[test]
fn bad_archive_name() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let archive = tmp_dir.path().join("observation.tar");

    let cmd = qsocal()
        .args(["run", "--archive", &format!("{}", archive.display())])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.starts_with("Error:"), "{stderr}");
    assert!(stderr.contains("observation.tar"), "{stderr}");
}

#[test]
fn missing_input_is_fatal() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let archive = tmp_dir.path().join(ARCHIVE);

    // The toolkit is never started, so any command will do.
    #[rustfmt::skip]
    let cmd = qsocal()
        .args([
            "run",
            "--archive", &format!("{}", archive.display()),
            "--casa-command", "false",
            "--no-progress-bars",
        ])
        .assert()
        .failure()
        .code(1);
    let stderr = String::from_utf8_lossy(&cmd.get_output().stderr).to_string();
    assert!(stderr.contains("Neither the archive"), "{stderr}");
    assert!(!tmp_dir.path().join(SESSION).join("log").exists());
}

#[test]
fn unknown_plan_step() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let archive = tmp_dir.path().join(ARCHIVE);

    #[rustfmt::skip]
    let cmd = qsocal()
        .args([
            "run",
            "--archive", &format!("{}", archive.display()),
            "--plan-steps", "12",
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("There is no step 12"), "{stderr}");
}
