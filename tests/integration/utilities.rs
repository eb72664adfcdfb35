// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The flux-model and plot-gains subcommands.

use crate::{get_cmd_output, qsocal};

#[test]
fn flux_model_needs_something_to_write() {
    #[rustfmt::skip]
    let cmd = qsocal()
        .args([
            "flux-model",
            "--subset", "s.J1924-2914.spw0.ms",
            "--fit-result", "s.J1924-2914.spw0.selfcal.dat",
            "--no-model",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("would write nothing"), "{stderr}");
}

#[test]
fn flux_model_dry_run() {
    #[rustfmt::skip]
    let cmd = qsocal()
        .args([
            "flux-model",
            "--subset", "s.J1924-2914.spw0.ms",
            "--fit-result", "s.J1924-2914.spw0.selfcal.dat",
            "--data-column", "data",
            "--write-residuals",
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "{}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(
        stdout.contains("Writing model and residuals from the data column"),
        "{stdout}"
    );
}

#[test]
fn flux_model_of_a_missing_subset() {
    let tmp_dir = tempfile::TempDir::new().expect("couldn't make tmp dir");
    let fit = tmp_dir.path().join("fit.dat");
    std::fs::write(&fit, "1.0e11 1.0\n").unwrap();

    #[rustfmt::skip]
    let cmd = qsocal()
        .args([
            "flux-model",
            "--subset", &format!("{}", tmp_dir.path().join("missing.ms").display()),
            "--fit-result", &format!("{}", fit.display()),
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("missing.ms"), "{stderr}");
}

#[test]
fn plot_gains_needs_two_tables() {
    let cmd = qsocal().args(["plot-gains", "a.phase_0"]).ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Exactly two gain tables"), "{stderr}");
}
