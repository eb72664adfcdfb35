// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests against pipeline arguments and converting them to parameters.

use std::{fs, path::PathBuf};

use approx::assert_abs_diff_eq;
use clap::Parser;
use indoc::indoc;
use tempfile::TempDir;

use super::*;
use crate::tests::{ARCHIVE, SESSION};

fn args_for(dir: &TempDir) -> RunArgs {
    RunArgs {
        data_args: DataArgs {
            archive: Some(dir.path().join(ARCHIVE)),
            working_dir: None,
        },
        ..Default::default()
    }
}

#[test]
fn defaults() {
    let tmp_dir = TempDir::new().unwrap();
    let params = args_for(&tmp_dir).parse().unwrap();

    assert_eq!(params.dataset.paths.root(), tmp_dir.path().join(SESSION));
    assert_eq!(params.casa_command, DEFAULT_CASA_COMMAND);
    assert_eq!(params.fitter_command, DEFAULT_CASA_COMMAND);
    let options = &params.options;
    assert_eq!(options.selfcal.fit_workers, 8);
    assert_abs_diff_eq!(options.selfcal.min_snr, 2.0);
    assert_eq!(options.selfcal.phase_solint, "int");
    assert_eq!(options.selfcal.amp_phase_solint, "inf");
    assert!(!options.selfcal.meansub);
    assert!(!options.space_save);
    assert!(!options.gzip);
    assert!(options.plots);
    assert!(options.plan_steps.is_empty());
}

#[test]
fn command_line() {
    let tmp_dir = TempDir::new().unwrap();
    let archive = tmp_dir.path().join(ARCHIVE).display().to_string();
    let args = RunArgs::parse_from([
        "run",
        "--archive",
        archive.as_str(),
        "--fitter-command",
        "/opt/casa-5/bin/casa -c",
        "--fit-workers",
        "2",
        "--plan-steps",
        "6",
        "0",
        "6",
        "--space-save",
        "--gzip",
        "--no-plots",
    ]);
    let params = args.parse().unwrap();
    assert_eq!(params.fitter_command, "/opt/casa-5/bin/casa -c");
    assert_eq!(params.options.selfcal.fit_workers, 2);
    assert_eq!(params.options.plan_steps, vec![Step::Unpack, Step::Imaging]);
    assert!(params.options.space_save);
    assert!(params.options.gzip);
    assert!(!params.options.plots);
}

#[test]
fn plan_only_plans_every_step() {
    let tmp_dir = TempDir::new().unwrap();
    let mut args = args_for(&tmp_dir);
    args.step_args.plan_only = true;
    args.step_args.plan_steps = Some(vec![3]);
    let params = args.parse().unwrap();
    assert_eq!(params.options.plan_steps, Step::iter().collect::<Vec<_>>());
}

#[test]
fn gzip_needs_space_saving() {
    let tmp_dir = TempDir::new().unwrap();
    let mut args = args_for(&tmp_dir);
    args.step_args.gzip = true;
    let params = args.parse().unwrap();
    assert!(!params.options.gzip);
}

#[test]
fn bad_arguments() {
    let tmp_dir = TempDir::new().unwrap();

    let result = RunArgs::default().parse();
    assert!(matches!(result, Err(QsocalError::MissingInput(_))));

    let mut args = args_for(&tmp_dir);
    args.data_args.archive = Some(PathBuf::from("not_an_archive.tar"));
    assert!(matches!(args.parse(), Err(QsocalError::MissingInput(_))));

    let mut args = args_for(&tmp_dir);
    args.selfcal_args.fit_workers = Some(0);
    let result = args.parse();
    assert!(matches!(result, Err(QsocalError::Generic(s)) if s.contains("at least one worker")));

    let mut args = args_for(&tmp_dir);
    args.selfcal_args.min_snr = Some(-1.0);
    assert!(args.parse().is_err());

    let mut args = args_for(&tmp_dir);
    args.toolkit_args.casa_command = Some("   ".to_string());
    assert!(args.parse().is_err());

    let mut args = args_for(&tmp_dir);
    args.step_args.plan_steps = Some(vec![9]);
    let result = args.parse();
    assert!(matches!(result, Err(QsocalError::Generic(s)) if s.contains("no step 9")));
}

#[test]
fn command_line_overrides_the_arguments_file() {
    let tmp_dir = TempDir::new().unwrap();
    let arg_file = tmp_dir.path().join("qsocal.toml");
    fs::write(
        &arg_file,
        indoc! {r#"
            [data]
            archive = "/data/2019.1.01234.S_uid___A002_Xe1f219_X6d0.asdm.sdm.tar"
            working_dir = "/scratch"

            [toolkit]
            casa_command = "casa-6 -c"

            [self-calibration]
            fit_workers = 4
            min_snr = 3.0
            meansub = true

            [steps]
            space_save = true
        "#},
    )
    .unwrap();

    let args = RunArgs {
        args_file: Some(arg_file),
        selfcal_args: SelfCalArgs {
            fit_workers: Some(16),
            ..Default::default()
        },
        ..Default::default()
    }
    .merge()
    .unwrap();

    assert!(args.args_file.is_none());
    assert_eq!(args.data_args.working_dir, Some(PathBuf::from("/scratch")));
    assert_eq!(args.toolkit_args.casa_command.as_deref(), Some("casa-6 -c"));
    assert_eq!(args.selfcal_args.fit_workers, Some(16));
    assert_eq!(args.selfcal_args.min_snr, Some(3.0));
    assert!(args.selfcal_args.meansub);
    assert!(args.step_args.space_save);
    assert!(!args.step_args.gzip);
}

#[test]
fn json_arguments_file() {
    let tmp_dir = TempDir::new().unwrap();
    let arg_file = tmp_dir.path().join("qsocal.json");
    fs::write(
        &arg_file,
        indoc! {r#"
            {
                "data": { "archive": "a.tar" },
                "steps": { "plan_steps": [1, 2] }
            }
        "#},
    )
    .unwrap();

    let args = RunArgs {
        args_file: Some(arg_file),
        ..Default::default()
    }
    .merge()
    .unwrap();
    assert_eq!(args.data_args.archive, Some(PathBuf::from("a.tar")));
    assert_eq!(args.step_args.plan_steps, Some(vec![1, 2]));
}

#[test]
fn unknown_arguments_file_type() {
    let tmp_dir = TempDir::new().unwrap();
    let arg_file = tmp_dir.path().join("qsocal.yaml");
    fs::write(&arg_file, "data: {}").unwrap();

    let result = RunArgs {
        args_file: Some(arg_file),
        ..Default::default()
    }
    .merge();
    assert!(matches!(result, Err(QsocalError::ArgFile(_))));
}

#[test]
fn saved_toml_reads_back() {
    let tmp_dir = TempDir::new().unwrap();
    let mut args = args_for(&tmp_dir);
    args.selfcal_args.phase_solint = Some("30s".to_string());
    args.step_args.statwt = true;

    let toml_file = tmp_dir.path().join("saved.toml");
    fs::write(&toml_file, toml::to_string(&args).unwrap()).unwrap();
    let read = RunArgs {
        args_file: Some(toml_file),
        ..Default::default()
    }
    .merge()
    .unwrap();
    assert_eq!(read.data_args.archive, args.data_args.archive);
    assert_eq!(read.selfcal_args.phase_solint.as_deref(), Some("30s"));
    assert!(read.step_args.statwt);
}
