// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::Path;

use tempfile::TempDir;

use super::*;
use crate::{
    products::{FitIntent, ProductPaths, SpwSel, TmpStage},
    store::DataColumn,
    tests::{
        mock::{MemoryStore, MockFitter, MockToolkit},
        test_paths,
    },
    toolkit::{GainType, Task, TaskColumn},
};

const FIELD: &str = "J1924-2914";
const OTHER_FIELD: &str = "J1517-2422";

struct Setup {
    _tmp_dir: TempDir,
    paths: ProductPaths,
    toolkit: MockToolkit,
    fitter: MockFitter,
    store: MemoryStore,
    options: SelfCalOptions,
}

impl Setup {
    fn new() -> Setup {
        let tmp_dir = TempDir::new().unwrap();
        let paths = test_paths(tmp_dir.path());
        Setup {
            _tmp_dir: tmp_dir,
            paths,
            toolkit: MockToolkit::default(),
            fitter: MockFitter::default(),
            // The combined subset has a single channel.
            store: MemoryStore::new(vec![230e9], 4, 2),
            options: SelfCalOptions::default(),
        }
    }

    fn engine(&self) -> SelfCalEngine {
        SelfCalEngine::new(
            &self.toolkit,
            &self.fitter,
            &self.store,
            &self.paths,
            &self.options,
        )
    }

    fn run(&self, spws: &[u32]) -> Result<FieldOutcome, SelfCalError> {
        self.engine().run_field(&FieldContext {
            field: FIELD,
            refant: "DA41",
            dish_diameter: 12.0,
            spws,
        })
    }
}

fn names(paths: &[std::path::PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

#[test]
fn test_gain_tables_are_cumulative() {
    let s = Setup::new();
    let outcome = s.run(&[17, 19]).unwrap();

    let gaincals = s.toolkit.gaincals();
    assert_eq!(gaincals.len(), 4);
    let base = format!("{}.ms.split.{FIELD}.spw_all", crate::tests::SESSION);
    let table = |suffix: &str| format!("{base}.{suffix}");

    // phase_0
    assert_eq!(names(&[gaincals[0].caltable.clone()]), vec![table("phase_0")]);
    assert!(gaincals[0].gaintable.is_empty());
    assert_eq!(gaincals[0].gaintype, GainType::G);
    assert_eq!(gaincals[0].calmode, "p");
    assert_eq!(gaincals[0].solint, "int");
    assert!(!gaincals[0].solnorm);

    // amp_phase_0
    assert_eq!(names(&[gaincals[1].caltable.clone()]), vec![table("amp_phase_0")]);
    assert_eq!(names(&gaincals[1].gaintable), vec![table("phase_0")]);
    assert_eq!(gaincals[1].gaintype, GainType::T);
    assert_eq!(gaincals[1].calmode, "ap");
    assert_eq!(gaincals[1].solint, "inf");
    assert!(gaincals[1].solnorm);

    // phase_1
    assert_eq!(names(&[gaincals[2].caltable.clone()]), vec![table("phase_1")]);
    assert_eq!(
        names(&gaincals[2].gaintable),
        vec![table("phase_0"), table("amp_phase_0")]
    );
    assert_eq!(gaincals[2].gaintype, GainType::T);
    assert!(!gaincals[2].solnorm);

    // amp_phase_1
    assert_eq!(names(&[gaincals[3].caltable.clone()]), vec![table("amp_phase_1")]);
    assert_eq!(
        names(&gaincals[3].gaintable),
        vec![table("phase_0"), table("amp_phase_0"), table("phase_1")]
    );
    assert!(gaincals[3].solnorm);

    for g in &gaincals {
        assert_eq!(g.refant, "DA41");
        assert_eq!(g.field, "0");
        assert_eq!(g.minsnr, 2.0);
        assert_eq!(g.vis, outcome.combined);
    }

    let rounds: Vec<(CalMode, u8)> = outcome
        .gains
        .tables()
        .iter()
        .map(|t| (t.mode, t.round))
        .collect();
    assert_eq!(
        rounds,
        vec![
            (CalMode::Phase, 0),
            (CalMode::AmpPhase, 0),
            (CalMode::Phase, 1),
            (CalMode::AmpPhase, 1)
        ]
    );
}

#[test]
fn test_only_round_0_gains_are_applied() {
    let s = Setup::new();
    s.run(&[17, 19]).unwrap();

    let applied: Vec<(std::path::PathBuf, Vec<String>)> = s
        .toolkit
        .tasks()
        .into_iter()
        .filter_map(|t| match t {
            Task::Applycal(p) => {
                assert_eq!(p.applymode, "calflag");
                assert!(!p.calwt);
                Some((p.vis.clone(), names(&p.gaintable)))
            }
            _ => None,
        })
        .collect();
    // Once on the combined subset, then once per spw.
    assert_eq!(applied.len(), 3);
    assert_eq!(applied[0].0, s.paths.subset(FIELD, SpwSel::All));
    assert_eq!(applied[1].0, s.paths.subset(FIELD, SpwSel::Id(17)));
    assert_eq!(applied[2].0, s.paths.subset(FIELD, SpwSel::Id(19)));
    for (_, tables) in &applied {
        assert_eq!(tables.len(), 2);
        assert!(tables[0].ends_with(".phase_0"));
        assert!(tables[1].ends_with(".amp_phase_0"));
    }
}

#[test]
fn test_end_to_end_two_spws() {
    let s = Setup::new();
    let outcome = s.run(&[17, 19]).unwrap();

    // One combined subset.
    let combined = s.paths.subset(FIELD, SpwSel::All);
    assert_eq!(outcome.combined, combined);
    assert!(combined.exists());
    assert!(s.paths.listobs(&combined).exists());
    assert!(!s.paths.tmp_subset(FIELD, TmpStage::Averaged).exists());
    assert!(!s.paths.tmp_subset(FIELD, TmpStage::Combined).exists());

    // One initial flux, then the gain-corrected refit.
    assert_eq!(
        outcome.initial_fit,
        s.paths
            .fit_result(FIELD, SpwSel::All, Some(FitIntent::NoSelfCal))
    );
    assert!(outcome.initial_fit.exists());
    assert!(outcome.refined_fit.exists());
    assert_eq!(
        s.store.writes(),
        vec![
            (combined.clone(), vec![DataColumn::Model]),
            (
                combined.clone(),
                vec![DataColumn::Model, DataColumn::Corrected]
            ),
        ]
    );

    // Exactly two per-spw subsets, each with its own fits.
    assert_eq!(outcome.spw_fits.len(), 2);
    for (fits, spw) in outcome.spw_fits.iter().zip([17, 19]) {
        assert_eq!(fits.spw, spw);
        assert!(fits.subset.exists());
        assert!(fits.noselfcal.exists());
        assert!(fits.selfcal.exists());
        assert!(fits
            .noselfcal
            .to_string_lossy()
            .ends_with(&format!(".spw_{spw}.noselfcal.dat")));
        assert!(fits
            .selfcal
            .to_string_lossy()
            .ends_with(&format!(".spw_{spw}.selfcal.dat")));
    }

    // Two MFS fits, then two per-channel fits per spw.
    let fits = s.fitter.fits();
    assert_eq!(fits.len(), 6);
    assert_eq!(
        fits.iter()
            .map(|f| (f.column, f.one_fit_per_channel))
            .collect::<Vec<_>>(),
        vec![
            (DataColumn::Data, false),
            (DataColumn::Corrected, false),
            (DataColumn::Data, true),
            (DataColumn::Corrected, true),
            (DataColumn::Data, true),
            (DataColumn::Corrected, true),
        ]
    );
    for f in &fits {
        assert_eq!(f.dish_diameter, 12.0);
        assert_eq!(f.ncpu, 8);
        assert!(f.pbeam);
    }

    assert_eq!(
        s.toolkit.task_names(),
        vec![
            "split",
            "listobs",
            "mstransform",
            "listobs",
            "listobs",
            "clearcal",
            "gaincal",
            "gaincal",
            "applycal",
            "gaincal",
            "gaincal",
            "mstransform",
            "listobs",
            "applycal",
            "mstransform",
            "listobs",
            "applycal",
        ]
    );
}

#[test]
fn test_average_split_parameters() {
    let s = Setup::new();
    s.run(&[17, 19]).unwrap();
    let tasks = s.toolkit.tasks();
    match &tasks[0] {
        Task::Split(p) => {
            assert_eq!(p.vis, s.paths.split_vis());
            assert_eq!(p.spw.as_deref(), Some("17,19"));
            assert_eq!(p.width, Some(10000));
            assert_eq!(p.datacolumn, TaskColumn::Corrected);
            assert_eq!(p.intent.as_deref(), Some("*ON_SOURCE*"));
            assert_eq!(p.field.as_deref(), Some(FIELD));
            assert!(!p.keepflags);
        }
        t => panic!("unexpected first task {t:?}"),
    }
    match &tasks[2] {
        Task::Mstransform(p) => {
            assert!(p.combinespws);
            assert!(p.reindex);
            assert_eq!(p.datacolumn, TaskColumn::All);
        }
        t => panic!("unexpected third task {t:?}"),
    }
}

#[test]
fn test_multichannel_combination_is_averaged_again() {
    let mut s = Setup::new();
    s.toolkit.combined_channels = 4;
    s.run(&[17]).unwrap();

    let names = s.toolkit.task_names();
    assert_eq!(&names[..6], ["split", "listobs", "mstransform", "listobs", "split", "listobs"]);
    match &s.toolkit.tasks()[4] {
        Task::Split(p) => {
            assert_eq!(p.vis, s.paths.tmp_subset(FIELD, TmpStage::Combined));
            assert_eq!(p.outputvis, s.paths.subset(FIELD, SpwSel::All));
            assert_eq!(p.datacolumn, TaskColumn::All);
        }
        t => panic!("unexpected task {t:?}"),
    }
    assert!(s.paths.subset(FIELD, SpwSel::All).exists());
    assert!(!s.paths.tmp_subset(FIELD, TmpStage::Combined).exists());
}

#[test]
fn test_space_save_removes_per_spw_subsets() {
    let mut s = Setup::new();
    s.options.space_save = true;
    let outcome = s.run(&[17, 19]).unwrap();

    for fits in &outcome.spw_fits {
        assert!(!fits.subset.exists());
        assert!(!s.paths.listobs(&fits.subset).exists());
        // The fit results stay.
        assert!(fits.selfcal.exists());
    }
    let left: Vec<String> = std::fs::read_dir(s.paths.calibrated_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    let combined = names(&[s.paths.subset(FIELD, SpwSel::All)]).remove(0);
    let mut expected = vec![combined.clone(), format!("{combined}.listobs")];
    expected.sort();
    let mut left = left;
    left.sort();
    assert_eq!(left, expected);
}

#[test]
fn test_empty_fit_result_stops_the_field() {
    let mut s = Setup::new();
    s.fitter.empty_for = Some(FIELD.to_string());
    let err = s.run(&[17, 19]).unwrap_err();
    assert_eq!(err.stage, Stage::InitialFit);
    assert!(err.is_fit_failure());
    // Nothing was solved or written.
    assert!(s.toolkit.gaincals().is_empty());
    assert!(s.store.writes().is_empty());
}

#[test]
fn test_failed_task_names_its_stage() {
    let mut s = Setup::new();
    s.toolkit.failing_task = Some("applycal");
    let err = s.run(&[17]).unwrap_err();
    assert_eq!(err.stage, Stage::Apply0);
    assert!(!err.is_fit_failure());
    assert_eq!(s.toolkit.gaincals().len(), 2);
}

#[test]
fn test_fit_failure_doesnt_affect_other_fields() {
    for parallel in [false, true] {
        let mut s = Setup::new();
        s.fitter.empty_for = Some(OTHER_FIELD.to_string());
        let fields = vec![OTHER_FIELD.to_string(), FIELD.to_string()];
        let results = s
            .engine()
            .run_fields(&fields, "DA41", 12.0, &[17, 19], parallel);
        assert_eq!(results.len(), 2);
        match &results[0] {
            Err(e) => {
                assert_eq!(e.field, OTHER_FIELD);
                assert!(e.is_fit_failure());
            }
            Ok(_) => panic!("expected {OTHER_FIELD} to fail"),
        }
        let outcome = results[1].as_ref().unwrap();
        assert_eq!(outcome.field, FIELD);
        assert_eq!(outcome.spw_fits.len(), 2);
    }
}

#[test]
fn test_plan_only_touches_nothing() {
    let mut s = Setup::new();
    s.options.plan_only = true;
    let outcome = s.run(&[17, 19]).unwrap();
    assert!(s.toolkit.tasks().is_empty());
    assert!(s.fitter.fits().is_empty());
    assert!(s.store.writes().is_empty());
    assert!(!s.paths.root().exists());
    assert_eq!(outcome.gains.tables().len(), 4);
    assert_eq!(outcome.spw_fits.len(), 2);
}

#[test]
fn test_solution_intervals_are_configurable() {
    let mut s = Setup::new();
    s.options.phase_solint = "30s".to_string();
    s.options.amp_phase_solint = "int".to_string();
    s.options.min_snr = 3.0;
    s.run(&[17]).unwrap();
    let solints: Vec<(String, f64)> = s
        .toolkit
        .gaincals()
        .into_iter()
        .map(|g| (g.solint, g.minsnr))
        .collect();
    assert_eq!(
        solints,
        vec![
            ("30s".to_string(), 3.0),
            ("int".to_string(), 3.0),
            ("30s".to_string(), 3.0),
            ("int".to_string(), 3.0)
        ]
    );
}

#[test]
fn test_gain_chain_rounds() {
    let mut chain = GainChain::default();
    for (mode, round) in [
        (CalMode::Phase, 0),
        (CalMode::AmpPhase, 0),
        (CalMode::Phase, 1),
    ] {
        chain.push(GainTable {
            path: Path::new("/c").join(format!("{mode}_{round}")),
            mode,
            round,
        });
    }
    assert_eq!(
        chain.round(0).paths(),
        vec![Path::new("/c/phase_0"), Path::new("/c/amp_phase_0")]
    );
    assert_eq!(chain.round(1).tables().len(), 1);
    assert_eq!(CalMode::AmpPhase.solver_code(), "ap");
}
