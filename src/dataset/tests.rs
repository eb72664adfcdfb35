// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{fs, path::Path};

use serial_test::serial;
use tempfile::TempDir;

use super::*;
use crate::tests::{write_archive, ARCHIVE, RAW};

/// Every file beneath `dir`, relative to it, sorted.
fn tree(dir: &Path) -> Vec<String> {
    let mut out = vec![];
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in fs::read_dir(&d).unwrap() {
            let p = entry.unwrap().path();
            out.push(p.strip_prefix(dir).unwrap().display().to_string());
            if p.is_dir() {
                stack.push(p);
            }
        }
    }
    out.sort();
    out
}

#[test]
fn test_parse_archive_names() {
    for name in [
        "2019.1.01234.S_uid___A002_Xe1f219_X6d0.asdm.sdm",
        "2019.1.01234.S_uid___A002_Xe1f219_X6d0.asdm.sdm.tar",
        "2019.1.01234.S_uid___A002_Xe1f219_X6d0.asdm.sdm.tar.gz",
    ] {
        let a = ArchiveName::parse(name).unwrap();
        assert_eq!(a.project_id, "2019.1.01234.S");
        assert_eq!(a.session, "uid___A002_Xe1f219_X6d0");
    }

    assert!(matches!(
        ArchiveName::parse("something.tar"),
        Err(UnpackError::BadArchiveName(_))
    ));
    assert!(matches!(
        ArchiveName::parse("2019.1.01234.S_uid___A002.tar"),
        Err(UnpackError::BadArchiveName(_))
    ));
}

#[test]
#[serial]
fn test_locate_defaults_to_archive_dir() {
    let d = Dataset::locate(Path::new("/some/where").join(ARCHIVE).as_path(), None).unwrap();
    assert_eq!(
        d.paths.root(),
        Path::new("/some/where/uid___A002_Xe1f219_X6d0")
    );

    let d = Dataset::locate(Path::new(ARCHIVE), None).unwrap();
    assert_eq!(
        d.paths.root(),
        std::env::current_dir()
            .unwrap()
            .join("uid___A002_Xe1f219_X6d0")
    );
    assert!(d.paths.root().is_absolute());

    let d = Dataset::locate(Path::new(ARCHIVE), Some(Path::new("/work"))).unwrap();
    assert_eq!(d.paths.root(), Path::new("/work/uid___A002_Xe1f219_X6d0"));
}

#[test]
#[serial]
fn test_relative_working_dir() {
    let tmp_dir = TempDir::new().unwrap();
    let cwd = std::env::current_dir().unwrap();
    std::env::set_current_dir(tmp_dir.path()).unwrap();
    let result = Dataset::locate(Path::new(ARCHIVE), Some(Path::new("work")));
    std::env::set_current_dir(cwd).unwrap();

    let d = result.unwrap();
    assert_eq!(
        d.paths.root(),
        tmp_dir.path().join("work").join("uid___A002_Xe1f219_X6d0")
    );
}

#[test]
fn test_unpack_plain_archive() {
    let tmp_dir = TempDir::new().unwrap();
    let archive = write_archive(tmp_dir.path(), false);
    let d = Dataset::locate(&archive, None).unwrap();
    d.unpack().unwrap();

    assert!(!archive.exists(), "archive should have moved");
    assert!(d.paths.archive().exists());
    assert!(d.paths.root().join(RAW).exists());
}

#[test]
fn test_unpack_gzipped_archive() {
    let tmp_dir = TempDir::new().unwrap();
    let archive = write_archive(tmp_dir.path(), true);
    let d = Dataset::locate(&archive, None).unwrap();
    d.unpack().unwrap();

    assert!(!archive.exists());
    // Like gzip -d, the compressed file is replaced by the plain one.
    assert!(d.paths.archive().exists());
    assert!(!suffixed(&d.paths.archive(), ".gz").exists());
    assert_eq!(
        fs::read(d.paths.root().join(RAW)).unwrap(),
        b"<ASDM/>".to_vec()
    );
}

#[test]
fn test_unpack_twice_is_idempotent() {
    let tmp_dir = TempDir::new().unwrap();
    let archive = write_archive(tmp_dir.path(), false);
    let d = Dataset::locate(&archive, None).unwrap();
    d.unpack().unwrap();

    // Touch the extracted file so that re-extraction would be detectable.
    let raw = d.paths.root().join(RAW);
    fs::write(&raw, b"modified").unwrap();
    let before = tree(tmp_dir.path());

    let result = d.unpack();
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(tree(tmp_dir.path()), before);
    assert_eq!(fs::read(&raw).unwrap(), b"modified".to_vec());
}

#[test]
fn test_unpack_from_session_dir() {
    // The archive was already moved into the session directory, but not
    // extracted.
    let tmp_dir = TempDir::new().unwrap();
    let session = tmp_dir.path().join("uid___A002_Xe1f219_X6d0");
    fs::create_dir(&session).unwrap();
    write_archive(&session, true);

    let d = Dataset::locate(&tmp_dir.path().join(ARCHIVE), None).unwrap();
    d.unpack().unwrap();
    assert!(d.paths.root().join(RAW).exists());
}

#[test]
fn test_missing_input() {
    let tmp_dir = TempDir::new().unwrap();
    let d = Dataset::locate(&tmp_dir.path().join(ARCHIVE), None).unwrap();
    let result = d.unpack();
    assert!(matches!(result, Err(UnpackError::MissingInput { .. })));
    assert!(!d.paths.root().exists());
}

#[test]
fn test_empty_session_dir_is_missing_input() {
    let tmp_dir = TempDir::new().unwrap();
    fs::create_dir(tmp_dir.path().join("uid___A002_Xe1f219_X6d0")).unwrap();
    let d = Dataset::locate(&tmp_dir.path().join(ARCHIVE), None).unwrap();
    assert!(matches!(
        d.unpack(),
        Err(UnpackError::MissingInput { .. })
    ));
}
