// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Test doubles and helpful functions shared by the unit tests.

pub(crate) mod mock;

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use flate2::{write::GzEncoder, Compression};

use crate::{dataset::ArchiveName, products::ProductPaths};

pub(crate) const PROJECT_ID: &str = "2019.1.01234.S";
pub(crate) const SESSION: &str = "uid___A002_Xe1f219_X6d0";
pub(crate) const ARCHIVE: &str = "2019.1.01234.S_uid___A002_Xe1f219_X6d0.asdm.sdm.tar";
/// A file inside the raw ASDM, relative to the session directory.
pub(crate) const RAW: &str = "2019.1.01234.S/science_goal.uid___A001_X1/group.uid___A001_X2/member.uid___A001_X3/raw/uid___A002_Xe1f219_X6d0.asdm.sdm/ASDM.xml";

/// Write a small archive shaped like an observatory delivery into `dir`.
pub(crate) fn write_archive(dir: &Path, gzip: bool) -> PathBuf {
    let mut builder = tar::Builder::new(vec![]);
    let contents = b"<ASDM/>";
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, RAW, &contents[..])
        .unwrap();
    let bytes = builder.into_inner().unwrap();

    if gzip {
        let path = dir.join(format!("{ARCHIVE}.gz"));
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
        encoder.write_all(&bytes).unwrap();
        encoder.finish().unwrap();
        path
    } else {
        let path = dir.join(ARCHIVE);
        fs::write(&path, bytes).unwrap();
        path
    }
}

/// The products of a dataset living in `working_dir`.
pub(crate) fn test_paths(working_dir: &Path) -> ProductPaths {
    let archive = ArchiveName {
        project_id: PROJECT_ID.to_string(),
        session: SESSION.to_string(),
    };
    ProductPaths::new(working_dir, &archive)
}

/// A toolkit command that answers every bridge request with success, by
/// writing to the response path (its last argument).
#[cfg(unix)]
pub(crate) fn stub_casa_command(dir: &Path) -> String {
    let script = dir.join("stub_casa.sh");
    fs::write(
        &script,
        "for last; do :; done\nprintf '{\"version\": 1, \"ok\": true, \"value\": null}' > \"$last\"\n",
    )
    .unwrap();
    format!("sh {}", script.display())
}
