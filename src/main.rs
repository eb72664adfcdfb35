// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The main qsocal binary.

use clap::Parser;

use qsocal::Qsocal;

fn main() {
    // Run qsocal, only performing extra steps if it returned an error.
    if let Err(e) = Qsocal::parse().run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
