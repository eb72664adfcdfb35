// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameters for the `qsocal` subcommands.
//!
//! The code here mirrors the code within the `cli` module; `cli` is
//! unparsed, user-facing code, whereas parameters have been validated and are
//! ready to be used directly.

mod flux_model;
mod pipeline;

pub(crate) use flux_model::FluxModelParams;
pub(crate) use pipeline::PipelineParams;
