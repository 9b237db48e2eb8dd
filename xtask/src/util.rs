// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::process::Command;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;

pub(crate) fn workspace_root() -> Result<Utf8PathBuf> {
    cargo_metadata::MetadataCommand::new()
        .no_deps()
        .exec()
        .context("Failed to run cargo metadata")
        .map(|meta| meta.workspace_root)
}

/// A `cargo` command rooted at the workspace, preferring the `cargo` which
/// invoked us (via `CARGO`) over whatever is first on the search path.
pub(crate) fn cargo_in_workspace(subcommand: &str) -> Result<Command> {
    let cargo =
        std::env::var_os("CARGO").unwrap_or_else(|| OsString::from("cargo"));
    let mut cmd = Command::new(cargo);
    cmd.arg(subcommand).current_dir(workspace_root()?);
    Ok(cmd)
}
