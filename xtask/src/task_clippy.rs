// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Result};

use crate::util::*;

pub(crate) fn cmd_clippy(strict: bool) -> Result<()> {
    let run_clippy = |args: &[&str]| -> Result<bool> {
        let mut cmd = cargo_in_workspace("clippy")?;
        cmd.arg("--no-deps").args(args);

        if strict {
            cmd.args(["--", "-Dwarnings"]);
        }

        Ok(!cmd.status()?.success())
    };

    let mut failed = false;

    // Library, binary and their tests
    failed |= run_clippy(&["--workspace", "--all-targets"])?;

    // The stamper as a build would invoke it
    failed |= run_clippy(&["-p", "dmx-version-stamp", "--release"])?;

    if failed {
        bail!("Clippy failures detected")
    }

    Ok(())
}
