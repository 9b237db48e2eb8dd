// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Result};

use crate::util::*;

pub(crate) fn cmd_fmt() -> Result<()> {
    let mut cmd = cargo_in_workspace("fmt")?;
    cmd.args(["--all", "--check"]);

    if !cmd.status()?.success() {
        bail!("rustfmt failure(s) detected")
    }

    Ok(())
}
