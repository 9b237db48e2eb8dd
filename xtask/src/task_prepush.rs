// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Result};

use crate::{task_clippy, task_fmt, task_license, task_style};

pub(crate) fn cmd_prepush() -> Result<()> {
    let checks: [(&str, fn() -> Result<()>); 4] = [
        ("clippy", || task_clippy::cmd_clippy(true)),
        ("fmt", task_fmt::cmd_fmt),
        ("license", task_license::cmd_license),
        ("style", task_style::cmd_style),
    ];

    let mut errs = Vec::new();
    for (name, check) in checks {
        println!("Checking {name}...");
        if let Err(e) = check() {
            eprintln!("{name}: {e:#}");
            errs.push(name);
        }
    }

    if !errs.is_empty() {
        bail!("Pre-push error(s) in: {}", errs.join(", "))
    }
    Ok(())
}
