// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::process::Stdio;

use anyhow::{bail, Context, Result};

use crate::util::*;

/// Module path of a test named `a::b::tests::case` if its enclosing module
/// is called `tests` rather than `test`.
fn misnamed_test_module(line: &str) -> Option<&str> {
    // Listing lines look like "<test name>: test"; doctests are listed as
    // "<path> - <item> (line <num>)" and are not subject to the rule.
    let test_name = match line.rsplit_once(": ") {
        Some((name, "test")) if !name.contains(" - ") => name,
        _ => return None,
    };

    let (module, _case) = test_name.rsplit_once("::")?;
    match module.rsplit("::").next() {
        Some("tests") => Some(module),
        _ => None,
    }
}

fn check_test_names() -> Result<()> {
    let mut cmd = cargo_in_workspace("test")?;
    let child = cmd
        .args(["--workspace", "--", "--list", "--format=terse"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let stdout = child.stdout.context("test listing has no stdout")?;

    let problem_mods = BufReader::new(stdout)
        .lines()
        .map_while(std::result::Result::ok)
        .filter_map(|line| misnamed_test_module(&line).map(str::to_owned))
        .collect::<BTreeSet<_>>();

    if !problem_mods.is_empty() {
        eprintln!("The following test module paths should use `mod test` instead of `mod tests`:");
        for path in problem_mods {
            eprintln!("\t{path}");
        }
        bail!("Unconforming test module names")
    }
    Ok(())
}

pub(crate) fn cmd_style() -> Result<()> {
    check_test_names()
}
