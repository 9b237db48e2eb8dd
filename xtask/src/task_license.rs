// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::util::*;

/// Subset of `.licenserc.yaml` this check understands.
#[derive(Deserialize, Debug)]
struct LicenseRc {
    header: LicenseHeader,
}
#[derive(Deserialize, Debug)]
struct LicenseHeader {
    license: LicenseEnt,
    paths: Vec<String>,
    #[serde(rename = "paths-ignore", default)]
    paths_ignore: Vec<String>,
}
#[derive(Deserialize, Debug)]
struct LicenseEnt {
    content: String,
}

impl LicenseRc {
    fn load(path: &Utf8Path) -> Result<Self> {
        let fp = File::open(path)
            .with_context(|| format!("cannot open {path}"))?;
        let config: Self = serde_yaml::from_reader(fp)
            .with_context(|| format!("could not parse {path}"))?;
        if config.header.paths.is_empty() {
            bail!("No file paths configured in {path}")
        }
        Ok(config)
    }

    fn ignore_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for path in self.header.paths_ignore.iter() {
            let glob = Glob::new(path)
                .with_context(|| format!("'{path}' is not a valid glob"))?;
            builder.add(glob);
        }
        Ok(builder.build()?)
    }

    /// Expected header, as `//` comment lines.
    fn needle(&self) -> Vec<String> {
        self.header
            .license
            .content
            .lines()
            .map(|l| format!("// {l}"))
            .collect()
    }
}

/// Returns the 1-based line at which `fp` diverges from `needle`, if any.
fn first_mismatch(fp: File, needle: &[String]) -> Result<Option<usize>> {
    let mut lines = BufReader::new(fp).lines();
    for (num, expected) in needle.iter().enumerate() {
        match lines.next().transpose()? {
            Some(actual) if &actual == expected => continue,
            _ => return Ok(Some(num + 1)),
        }
    }
    Ok(None)
}

pub(crate) fn cmd_license() -> Result<()> {
    let ws_root = workspace_root()?;
    let config = LicenseRc::load(&ws_root.join(".licenserc.yaml"))?;
    let ignore = config.ignore_set()?;
    let needle = config.needle();

    let mut failures = 0usize;
    for pattern in config.header.paths.iter() {
        let full = ws_root.join(pattern);
        for entry in glob::glob(full.as_str())? {
            let item_path = entry.context("item path not readable")?;
            let short_path = item_path.strip_prefix(&ws_root)?;
            if ignore.is_match(short_path) {
                continue;
            }

            let fp = File::open(&item_path).with_context(|| {
                format!("could not open {} for reading", short_path.display())
            })?;
            if let Some(line) = first_mismatch(fp, &needle)? {
                eprintln!(
                    "{}: expected license header not found at line {line}",
                    short_path.display()
                );
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("License errors detected in {failures} file(s)")
    }

    println!("License checks happy!");
    Ok(())
}
