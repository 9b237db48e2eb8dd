// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod task_clippy;
mod task_fmt;
mod task_license;
mod task_prepush;
mod task_style;
mod util;

#[derive(Parser)]
#[command(
    name = "cargo xtask",
    about = "Developer tasks for dmx-version-stamp"
)]
struct Args {
    #[command(subcommand)]
    cmd: Cmds,
}

#[derive(Subcommand)]
enum Cmds {
    /// Run clippy across the workspace
    Clippy {
        /// Treat warnings as errors
        #[arg(short, long)]
        strict: bool,
    },
    /// Check formatting with rustfmt
    Fmt,
    /// (Crudely) Check for appropriate license headers
    License,
    /// Run all checks suitable before pushing a branch
    Prepush,
    /// Check workspace-specific style conventions
    Style,
}

fn main() -> Result<()> {
    match Args::parse().cmd {
        Cmds::Clippy { strict } => task_clippy::cmd_clippy(strict),
        Cmds::Fmt => task_fmt::cmd_fmt(),
        Cmds::License => task_license::cmd_license(),
        Cmds::Prepush => task_prepush::cmd_prepush(),
        Cmds::Style => task_style::cmd_style(),
    }
}
