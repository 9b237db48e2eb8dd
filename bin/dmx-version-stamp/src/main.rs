// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use slog::{o, Drain, Level, Logger};
use version_stamp::{StampError, StampOptions, DEFAULT_OUTPUT_PATH};

/// Exit status when the revision could not be determined.
const EXIT_VCS_UNAVAILABLE: i32 = 3;
/// Exit status when the header could not be written.
const EXIT_WRITE_FAILED: i32 = 4;

#[derive(Debug, Parser)]
#[clap(about, version)]
/// Write the current repository revision into the firmware version header
struct Opt {
    /// Repository to query for the revision
    #[clap(short = 'C', long, default_value = ".", action)]
    repo: PathBuf,

    /// Header file to (over)write
    #[clap(short, long, default_value = DEFAULT_OUTPUT_PATH, action)]
    output: PathBuf,

    /// Minimum length of the revision identifier
    #[clap(long, value_parser = clap::value_parser!(u8).range(4..=64))]
    abbrev: Option<u8>,

    /// Seconds to wait for the version-control tool
    #[clap(long, default_value = "30", value_parser = parse_timeout)]
    timeout: Duration,

    /// Version-control program to run
    #[clap(long, default_value = "git", action)]
    git: OsString,

    /// Enable debugging
    #[clap(short, long, action)]
    debug: bool,
}

impl Opt {
    fn stamp_options(&self) -> StampOptions {
        StampOptions {
            repo_path: self.repo.clone(),
            output_path: self.output.clone(),
            program: self.git.clone(),
            abbrev: self.abbrev,
            timeout: self.timeout,
        }
    }
}

fn parse_timeout(secs: &str) -> anyhow::Result<Duration> {
    match secs.parse::<u64>()? {
        0 => Err(anyhow!("timeout must be at least one second")),
        n => Ok(Duration::from_secs(n)),
    }
}

/// Create a top-level logger that outputs to stderr
fn build_log(debug: bool) -> (Logger, slog_async::AsyncGuard) {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let level = if debug { Level::Debug } else { Level::Info };
    let drain = slog::LevelFilter(drain, level).fuse();
    let (drain, guard) = slog_async::Async::new(drain).build_with_guard();

    (Logger::root(drain.fuse(), o!()), guard)
}

fn exit_code(err: &StampError) -> i32 {
    match err {
        StampError::VersionControlUnavailable(_) => EXIT_VCS_UNAVAILABLE,
        StampError::OutputWriteFailed { .. } => EXIT_WRITE_FAILED,
    }
}

fn main() {
    let opt = Opt::parse();
    let (log, guard) = build_log(opt.debug);

    let res = version_stamp::stamp_version(&opt.stamp_options(), &log);
    if let Err(e) = &res {
        slog::error!(log, "version stamping failed"; "error" => %e);
    }

    // Flush pending log records before deciding how to exit.
    drop(log);
    drop(guard);

    if let Err(e) = res {
        let code = exit_code(&e);
        eprintln!("error: {:#}", anyhow::Error::new(e));
        std::process::exit(code);
    }
}
