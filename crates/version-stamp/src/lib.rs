// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stamp a firmware build with the current repository revision.
//!
//! The short identifier of `HEAD` is written into a generated C header as
//! `#define DMX512_SW_VERSION "<id>"`.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use slog::Logger;
use thiserror::Error;

pub mod header;
pub mod revision;

pub use header::{render_header, MACRO_NAME};
pub use revision::{Git, RevisionError, RevisionSource, ShortRevision};

/// Header location used when none is given, relative to the current
/// directory.
pub const DEFAULT_OUTPUT_PATH: &str = "include/version.h";

#[derive(Error, Debug)]
pub enum StampError {
    #[error("version control unavailable")]
    VersionControlUnavailable(#[from] RevisionError),

    #[error("failed to write {}", path.display())]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Inputs for a single stamping run.
#[derive(Clone, Debug)]
pub struct StampOptions {
    /// Directory the revision query is issued from.
    pub repo_path: PathBuf,
    /// Header to (re)write.
    pub output_path: PathBuf,
    /// Version-control program to run.
    pub program: OsString,
    /// Requested identifier length; `None` defers to the tool.
    pub abbrev: Option<u8>,
    /// Upper bound on the revision query.
    pub timeout: Duration,
}

impl Default for StampOptions {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            program: OsString::from("git"),
            abbrev: None,
            timeout: Git::DEFAULT_TIMEOUT,
        }
    }
}

impl StampOptions {
    /// The [Git] revision source these options describe.
    pub fn git(&self) -> Git {
        Git::new()
            .with_program(self.program.clone())
            .abbrev(self.abbrev)
            .timeout(self.timeout)
    }
}

/// Writes version headers using revisions from `S`.
pub struct Stamper<S> {
    source: S,
    log: Logger,
}

impl<S: RevisionSource> Stamper<S> {
    pub fn new(source: S, log: Logger) -> Self {
        Self { source, log }
    }

    /// Resolve the revision of `repo` and write it to `output`, reporting
    /// progress as one line on `console`.
    ///
    /// Nothing is written to `output` unless the revision was resolved.
    pub fn stamp(
        &self,
        repo: &Path,
        output: &Path,
        console: &mut dyn Write,
    ) -> Result<ShortRevision, StampError> {
        slog::debug!(self.log, "querying revision";
            "repo" => %repo.display());
        let rev = self.source.resolve_short_revision(repo)?;
        slog::debug!(self.log, "resolved revision"; "rev" => %rev);

        if let Err(e) = writeln!(
            console,
            "Writing version {rev} to file {}",
            output.display()
        ) {
            slog::warn!(self.log, "failed to report progress";
                "error" => %e);
        }

        header::write_header(output, &render_header(&rev)).map_err(
            |source| StampError::OutputWriteFailed {
                path: output.to_path_buf(),
                source,
            },
        )?;
        slog::info!(self.log, "version header written";
            "path" => %output.display(),
            "rev" => %rev);

        Ok(rev)
    }
}

/// Stamp the header described by `opts`, reporting progress on stdout.
pub fn stamp_version(
    opts: &StampOptions,
    log: &Logger,
) -> Result<ShortRevision, StampError> {
    Stamper::new(opts.git(), log.clone()).stamp(
        &opts.repo_path,
        &opts.output_path,
        &mut io::stdout().lock(),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    use std::cell::Cell;

    fn test_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    /// Hands out a fixed answer and counts how often it was asked.
    struct FakeSource {
        answer: fn() -> Result<ShortRevision, RevisionError>,
        calls: Cell<usize>,
    }

    impl FakeSource {
        fn new(answer: fn() -> Result<ShortRevision, RevisionError>) -> Self {
            Self { answer, calls: Cell::new(0) }
        }
    }

    impl RevisionSource for FakeSource {
        fn resolve_short_revision(
            &self,
            _repo: &Path,
        ) -> Result<ShortRevision, RevisionError> {
            self.calls.set(self.calls.get() + 1);
            (self.answer)()
        }
    }

    fn fixed() -> Result<ShortRevision, RevisionError> {
        ShortRevision::parse("a1b2c3d\n")
    }

    fn garbled_answer() -> Result<ShortRevision, RevisionError> {
        let raw = "fatal: not a git repository";
        Err(RevisionError::InvalidIdentifier(raw.to_owned()))
    }

    #[test]
    fn writes_header_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("include")).unwrap();
        let output = dir.path().join("include/version.h");
        let source = FakeSource::new(fixed);
        let mut console = Vec::new();

        let rev = Stamper::new(&source, test_logger())
            .stamp(dir.path(), &output, &mut console)
            .unwrap();

        assert_eq!(rev.as_str(), "a1b2c3d");
        assert_eq!(source.calls.get(), 1);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "#define DMX512_SW_VERSION \"a1b2c3d\"\n"
        );
        assert_eq!(
            String::from_utf8(console).unwrap(),
            format!("Writing version a1b2c3d to file {}\n", output.display())
        );
    }

    #[test]
    fn relative_output_is_reported_verbatim() {
        // The status line precedes the write, which then fails.
        let source = FakeSource::new(fixed);
        let mut console = Vec::new();
        let output = Path::new("dmx-version-stamp-missing-dir/version.h");

        let res = Stamper::new(&source, test_logger()).stamp(
            Path::new("."),
            output,
            &mut console,
        );

        assert!(
            matches!(res, Err(StampError::OutputWriteFailed { .. })),
            "{res:?}"
        );

        assert_eq!(
            String::from_utf8(console).unwrap(),
            "Writing version a1b2c3d to file \
             dmx-version-stamp-missing-dir/version.h\n"
        );
    }

    #[test]
    fn repeated_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("version.h");
        let stamper = Stamper::new(FakeSource::new(fixed), test_logger());

        stamper.stamp(dir.path(), &output, &mut io::sink()).unwrap();
        let first = std::fs::read(&output).unwrap();
        stamper.stamp(dir.path(), &output, &mut io::sink()).unwrap();
        let second = std::fs::read(&output).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn revision_failure_leaves_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("version.h");
        std::fs::write(&output, "#define DMX512_SW_VERSION \"0000000\"")
            .unwrap();
        let mut console = Vec::new();

        let stamper =
            Stamper::new(FakeSource::new(garbled_answer), test_logger());
        let err = stamper
            .stamp(dir.path(), &output, &mut console)
            .unwrap_err();

        assert!(matches!(err, StampError::VersionControlUnavailable(_)));
        assert!(console.is_empty());
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "#define DMX512_SW_VERSION \"0000000\""
        );
    }

    #[test]
    fn revision_failure_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("version.h");

        let stamper =
            Stamper::new(FakeSource::new(garbled_answer), test_logger());
        let err = stamper
            .stamp(dir.path(), &output, &mut io::sink())
            .unwrap_err();

        assert!(matches!(err, StampError::VersionControlUnavailable(_)));
        assert!(!output.exists());
    }

    #[test]
    fn missing_output_directory_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("include").join("version.h");

        let err = Stamper::new(FakeSource::new(fixed), test_logger())
            .stamp(dir.path(), &output, &mut io::sink())
            .unwrap_err();

        match err {
            StampError::OutputWriteFailed { path, source } => {
                assert_eq!(path, output);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn default_options_match_observed_behavior() {
        let opts = StampOptions::default();
        assert_eq!(opts.repo_path, Path::new("."));
        assert_eq!(opts.output_path, Path::new("include/version.h"));
        assert_eq!(opts.program, "git");
        assert_eq!(opts.abbrev, None);
        assert_eq!(opts.git().program(), "git");
    }
}
