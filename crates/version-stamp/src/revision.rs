// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Querying the version-control tool for the current revision.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Interval between checks on a running revision query.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors produced while resolving the short revision identifier.
#[derive(Error, Debug)]
pub enum RevisionError {
    #[error("failed to launch {program:?}")]
    Launch {
        program: OsString,
        #[source]
        source: io::Error,
    },

    #[error("{program:?} exited with {status}: {stderr}")]
    Failed { program: OsString, status: ExitStatus, stderr: String },

    #[error("revision query output is not valid UTF-8")]
    NotUtf8(#[source] std::string::FromUtf8Error),

    #[error("revision query returned invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("revision query did not finish within {0:?}")]
    Timeout(Duration),

    #[error("I/O error during revision query")]
    Io(#[source] io::Error),
}

/// Abbreviated commit identifier, as reported by the version-control tool.
///
/// Always non-empty and made only of hexadecimal digits, so it can be
/// embedded in a C string literal without escaping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortRevision(String);

impl ShortRevision {
    /// Validates raw tool output, ignoring surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, RevisionError> {
        let id = raw.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RevisionError::InvalidIdentifier(id.to_owned()));
        }
        Ok(Self(id.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability to look up the short identifier of `HEAD` for a repository.
pub trait RevisionSource {
    fn resolve_short_revision(
        &self,
        repo: &Path,
    ) -> Result<ShortRevision, RevisionError>;
}

impl<T: RevisionSource + ?Sized> RevisionSource for &T {
    fn resolve_short_revision(
        &self,
        repo: &Path,
    ) -> Result<ShortRevision, RevisionError> {
        (**self).resolve_short_revision(repo)
    }
}

/// [RevisionSource] backed by `git rev-parse --short HEAD`.
#[derive(Clone, Debug)]
pub struct Git {
    program: OsString,
    abbrev: Option<u8>,
    timeout: Duration,
}

impl Git {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self {
            program: OsString::from("git"),
            abbrev: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Run `program` instead of looking up `git` on the search path.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Request an identifier of (at least) `abbrev` characters rather than
    /// the tool's default length.
    pub fn abbrev(mut self, abbrev: Option<u8>) -> Self {
        self.abbrev = abbrev;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    fn command(&self, repo: &Path) -> Command {
        let short = match self.abbrev {
            Some(n) => format!("--short={n}"),
            None => "--short".to_owned(),
        };
        let mut cmd = Command::new(&self.program);
        cmd.arg("rev-parse")
            .arg(short)
            .arg("HEAD")
            .current_dir(repo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Default for Git {
    fn default() -> Self {
        Self::new()
    }
}

impl RevisionSource for Git {
    fn resolve_short_revision(
        &self,
        repo: &Path,
    ) -> Result<ShortRevision, RevisionError> {
        let out = run_with_timeout(
            &mut self.command(repo),
            &self.program,
            self.timeout,
        )?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_owned();
            return Err(RevisionError::Failed {
                program: self.program.clone(),
                status: out.status,
                stderr,
            });
        }

        let stdout =
            String::from_utf8(out.stdout).map_err(RevisionError::NotUtf8)?;
        ShortRevision::parse(&stdout)
    }
}

struct Captured {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Spawn `cmd` and collect its output, giving up once `timeout` elapses.
///
/// The output pipes are drained on helper threads so a chatty child cannot
/// wedge itself against a full pipe while we poll for its exit. The deadline
/// also covers collecting that output: a background process which inherited
/// the pipes can hold them open long after the child itself has exited.
fn run_with_timeout(
    cmd: &mut Command,
    program: &OsStr,
    timeout: Duration,
) -> Result<Captured, RevisionError> {
    let mut child = cmd.spawn().map_err(|source| RevisionError::Launch {
        program: program.to_owned(),
        source,
    })?;

    let (tx, rx) = mpsc::channel();
    drain(child.stdout.take(), Pipe::Stdout, tx.clone());
    drain(child.stderr.take(), Pipe::Stderr, tx);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(RevisionError::Io)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                // Best effort: the child may have exited in the meantime.
                let _ = child.kill();
                let _ = child.wait();
                return Err(RevisionError::Timeout(timeout));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let (mut stdout, mut stderr) = (None, None);
    while stdout.is_none() || stderr.is_none() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let (pipe, res) = match rx.recv_timeout(remaining) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) => {
                return Err(RevisionError::Timeout(timeout));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(RevisionError::Io(io::Error::other(
                    "output reader exited without a result",
                )));
            }
        };
        let buf = res.map_err(RevisionError::Io)?;
        match pipe {
            Pipe::Stdout => stdout = Some(buf),
            Pipe::Stderr => stderr = Some(buf),
        }
    }

    Ok(Captured {
        status,
        stdout: stdout.unwrap_or_default(),
        stderr: stderr.unwrap_or_default(),
    })
}

#[derive(Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    which: Pipe,
    tx: Sender<(Pipe, io::Result<Vec<u8>>)>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let res = match pipe {
            Some(mut pipe) => pipe.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        // The receiver is gone if the query already timed out.
        let _ = tx.send((which, res));
    });
}
