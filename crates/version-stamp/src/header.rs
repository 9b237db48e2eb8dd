// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generation of the firmware version header.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::revision::ShortRevision;

/// Name of the preprocessor macro the firmware reads its version from.
pub const MACRO_NAME: &str = "DMX512_SW_VERSION";

/// Render the header contents: a single `#define` line.
pub fn render_header(rev: &ShortRevision) -> String {
    format!("#define {MACRO_NAME} \"{rev}\"\n")
}

/// Replace the file at `path` with `contents`.
///
/// The data is staged in a temporary file next to `path` and renamed into
/// place, so on failure `path` is either absent or holds its previous
/// contents. The parent directory is not created. If `path` is a symlink the
/// file it points at is replaced and the link itself is kept.
pub fn write_header(path: &Path, contents: &str) -> io::Result<()> {
    let target = resolve_symlink(path)?;
    let path = target.as_path();
    let dir = parent_dir(path);

    let mut staged = tempfile::Builder::new()
        .prefix(".version-stamp")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    staged.write_all(contents.as_bytes())?;
    if let Some(perms) = permissions_for(path) {
        staged.as_file().set_permissions(perms)?;
    }
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Follow `path` if it is a symlink, including one whose target does not
/// exist yet.
fn resolve_symlink(path: &Path) -> io::Result<PathBuf> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            match fs::canonicalize(path) {
                Ok(target) => Ok(target),
                Err(_) => Ok(parent_dir(path).join(fs::read_link(path)?)),
            }
        }
        _ => Ok(path.to_path_buf()),
    }
}

/// Keep the mode of an existing header, otherwise use that of a newly
/// created regular file (temporary files are created owner-only).
fn permissions_for(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
