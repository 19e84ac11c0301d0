// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Atomic configuration writes.
//!
//! Configuration is first written to a temporary file in the target
//! directory, flushed to disk, and then renamed over the target. A failure at
//! any point before the rename leaves an existing configuration untouched.

use crate::source::{Result, SourceError};

use std::{
    fs::Permissions,
    io::{ErrorKind, Write},
    os::unix::fs::PermissionsExt,
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Mode of written configuration files. Package managers running as regular
/// users must be able to read them.
const CONFIG_MODE: u32 = 0o644;

/// Atomically create or replace file with new contents.
///
/// Creates the parent directory if it does not exist yet.
///
/// # Errors
///
/// - Return [`SourceError::PermissionDenied`] if the target directory is not
///   writable for the current user.
/// - Return [`SourceError::WriteConfig`] for any other I/O failure.
#[instrument(skip(path, contents), level = "debug")]
pub fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    let to_error = |err: std::io::Error| match err.kind() {
        ErrorKind::PermissionDenied => SourceError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => SourceError::WriteConfig {
            source: err,
            path: path.to_path_buf(),
        },
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    mkdirp::mkdirp(dir).map_err(to_error)?;

    debug!("stage new contents for {:?} in {:?}", path.display(), dir.display());
    let mut staged = NamedTempFile::new_in(dir).map_err(to_error)?;
    staged.write_all(contents.as_ref()).map_err(to_error)?;
    staged
        .as_file()
        .set_permissions(Permissions::from_mode(CONFIG_MODE))
        .map_err(to_error)?;
    staged.as_file().sync_all().map_err(to_error)?;

    // INVARIANT: Rename is the only step that touches the target path.
    staged.persist(path).map_err(|err| to_error(err.error))?;

    Ok(())
}
