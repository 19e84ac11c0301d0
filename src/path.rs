// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations for the files sadb reads and writes: the
//! settings file, the catalog database, and the Flatpak remote directory.

use std::path::PathBuf;

/// Default absolute path to the settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/sadb.toml";

/// Default directory that Flatpak reads system remote descriptors from.
pub const DEFAULT_FLATPAK_REMOTES_DIR: &str = "/etc/flatpak/remotes.d";

/// Determine default absolute path to the catalog database.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/sadb/sadb.db`. When sadb runs
/// through `sudo`, the invoking user's data directory is used instead of
/// root's, so the catalog always lands in the home of the person who asked
/// for it. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if data directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_db_location(sudo_user: Option<&str>) -> Result<PathBuf> {
    if let Some(user) = sudo_user {
        return Ok(PathBuf::from("/home")
            .join(user)
            .join(".local")
            .join("share")
            .join("sadb")
            .join("sadb.db"));
    }

    dirs::data_dir()
        .map(|path| path.join("sadb").join("sadb.db"))
        .ok_or(NoWayHome)
}

/// Turn a human title into a filesystem-safe file stem.
///
/// Lowercases the title and replaces spaces with underscores.
pub fn slugify(title: impl AsRef<str>) -> String {
    title.as_ref().to_lowercase().replace(' ', "_")
}

/// Check if name can be used as a file stem without leaving its directory.
///
/// Rejects empty names, `.` and `..`, and names containing a path separator
/// or a NUL byte.
pub fn is_plain_file_stem(name: impl AsRef<str>) -> bool {
    let name = name.as_ref();
    !(name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']))
}

/// No way to determine user's data directory.
///
/// # See Also
///
/// - [`dirs::data_dir`](https://docs.rs/dirs/latest/dirs/fn.data_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's data directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
