// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! System Flatpak installation.
//!
//! Refs are listed through the `flatpak` command line tool. AppStream data of
//! an installed app is read straight out of its deployment below the
//! installation directory.

use crate::installed::{ImportError, Installation, InstalledRef, RefKind, Result};

use std::{
    ffi::{OsStr, OsString},
    fs::read,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument};

/// Directory of the system-wide Flatpak installation.
pub const SYSTEM_INSTALLATION: &str = "/var/lib/flatpak";

const LIST_COLUMNS: &str = "--columns=application,arch,branch,origin,active,latest";

/// Flatpak installation reached through the `flatpak` command.
#[derive(Debug, Clone)]
pub struct FlatpakCli {
    program: OsString,
    installation: PathBuf,
}

impl FlatpakCli {
    /// Construct handle to the system-wide installation.
    pub fn system() -> Self {
        Self::new("flatpak", SYSTEM_INSTALLATION)
    }

    /// Construct handle with specific program and installation directory.
    pub fn new(program: impl Into<OsString>, installation: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            installation: installation.into(),
        }
    }

    /// Candidate AppStream files of an installed ref, most specific first.
    pub fn appdata_paths(&self, installed: &InstalledRef) -> Vec<PathBuf> {
        let share = self
            .installation
            .join(installed.kind.directory())
            .join(&installed.name)
            .join(&installed.arch)
            .join(&installed.branch)
            .join("active")
            .join("files")
            .join("share");
        let name = &installed.name;

        vec![
            share.join("app-info").join("xmls").join(format!("{name}.xml.gz")),
            share.join("app-info").join("xmls").join(format!("{name}.xml")),
            share.join("metainfo").join(format!("{name}.metainfo.xml")),
            share.join("appdata").join(format!("{name}.appdata.xml")),
        ]
    }

    fn list(&self, kind: RefKind) -> Result<Vec<InstalledRef>> {
        let output = syscall_non_interactive(
            &self.program,
            ["list", "--system", kind.list_flag(), LIST_COLUMNS],
        )?;

        parse_list(&output, kind)
    }
}

impl Installation for FlatpakCli {
    #[instrument(skip(self), level = "debug")]
    fn installed_refs(&self) -> Result<Vec<InstalledRef>> {
        let mut refs = self.list(RefKind::App)?;
        refs.extend(self.list(RefKind::Runtime)?);
        debug!("found {} installed refs", refs.len());

        Ok(refs)
    }

    fn load_appdata(&self, installed: &InstalledRef) -> Result<Option<Vec<u8>>> {
        for path in self.appdata_paths(installed) {
            match read(&path) {
                Ok(data) => {
                    debug!("load appdata {:?}", path.display());
                    return Ok(Some(data));
                }
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(ImportError::AppData { source: err, path }),
            }
        }

        Ok(None)
    }
}

/// Parse tab separated output of `flatpak list`.
///
/// # Errors
///
/// - Return [`ImportError::ListFormat`] if a line lacks required columns.
pub fn parse_list(output: &str, kind: RefKind) -> Result<Vec<InstalledRef>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let columns = line.split('\t').map(str::trim).collect::<Vec<_>>();
            let [name, arch, branch, origin, rest @ ..] = columns.as_slice() else {
                return Err(ImportError::ListFormat { line: line.into() });
            };

            let active = rest.first().copied().unwrap_or_default();
            let latest = rest.get(1).copied().unwrap_or_default();

            Ok(InstalledRef {
                kind,
                name: (*name).into(),
                arch: (*arch).into(),
                branch: (*branch).into(),
                origin: (*origin).into(),
                is_current: is_current(active, latest),
            })
        })
        .collect()
}

// INVARIANT: Commits may be abbreviated, unknown latest commit means current.
fn is_current(active: &str, latest: &str) -> bool {
    latest.is_empty()
        || latest == "-"
        || active.is_empty()
        || active.starts_with(latest)
        || latest.starts_with(active)
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(output.stderr.as_slice());
        return Err(ImportError::Syscall(std::io::Error::other(format!(
            "command {:?} failed:\n{}",
            cmd.as_ref(),
            stderr.trim_end()
        ))));
    }

    Ok(stdout)
}

impl RefKind {
    fn list_flag(self) -> &'static str {
        match self {
            Self::App => "--app",
            Self::Runtime => "--runtime",
        }
    }

    fn directory(self) -> &'static Path {
        match self {
            Self::App => Path::new("app"),
            Self::Runtime => Path::new("runtime"),
        }
    }
}
