// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Privilege and identity helpers.
//!
//! Writing Flatpak remotes requires root, but the catalog belongs to the user
//! who asked for it. These helpers figure out who that user is when sadb runs
//! under `sudo`, and hand ownership of freshly created files back to them.

use std::{env, os::unix::fs::chown, path::Path};
use tracing::debug;

/// Determine name of the user sadb acts on behalf of.
///
/// Prefers `SUDO_USER` so that `sudo sadb update` still resolves to the
/// invoking user, then falls back to `USER` and `LOGNAME`.
///
/// # Errors
///
/// - Return [`PrivilegeError::NoUser`] if no user can be determined.
pub fn current_user() -> Result<String> {
    ["SUDO_USER", "USER", "LOGNAME"]
        .into_iter()
        .find_map(|var| env::var(var).ok().filter(|user| !user.is_empty()))
        .ok_or(PrivilegeError::NoUser)
}

/// Name of the user that invoked `sudo`, if any.
pub fn sudo_user() -> Option<String> {
    env::var("SUDO_USER").ok().filter(|user| !user.is_empty())
}

/// Check if sadb was started through `sudo`.
pub fn is_sudo_root() -> bool {
    sudo_user().is_some()
}

/// Check if the effective user is root.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Require root before touching system configuration.
///
/// # Errors
///
/// - Return [`PrivilegeError::NotRoot`] if effective user is not root.
pub fn require_root() -> Result<()> {
    if is_root() {
        Ok(())
    } else {
        Err(PrivilegeError::NotRoot)
    }
}

/// Give ownership of a path back to the user that invoked `sudo`.
///
/// Does nothing outside of `sudo`, or when `SUDO_UID` is unavailable.
///
/// # Errors
///
/// - Return [`PrivilegeError::Chown`] if ownership cannot be changed.
pub fn fix_perms(path: impl AsRef<Path>) -> Result<()> {
    let Some(uid) = env::var("SUDO_UID")
        .ok()
        .and_then(|uid| uid.parse::<u32>().ok())
    else {
        return Ok(());
    };

    debug!("hand {:?} over to uid {uid}", path.as_ref().display());
    chown(path.as_ref(), Some(uid), None).map_err(|err| PrivilegeError::Chown {
        source: err,
        path: path.as_ref().to_path_buf(),
    })
}

/// Privilege error types.
#[derive(Debug, thiserror::Error)]
pub enum PrivilegeError {
    /// No user name could be found in the environment.
    #[error("cannot determine current user")]
    NoUser,

    /// Operation requires root.
    #[error("this command must be run as root")]
    NotRoot,

    /// Ownership of a path could not be changed.
    #[error("failed to change owner of {:?}", path.display())]
    Chown {
        #[source]
        source: std::io::Error,
        path: std::path::PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PrivilegeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("SUDO_USER", "alice"), ("USER", "root")])]
    fn current_user_prefers_sudo_user() -> anyhow::Result<()> {
        assert_eq!(current_user()?, "alice");
        assert!(is_sudo_root());

        Ok(())
    }

    #[sealed_test(env = [("SUDO_USER", ""), ("USER", "bob")])]
    fn current_user_falls_back_to_user() -> anyhow::Result<()> {
        assert_eq!(current_user()?, "bob");
        assert!(!is_sudo_root());

        Ok(())
    }

    #[sealed_test(env = [("SUDO_UID", "")])]
    fn fix_perms_without_sudo_is_noop() -> anyhow::Result<()> {
        fix_perms("/definitely/not/here")?;

        Ok(())
    }
}
