// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file sadb reads at startup, and resolve
//! it into the [`Settings`] that every other component is handed by
//! reference.
//!
//! # General Layout
//!
//! The settings file is a TOML document with one mandatory `[system]` table,
//! and any number of optional `[user.<name>]` tables. User tables override
//! the system table for the user sadb acts on behalf of.
//!
//! ```toml
//! [system]
//! repo_url = "https://example.org/sadb/"
//!
//! [user.alice]
//! db_location = "$HOME/sadb.db"
//! ```

use crate::path::{
    default_db_location, DEFAULT_FLATPAK_REMOTES_DIR, DEFAULT_SETTINGS_PATH,
};

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::{debug, instrument};

/// Default download timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default language used to pick localized metadata.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Settings file layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SettingsFile {
    /// System wide settings.
    pub system: SystemSettings,

    /// Per-user overrides keyed by user name.
    #[serde(rename = "user", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub users: BTreeMap<String, UserSettings>,
}

impl FromStr for SettingsFile {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut file: SettingsFile = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        file.system.db_location = expand_opt(file.system.db_location)?;
        file.system.flatpak_remotes_dir = expand_opt(file.system.flatpak_remotes_dir)?;
        for user in file.users.values_mut() {
            user.db_location = expand_opt(user.db_location.take())?;
        }

        Ok(file)
    }
}

impl Display for SettingsFile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// System wide settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SystemSettings {
    /// Base URL that feeds are fetched relative to.
    pub repo_url: String,

    /// Location of catalog database.
    pub db_location: Option<String>,

    /// Directory to write Flatpak remote descriptors into.
    pub flatpak_remotes_dir: Option<String>,

    /// Language to pick localized metadata for.
    pub language: Option<String>,

    /// Connect and read timeout for downloads.
    pub timeout_secs: Option<u64>,
}

/// Per-user overrides.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct UserSettings {
    /// Base URL that feeds are fetched relative to.
    pub repo_url: Option<String>,

    /// Location of catalog database. Parent directory must already exist.
    pub db_location: Option<String>,
}

/// Resolved settings.
///
/// Constructed once at startup, and passed by reference to all components.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Settings {
    /// Base URL that feeds are fetched relative to.
    pub repo_url: String,

    /// Location of catalog database.
    pub db_location: PathBuf,

    /// Directory to write Flatpak remote descriptors into.
    pub flatpak_remotes_dir: PathBuf,

    /// Language to pick localized metadata for.
    pub language: String,

    /// Connect and read timeout for downloads.
    pub timeout: Duration,

    /// Verbose output. Not read from file.
    pub verbose: bool,
}

impl Settings {
    /// Load settings from default settings file for the current user.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError`] if settings cannot be loaded or resolved.
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_SETTINGS_PATH)
    }

    /// Load settings from a specific settings file for the current user.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NotFound`] if settings file does not exist.
    /// - Return [`ConfigError::Read`] if settings file cannot be read.
    /// - Return [`ConfigError`] if settings cannot be resolved.
    #[instrument(skip(path), level = "debug")]
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        debug!("read settings from {:?}", path.display());
        let file: SettingsFile = read_to_string(path)
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            })?
            .parse()?;

        let user = crate::privilege::current_user().map_err(|_| ConfigError::NoUser)?;
        let sudo_user = crate::privilege::sudo_user();
        Self::resolve(&file, &user, sudo_user.as_deref())
    }

    /// Resolve settings file for target user.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::InvalidPath`] if a user database location
    ///   points into a directory that does not exist.
    /// - Return [`ConfigError::NoWayHome`] if the default database location
    ///   cannot be determined.
    pub fn resolve(file: &SettingsFile, user: &str, sudo_user: Option<&str>) -> Result<Self> {
        let system = &file.system;
        let mut repo_url = system.repo_url.clone();
        let mut db_location = match &system.db_location {
            Some(location) => PathBuf::from(location),
            None => default_db_location(sudo_user).map_err(|_| ConfigError::NoWayHome)?,
        };

        if let Some(overrides) = file.users.get(user) {
            if let Some(url) = &overrides.repo_url {
                repo_url = url.clone();
            }

            if let Some(location) = &overrides.db_location {
                let location = PathBuf::from(location);
                check_parent_exists(&location, user)?;
                db_location = location;
            }
        }

        Ok(Self {
            repo_url,
            db_location,
            flatpak_remotes_dir: system
                .flatpak_remotes_dir
                .as_deref()
                .unwrap_or(DEFAULT_FLATPAK_REMOTES_DIR)
                .into(),
            language: system
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.into()),
            timeout: Duration::from_secs(system.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            verbose: false,
        })
    }
}

fn expand_opt(value: Option<String>) -> Result<Option<String>> {
    value
        .map(|value| {
            shellexpand::full(value.as_str())
                .map(|expanded| expanded.into_owned())
                .map_err(ConfigError::ShellExpansion)
        })
        .transpose()
}

fn check_parent_exists(path: &Path, section: &str) -> Result<()> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() || parent.exists() => Ok(()),
        None => Ok(()),
        Some(_) => Err(ConfigError::InvalidPath {
            path: path.to_path_buf(),
            section: section.into(),
        }),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file is missing.
    #[error("settings file not found, please create {:?} with the correct settings", path.display())]
    NotFound { path: PathBuf },

    /// Settings file cannot be read.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Path set for a user points nowhere.
    #[error("path {:?} for {section} does not exist", path.display())]
    InvalidPath { path: PathBuf, section: String },

    /// Default database location cannot be determined.
    #[error("cannot determine default database location")]
    NoWayHome,

    /// Current user cannot be determined.
    #[error("cannot determine current user")]
    NoUser,
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
