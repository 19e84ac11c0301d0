// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package source backends.
//!
//! A __source__ is a package-manager remote that apps in the catalog are
//! installed from, e.g., the Flathub remote for Flatpak. Each source is
//! declared in the source feed through a [`SourceDescriptor`], which states
//! the configuration the machine _should_ have for it.
//!
//! # Source Types
//!
//! Every supported package-source ecosystem is a __source type__, modeled by
//! the [`SourceType`] trait. A source type knows how to render the canonical
//! on-disk configuration for a descriptor, how to write it, how to compare it
//! against what is currently on disk, and optionally how to enumerate the
//! packages installed through it. Source types are picked by the declared
//! type string through a [`SourceRegistry`].
//!
//! # Reconciliation
//!
//! Comparing the desired configuration against the actual one yields a
//! [`Reconciliation`]. Only [`Reconciliation::Matched`] means no work is
//! needed. Every other outcome is recoverable by writing the canonical
//! configuration again.

pub mod descriptor;
pub mod flatpak;
pub mod keyfile;
pub mod registry;
pub mod snap;
pub mod writer;

pub use descriptor::{SourceDescriptor, SourceFeed};
pub use flatpak::FlatpakSource;
pub use registry::SourceRegistry;
pub use snap::SnapSource;

use crate::catalog::{Catalog, InstalledApp};

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

/// Capability set of one package-source ecosystem.
pub trait SourceType: Debug {
    /// Descriptor this source was built from.
    fn descriptor(&self) -> &SourceDescriptor;

    /// Path to on-disk configuration, if the source type keeps one.
    fn config_path(&self) -> Option<PathBuf>;

    /// Render canonical configuration.
    ///
    /// Pure function of the descriptor. Never touches the disk.
    fn generate_config(&self) -> String;

    /// Write canonical configuration to disk.
    fn write_config(&self) -> Result<()>;

    /// Compare on-disk configuration against canonical configuration.
    fn check_config(&self) -> Result<Reconciliation>;

    /// Enumerate apps installed through this source type.
    ///
    /// Source types that cannot enumerate return nothing.
    fn enumerate_installed(&self, _catalog: &Catalog) -> Result<Vec<InstalledApp>> {
        Ok(Vec::new())
    }

    /// Name of source.
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Declared type string of source.
    fn source_type(&self) -> &str {
        &self.descriptor().source_type
    }
}

/// Outcome of comparing on-disk configuration against canonical one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// On-disk configuration satisfies the descriptor.
    Matched,

    /// No configuration file exists yet.
    Absent,

    /// Configuration file exists but cannot be parsed.
    ParseError { detail: String },

    /// Configuration file lacks the required section.
    SectionMissing { section: String },

    /// Required field differs from the descriptor.
    Mismatch {
        field: ConfigField,
        expected: Option<String>,
        actual: Option<String>,
    },
}

impl Reconciliation {
    /// Check if no remediation is needed.
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched)
    }

    /// Human readable reason for a failed check of named source.
    ///
    /// Returns nothing for [`Reconciliation::Matched`].
    pub fn reason(&self, source: &str) -> Option<String> {
        match self {
            Self::Matched => None,
            Self::Absent => Some(format!("No config file found for {source}")),
            Self::ParseError { .. } => Some(format!("Error parsing config file for {source}")),
            Self::SectionMissing { section } => Some(format!("No {section} section in {source}")),
            Self::Mismatch { field, .. } => Some(format!("{} does not match for {source}", field.label())),
        }
    }
}

/// Configuration fields that must match their declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    /// Repository URL. Mirrors listed as alternates are accepted.
    Url,

    /// Signing key. Exact match only.
    GpgKey,
}

impl ConfigField {
    /// Key of field in rendered configuration.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Url => "Url",
            Self::GpgKey => "GPGKey",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Url => "Repo URL",
            Self::GpgKey => "GPG Key",
        }
    }
}

impl Display for ConfigField {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.key())
    }
}

/// Source error types.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Declared type has no backend.
    #[error("unknown source type {source_type:?} for source {name}")]
    UnsupportedSourceType { name: String, source_type: String },

    /// Descriptor lacks a field the source type needs.
    #[error("source {name} is missing required field {field}")]
    MissingField { name: String, field: &'static str },

    /// Configuration file cannot be read.
    #[error("failed to read config file at {:?}", path.display())]
    ReadConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be written.
    #[error("failed to write config file at {:?}", path.display())]
    WriteConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration path is not writable for current user.
    #[error("permission denied for {:?}, run as root", path.display())]
    PermissionDenied { path: PathBuf },

    /// Installed app enumeration fails.
    #[error(transparent)]
    Import(#[from] crate::installed::ImportError),
}

/// Friendly result alias :3
pub type Result<T, E = SourceError> = std::result::Result<T, E>;
