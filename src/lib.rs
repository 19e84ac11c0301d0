// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Curated app catalog with package source reconciliation.
//!
//! sadb keeps two things in line with a curated repository: the package
//! sources configured on this machine, and a local catalog of the apps those
//! sources provide.
//!
//! # Sources
//!
//! The repository publishes a source feed declaring every package source a
//! machine should have, e.g., the Flathub remote for Flatpak. The
//! [`reconcile`] module compares the declared sources against their on-disk
//! configuration, and writes the canonical configuration for every source
//! that does not match.
//!
//! # Catalog
//!
//! The repository also publishes an app feed. The [`catalog`] module stores
//! it in a local SQLite database, together with a listing of the apps that
//! are actually installed on this machine, see [`installed`].

pub mod catalog;
pub mod config;
pub mod download;
pub mod installed;
pub mod path;
pub mod privilege;
pub mod reconcile;
pub mod source;

pub use catalog::{App, Catalog, InstalledApp};
pub use config::Settings;
pub use reconcile::{check_sources, generate_sources, CheckReport};
pub use source::{SourceDescriptor, SourceRegistry, SourceType};
