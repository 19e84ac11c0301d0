// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installed app discovery.
//!
//! Apps installed on this machine are recorded in the catalog's `installed`
//! table. For every installed application ref, the [`Importer`] reuses the
//! catalog entry when the feed knows the app. Otherwise, an entry is
//! synthesized from the AppStream metadata the app ships with, or from a
//! placeholder when no usable metadata exists.
//!
//! Installations are reached through the [`Installation`] trait so that the
//! importer does not care how refs are listed.

pub mod appstream;
pub mod flatpak;

use crate::{
    catalog::{App, Catalog, CatalogError, InstalledApp},
    source::{SourceError, SourceType},
};

use appstream::{parse_component, Component};
use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{debug, info, instrument, warn};

/// Kind of installed ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    App,
    Runtime,
}

impl Display for RefKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::App => fmt.write_str("app"),
            Self::Runtime => fmt.write_str("runtime"),
        }
    }
}

/// Ref deployed in an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRef {
    pub kind: RefKind,
    pub name: String,
    pub arch: String,
    pub branch: String,

    /// Remote the ref was installed from.
    pub origin: String,

    /// Deployed commit is the latest one known.
    pub is_current: bool,
}

impl InstalledRef {
    /// Full ref, e.g., `app/org.mozilla.firefox/x86_64/stable`.
    pub fn format_ref(&self) -> String {
        format!("{}/{}/{}/{}", self.kind, self.name, self.arch, self.branch)
    }

    /// App id used for entries synthesized from this ref.
    pub fn app_id(&self) -> String {
        format!("{}-{}", self.origin, self.name.replace('.', "-"))
    }
}

/// Installation that apps can be discovered in.
pub trait Installation {
    /// List every installed ref.
    fn installed_refs(&self) -> Result<Vec<InstalledRef>>;

    /// Load AppStream data shipped with ref, if there is any.
    fn load_appdata(&self, installed: &InstalledRef) -> Result<Option<Vec<u8>>>;
}

/// Turn installed refs into catalog entries.
#[derive(Debug, Clone)]
pub struct Importer<I> {
    installation: I,
    language: String,
}

impl<I: Installation> Importer<I> {
    /// Construct new importer over installation.
    pub fn new(installation: I, language: impl Into<String>) -> Self {
        Self {
            installation,
            language: language.into(),
        }
    }

    /// Enumerate installed apps.
    ///
    /// Runtimes are skipped. Apps sharing a source and package name are
    /// reported once, first occurrence wins.
    ///
    /// # Errors
    ///
    /// - Return [`ImportError`] if refs cannot be listed, or catalog cannot
    ///   be queried.
    #[instrument(skip(self, catalog), level = "debug")]
    pub fn enumerate(&self, catalog: &Catalog) -> Result<Vec<InstalledApp>> {
        let mut seen = HashSet::new();
        let mut apps = Vec::new();

        for installed in self.installation.installed_refs()? {
            if installed.kind != RefKind::App {
                debug!("skip {}", installed.format_ref());
                continue;
            }

            let src_pkg_name = installed.format_ref();
            let app = match catalog.find_app(&installed.origin, &src_pkg_name)? {
                Some(app) => app,
                None => self.synthesize(&installed),
            };

            if !seen.insert((app.primary_src.clone(), app.src_pkg_name.clone())) {
                warn!("skip duplicate installed app {app}");
                continue;
            }

            apps.push(InstalledApp::new(app, !installed.is_current));
        }

        Ok(apps)
    }

    fn synthesize(&self, installed: &InstalledRef) -> App {
        let data = match self.installation.load_appdata(installed) {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!("no appdata for {}", installed.format_ref());
                return placeholder(installed);
            }
            Err(err) => {
                warn!("cannot load appdata for {}: {err}", installed.format_ref());
                return placeholder(installed);
            }
        };

        match parse_component(&data, &self.language) {
            Ok(component) => from_component(installed, component),
            Err(err) => {
                warn!("cannot parse appdata for {}: {err}", installed.format_ref());
                placeholder(installed)
            }
        }
    }
}

fn placeholder(installed: &InstalledRef) -> App {
    let mut app = App::new(
        installed.app_id(),
        installed.name.as_str(),
        installed.origin.as_str(),
        installed.format_ref(),
    );
    app.author = "Unknown Author".into();
    app.summary = installed.name.clone();
    app.description = "This is an unknown app".into();
    app.categories = vec!["Unknown".into()];
    app
}

fn from_component(installed: &InstalledRef, component: Component) -> App {
    let name = if component.name.is_empty() {
        installed.name.clone()
    } else {
        component.name
    };

    let mut app = App::new(
        installed.app_id(),
        name,
        installed.origin.as_str(),
        installed.format_ref(),
    );
    app.icon_url = component.icon;
    app.author = component.developer;
    app.summary = component.summary;
    app.description = component.description;
    app.categories = component.categories;
    app.keywords = component.keywords;
    app.mimetypes = component.mediatypes;
    if !component.project_license.is_empty() {
        app.app_license = component.project_license;
    }
    app.homepage = component.homepage;
    app.donate_url = component.donate_url;
    app.screenshot_urls = component.screenshot_urls;
    app
}

/// Rebuild the installed table from every source type.
///
/// Only the first source of each declared type is asked, since sources of
/// the same type share one installation. Returns number of recorded apps.
///
/// # Errors
///
/// - Return [`SourceError`] if any source type fails to enumerate, or the
///   catalog cannot be updated. The installed table is left untouched then.
#[instrument(skip(catalog, sources), level = "debug")]
pub fn refresh_installed(
    catalog: &mut Catalog,
    sources: &[Box<dyn SourceType>],
) -> std::result::Result<usize, SourceError> {
    let mut asked = HashSet::new();
    let mut apps = Vec::new();

    for source in sources {
        if !asked.insert(source.source_type().to_string()) {
            continue;
        }

        debug!("enumerate installed apps of {} sources", source.source_type());
        apps.extend(source.enumerate_installed(catalog)?);
    }

    let recorded = catalog
        .replace_installed(&apps)
        .map_err(ImportError::Catalog)?;
    info!("recorded {recorded} installed apps");

    Ok(recorded)
}

/// Installed app import error types.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Catalog cannot be queried or updated.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Package manager command fails.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),

    /// Package manager output cannot be understood.
    #[error("unexpected installed ref listing {line:?}")]
    ListFormat { line: String },

    /// AppStream data exists but cannot be read.
    #[error("failed to read appdata at {:?}", path.display())]
    AppData {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ImportError> = std::result::Result<T, E>;
