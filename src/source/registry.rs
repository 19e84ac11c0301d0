// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source type registry.
//!
//! Maps declared type strings to the constructors of their source types. The
//! default registry knows about every source type sadb ships with.

use crate::{
    config::Settings,
    source::{
        flatpak::{self, FlatpakSource},
        snap::{self, SnapSource},
        Result, SourceDescriptor, SourceError, SourceType,
    },
};

use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter, Result as FmtResult},
};
use tracing::debug;

/// Build a source type from its descriptor.
pub type Constructor = fn(SourceDescriptor, &Settings) -> Result<Box<dyn SourceType>>;

/// Registry of available source types.
#[derive(Clone)]
pub struct SourceRegistry {
    constructors: BTreeMap<&'static str, Constructor>,
}

impl SourceRegistry {
    /// Construct new registry without any source types.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register constructor for declared type string.
    ///
    /// Replaces any constructor previously registered for the same type.
    pub fn register(&mut self, source_type: &'static str, constructor: Constructor) {
        self.constructors.insert(source_type, constructor);
    }

    /// List declared type strings this registry can build.
    pub fn source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Build source type for descriptor.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError::UnsupportedSourceType`] if declared type is
    ///   not registered.
    /// - Return [`SourceError`] if the source type rejects the descriptor.
    pub fn create(
        &self,
        descriptor: SourceDescriptor,
        settings: &Settings,
    ) -> Result<Box<dyn SourceType>> {
        let Some(constructor) = self.constructors.get(descriptor.source_type.as_str()) else {
            return Err(SourceError::UnsupportedSourceType {
                name: descriptor.name,
                source_type: descriptor.source_type,
            });
        };

        debug!(
            "build {} source {}",
            descriptor.source_type, descriptor.name
        );
        constructor(descriptor, settings)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(flatpak::TYPE, build_flatpak);
        registry.register(snap::TYPE, build_snap);
        registry
    }
}

impl Debug for SourceRegistry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_set().entries(self.constructors.keys()).finish()
    }
}

fn build_flatpak(descriptor: SourceDescriptor, settings: &Settings) -> Result<Box<dyn SourceType>> {
    Ok(Box::new(FlatpakSource::new(descriptor, settings)?))
}

fn build_snap(descriptor: SourceDescriptor, _: &Settings) -> Result<Box<dyn SourceType>> {
    Ok(Box::new(SnapSource::new(descriptor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{path::PathBuf, time::Duration};

    fn settings() -> Settings {
        Settings {
            repo_url: "https://example.org/sadb/".into(),
            db_location: PathBuf::from("/tmp/sadb.db"),
            flatpak_remotes_dir: PathBuf::from("/tmp/remotes.d"),
            language: "en".into(),
            timeout: Duration::from_secs(1),
            verbose: false,
        }
    }

    fn descriptor(source_type: &str) -> SourceDescriptor {
        SourceDescriptor {
            name: "test".into(),
            source_type: source_type.into(),
            repo_url: Some("https://example.org/repo/".into()),
            ..Default::default()
        }
    }

    #[test]
    fn default_registry_knows_builtin_types() {
        let registry = SourceRegistry::default();
        assert_eq!(
            registry.source_types().collect::<Vec<_>>(),
            vec!["flatpak", "snap"]
        );
    }

    #[test]
    fn create_dispatches_on_declared_type() -> anyhow::Result<()> {
        let registry = SourceRegistry::default();

        let flatpak = registry.create(descriptor("flatpak"), &settings())?;
        assert_eq!(flatpak.source_type(), "flatpak");
        assert_eq!(
            flatpak.config_path(),
            Some(PathBuf::from("/tmp/remotes.d/test.repo"))
        );

        let snap = registry.create(descriptor("snap"), &settings())?;
        assert_eq!(snap.source_type(), "snap");
        assert_eq!(snap.config_path(), None);

        Ok(())
    }

    #[test]
    fn create_rejects_unknown_type() {
        let result = SourceRegistry::default().create(descriptor("appimage"), &settings());
        assert!(matches!(
            result,
            Err(SourceError::UnsupportedSourceType { source_type, .. }) if source_type == "appimage"
        ));
    }
}
