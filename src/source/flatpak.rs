// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Flatpak source type.
//!
//! Flatpak picks up system remotes from keyfiles placed in its remote
//! directory, `/etc/flatpak/remotes.d` by default. Each declared Flatpak
//! source is rendered into one such keyfile:
//!
//! ```ini
//! [Flatpak Repo]
//! Title=flathub
//! Url=https://dl.flathub.org/repo/
//! Homepage=https://flathub.org/
//! GPGKey=mQINBFlD2sABEADsiUZUO...
//! ```
//!
//! # Comparison Rules
//!
//! Only the fields that decide where packages come from are compared: the
//! repository URL, and the signing key when one is declared. The URL on disk
//! may be the canonical URL or any declared alternate URL, so mirrors are not
//! flagged. The signing key must match exactly. Informational fields such as
//! the title or homepage never cause a mismatch.

use crate::{
    catalog::{Catalog, InstalledApp},
    config::Settings,
    installed::{flatpak::FlatpakCli, Importer},
    path::slugify,
    source::{
        keyfile::Keyfile, writer::write_atomic, ConfigField, Reconciliation, Result,
        SourceDescriptor, SourceError, SourceType,
    },
};

use std::{
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Declared type string of Flatpak sources.
pub const TYPE: &str = "flatpak";

/// Section that holds remote configuration.
pub const SECTION: &str = "Flatpak Repo";

/// Extension of rendered remote keyfiles.
pub const EXTENSION: &str = "repo";

/// Flatpak remote source.
#[derive(Debug, Clone)]
pub struct FlatpakSource {
    descriptor: SourceDescriptor,
    repo_url: String,
    config_folder: PathBuf,
    language: String,
}

impl FlatpakSource {
    /// Construct new Flatpak source.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError::MissingField`] if descriptor lacks `repo_url`.
    pub fn new(descriptor: SourceDescriptor, settings: &Settings) -> Result<Self> {
        Self::with_config_folder(descriptor, &settings.flatpak_remotes_dir)
            .map(|source| source.with_language(&settings.language))
    }

    /// Construct new Flatpak source writing into a specific folder.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError::MissingField`] if descriptor lacks `repo_url`.
    pub fn with_config_folder(
        descriptor: SourceDescriptor,
        config_folder: impl Into<PathBuf>,
    ) -> Result<Self> {
        let repo_url = descriptor
            .repo_url
            .clone()
            .ok_or_else(|| SourceError::MissingField {
                name: descriptor.name.clone(),
                field: "repo_url",
            })?;

        Ok(Self {
            descriptor,
            repo_url,
            config_folder: config_folder.into(),
            language: crate::config::DEFAULT_LANGUAGE.into(),
        })
    }

    /// Pick language for localized metadata of installed apps.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Folder that remote keyfiles are written into.
    pub fn config_folder(&self) -> &Path {
        &self.config_folder
    }

    /// Canonical keyfile for this source.
    pub fn keyfile(&self) -> Keyfile {
        let descriptor = &self.descriptor;
        let mut keyfile = Keyfile::new();
        let section = keyfile.section_mut(SECTION);
        section.set("Title", descriptor.name.as_str());
        section.set(ConfigField::Url.key(), self.repo_url.as_str());
        section.set_opt("Homepage", descriptor.homepage.as_deref());
        section.set_opt("Description", descriptor.description.as_deref());
        section.set_opt("Comment", descriptor.comment.as_deref());
        section.set_opt("Icon", descriptor.icon_url.as_deref());
        section.set_opt(ConfigField::GpgKey.key(), descriptor.gpg.as_deref());
        keyfile
    }

    /// Compare keyfile contents against the descriptor.
    ///
    /// Pure counterpart of [`SourceType::check_config`], for content that has
    /// already been read.
    pub fn reconcile(&self, on_disk: &str) -> Reconciliation {
        let keyfile: Keyfile = match on_disk.parse() {
            Ok(keyfile) => keyfile,
            Err(err) => {
                return Reconciliation::ParseError {
                    detail: err.to_string(),
                }
            }
        };

        let Some(section) = keyfile.section(SECTION) else {
            return Reconciliation::SectionMissing {
                section: SECTION.into(),
            };
        };

        // INVARIANT: Canonical URL or any alternate URL is acceptable.
        let url = section.get(ConfigField::Url.key());
        if !url.is_some_and(|url| self.descriptor.accepts_url(url)) {
            return Reconciliation::Mismatch {
                field: ConfigField::Url,
                expected: Some(self.repo_url.clone()),
                actual: url.map(Into::into),
            };
        }

        // INVARIANT: Declared signing key must match exactly, no tolerance.
        if let Some(expected) = &self.descriptor.gpg {
            let actual = section.get(ConfigField::GpgKey.key());
            if actual != Some(expected.as_str()) {
                return Reconciliation::Mismatch {
                    field: ConfigField::GpgKey,
                    expected: Some(expected.clone()),
                    actual: actual.map(Into::into),
                };
            }
        }

        Reconciliation::Matched
    }
}

impl SourceType for FlatpakSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn config_path(&self) -> Option<PathBuf> {
        Some(
            self.config_folder
                .join(format!("{}.{EXTENSION}", slugify(&self.descriptor.name))),
        )
    }

    fn generate_config(&self) -> String {
        self.keyfile().to_string()
    }

    #[instrument(skip(self), fields(source = %self.descriptor.name), level = "debug")]
    fn write_config(&self) -> Result<()> {
        let Some(path) = self.config_path() else {
            return Ok(());
        };

        info!("write flatpak remote {:?}", path.display());
        write_atomic(&path, self.generate_config())
    }

    #[instrument(skip(self), fields(source = %self.descriptor.name), level = "debug")]
    fn check_config(&self) -> Result<Reconciliation> {
        let Some(path) = self.config_path() else {
            return Ok(Reconciliation::Matched);
        };

        debug!("check flatpak remote {:?}", path.display());
        let content = match read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Reconciliation::Absent),
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                return Ok(Reconciliation::ParseError {
                    detail: err.to_string(),
                })
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Err(SourceError::PermissionDenied { path })
            }
            Err(err) => return Err(SourceError::ReadConfig { source: err, path }),
        };

        Ok(self.reconcile(&content))
    }

    fn enumerate_installed(&self, catalog: &Catalog) -> Result<Vec<InstalledApp>> {
        let importer = Importer::new(FlatpakCli::system(), &self.language);
        Ok(importer.enumerate(catalog)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::{collections::BTreeSet, fs::write};

    const CANONICAL: &str = "https://dl.flathub.org/repo/";
    const MIRROR_A: &str = "https://mirror-a.example/repo/";
    const MIRROR_B: &str = "https://mirror-b.example/repo/";
    const KEY: &str = "mQINBFlD2sABEADsiUZUO";

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor {
            name: "Flathub Beta".into(),
            source_type: TYPE.into(),
            repo_url: Some(CANONICAL.into()),
            alt_urls: BTreeSet::from([MIRROR_A.into(), MIRROR_B.into()]),
            homepage: Some("https://flathub.org/".into()),
            comment: Some("Beta builds".into()),
            gpg: Some(KEY.into()),
            ..Default::default()
        }
    }

    fn source(folder: impl Into<PathBuf>) -> FlatpakSource {
        FlatpakSource::with_config_folder(descriptor(), folder).unwrap()
    }

    fn on_disk(url: &str, key: &str) -> String {
        format!("[Flatpak Repo]\nTitle=whatever\nUrl={url}\nGPGKey={key}\n")
    }

    #[test]
    fn generate_config_renders_declared_fields_in_order() {
        let result = source("/etc/flatpak/remotes.d").generate_config();
        let expect = indoc! {r#"
            [Flatpak Repo]
            Title=Flathub Beta
            Url=https://dl.flathub.org/repo/
            Homepage=https://flathub.org/
            Comment=Beta builds
            GPGKey=mQINBFlD2sABEADsiUZUO
        "#};

        assert_eq!(result, expect);
    }

    #[test]
    fn config_path_uses_slugified_title() {
        let result = source("/etc/flatpak/remotes.d").config_path();
        let expect = Some(PathBuf::from("/etc/flatpak/remotes.d/flathub_beta.repo"));

        assert_eq!(result, expect);
    }

    #[test]
    fn missing_repo_url_is_rejected() {
        let mut descriptor = descriptor();
        descriptor.repo_url = None;

        let result = FlatpakSource::with_config_folder(descriptor, "/tmp");
        assert!(matches!(
            result,
            Err(SourceError::MissingField { field: "repo_url", .. })
        ));
    }

    #[test_case(CANONICAL; "canonical url")]
    #[test_case(MIRROR_A; "first mirror")]
    #[test_case(MIRROR_B; "second mirror")]
    #[test]
    fn reconcile_accepts_known_urls(url: &str) {
        let result = source("/tmp").reconcile(&on_disk(url, KEY));
        pretty_assertions::assert_eq!(result, Reconciliation::Matched);
    }

    #[test_case("https://evil.example/repo/"; "foreign url")]
    #[test_case("https://dl.flathub.org/repo"; "missing trailing slash")]
    #[test_case("HTTPS://DL.FLATHUB.ORG/REPO/"; "different case")]
    #[test]
    fn reconcile_rejects_unknown_urls(url: &str) {
        let result = source("/tmp").reconcile(&on_disk(url, KEY));
        let expect = Reconciliation::Mismatch {
            field: ConfigField::Url,
            expected: Some(CANONICAL.into()),
            actual: Some(url.into()),
        };

        pretty_assertions::assert_eq!(result, expect);
    }

    #[test_case(CANONICAL; "canonical url")]
    #[test_case(MIRROR_A; "mirror url")]
    #[test]
    fn reconcile_rejects_wrong_key_regardless_of_url(url: &str) {
        let result = source("/tmp").reconcile(&on_disk(url, "forged"));
        let expect = Reconciliation::Mismatch {
            field: ConfigField::GpgKey,
            expected: Some(KEY.into()),
            actual: Some("forged".into()),
        };

        pretty_assertions::assert_eq!(result, expect);
    }

    #[test]
    fn reconcile_rejects_missing_declared_key() {
        let result = source("/tmp").reconcile(&format!("[Flatpak Repo]\nUrl={CANONICAL}\n"));
        let expect = Reconciliation::Mismatch {
            field: ConfigField::GpgKey,
            expected: Some(KEY.into()),
            actual: None,
        };

        assert_eq!(result, expect);
    }

    #[test]
    fn reconcile_ignores_on_disk_key_when_none_declared() {
        let mut descriptor = descriptor();
        descriptor.gpg = None;
        let source = FlatpakSource::with_config_folder(descriptor, "/tmp").unwrap();

        let result = source.reconcile(&on_disk(CANONICAL, "anything"));
        assert_eq!(result, Reconciliation::Matched);
    }

    #[test]
    fn reconcile_reports_missing_url() {
        let result = source("/tmp").reconcile(&format!("[Flatpak Repo]\nGPGKey={KEY}\n"));
        let expect = Reconciliation::Mismatch {
            field: ConfigField::Url,
            expected: Some(CANONICAL.into()),
            actual: None,
        };

        assert_eq!(result, expect);
    }

    #[test]
    fn reconcile_reports_missing_section() {
        let result = source("/tmp").reconcile("[Other Repo]\nUrl=https://x/\n");
        let expect = Reconciliation::SectionMissing {
            section: SECTION.into(),
        };

        assert_eq!(result, expect);
    }

    #[test]
    fn reconcile_reports_parse_error() {
        let result = source("/tmp").reconcile("this is not a keyfile\n");
        assert!(matches!(result, Reconciliation::ParseError { .. }));
    }

    #[test]
    fn check_config_reports_absent_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = source(dir.path()).check_config()?;
        assert_eq!(result, Reconciliation::Absent);

        Ok(())
    }

    #[test]
    fn check_config_after_write_config_matches() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = source(dir.path());

        source.write_config()?;
        assert_eq!(source.check_config()?, Reconciliation::Matched);

        Ok(())
    }

    #[test]
    fn write_config_is_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = source(dir.path());
        let path = source.config_path().unwrap();

        source.write_config()?;
        let first = std::fs::read(&path)?;
        source.write_config()?;
        let second = std::fs::read(&path)?;

        assert_eq!(first, second);
        assert_eq!(first, source.generate_config().into_bytes());

        Ok(())
    }

    #[test]
    fn check_config_reports_binary_garbage_as_parse_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = source(dir.path());
        write(source.config_path().unwrap(), [0xff, 0xfe, 0x00, 0x80])?;

        let result = source.check_config()?;
        assert!(matches!(result, Reconciliation::ParseError { .. }));

        Ok(())
    }
}
