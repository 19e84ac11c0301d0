// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{SadbFixture, APP_FEED, GPG_KEY, SOURCE_FEED};

use sadb::{
    catalog::{feed::refresh_catalog, App, Catalog, StillRating},
    config::{Settings, SettingsFile},
    installed::{Importer, Installation, InstalledRef, RefKind},
    reconcile::{check_sources, generate_sources, CheckReport, ReconcileError},
    source::SourceRegistry,
};

use anyhow::Result;
use indoc::{formatdoc, indoc};
use pretty_assertions::assert_eq;
use simple_test_case::test_case;

#[test]
fn update_db_populates_catalog_from_feed() -> Result<()> {
    let fixture = SadbFixture::new()?;
    let mut catalog = fixture.open_catalog()?;
    catalog.add_app(&App::new("stale", "Stale", "flathub", "app/org.example.Stale/x86_64/stable"))?;
    catalog.clear()?;

    refresh_catalog(&mut catalog, APP_FEED)?;
    drop(catalog);

    let catalog = Catalog::open_read_only(&fixture.settings().db_location)?;
    let apps = catalog.all_apps()?;
    let ids = apps.iter().map(|app| app.app_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["firefox", "chrome"]);

    let firefox = catalog
        .find_app("flathub", "app/org.mozilla.firefox/x86_64/stable")?
        .expect("firefox is in catalog");
    assert_eq!(firefox.author, "Mozilla");
    assert_eq!(firefox.still_rating, StillRating::Gold);

    Ok(())
}

#[test]
fn flathub_without_section_is_repaired_by_generate() -> Result<()> {
    let fixture = SadbFixture::new()?;
    let registry = SourceRegistry::default();
    fixture.write_remote("flathub", "[Remote]\nUrl=https://dl.flathub.org/repo/\n")?;

    let result = check_sources(SOURCE_FEED, &registry, fixture.settings())?;
    assert_eq!(
        result,
        CheckReport::Failed {
            source: "flathub".into(),
            reason: "No Flatpak Repo section in flathub".into(),
        }
    );

    let report = generate_sources(SOURCE_FEED, &registry, fixture.settings())?;
    assert_eq!(report.written, vec!["flathub"]);
    assert_eq!(
        check_sources(SOURCE_FEED, &registry, fixture.settings())?,
        CheckReport::Passed
    );

    let expect = formatdoc! {r#"
        [Flatpak Repo]
        Title=flathub
        Url=https://dl.flathub.org/repo/
        Homepage=https://flathub.org/
        Description=Central repository of Flatpak applications
        GPGKey={GPG_KEY}
    "#};
    assert_eq!(fixture.read_remote("flathub")?, expect);

    Ok(())
}

#[test_case("https://dl.flathub.org/repo/", true; "canonical url")]
#[test_case("https://flathub.mirror.example.org/repo/", true; "mirror url")]
#[test_case("https://evil.example.org/repo/", false; "foreign url")]
#[test]
fn mirrors_are_accepted_on_disk(url: &str, expect: bool) {
    let fixture = SadbFixture::new().unwrap();
    fixture
        .write_remote(
            "flathub",
            format!("[Flatpak Repo]\nTitle=Flathub\nUrl={url}\nGPGKey={GPG_KEY}\n"),
        )
        .unwrap();

    let result = check_sources(SOURCE_FEED, &SourceRegistry::default(), fixture.settings()).unwrap();
    pretty_assertions::assert_eq!(result.passed(), expect);
}

#[test]
fn replaced_signing_key_is_never_accepted() -> Result<()> {
    let fixture = SadbFixture::new()?;
    fixture.write_remote(
        "flathub",
        "[Flatpak Repo]\nUrl=https://dl.flathub.org/repo/\nGPGKey=forged\n",
    )?;

    let result = check_sources(SOURCE_FEED, &SourceRegistry::default(), fixture.settings())?;
    assert_eq!(
        result,
        CheckReport::Failed {
            source: "flathub".into(),
            reason: "GPG Key does not match for flathub".into(),
        }
    );

    Ok(())
}

#[test]
fn block_scalar_signing_key_is_reconciled() -> Result<()> {
    let fixture = SadbFixture::new()?;
    let registry = SourceRegistry::default();
    let feed = indoc! {r#"
        flathub:
          type: flatpak
          repo_url: "https://dl.flathub.org/repo/ "
          gpg: |
            mQINBFlD2sABEADsiUZUO
            AAAABBBBCCCC
    "#};

    let report = generate_sources(feed, &registry, fixture.settings())?;
    assert_eq!(report.written, vec!["flathub"]);
    assert_eq!(check_sources(feed, &registry, fixture.settings())?, CheckReport::Passed);

    let expect = indoc! {r#"
        [Flatpak Repo]
        Title=flathub
        Url=https://dl.flathub.org/repo/
        GPGKey=mQINBFlD2sABEADsiUZUO
          AAAABBBBCCCC
    "#};
    assert_eq!(fixture.read_remote("flathub")?, expect);

    let report = generate_sources(feed, &registry, fixture.settings())?;
    assert_eq!(report.unchanged, vec!["flathub"]);

    Ok(())
}

#[test]
fn source_names_cannot_leave_remotes_dir() -> Result<()> {
    let fixture = SadbFixture::new()?;
    let feed = indoc! {r#"
        ../../escaped:
          type: flatpak
          repo_url: https://evil.example.org/repo/
    "#};

    let result = generate_sources(feed, &SourceRegistry::default(), fixture.settings());
    assert!(matches!(result, Err(ReconcileError::Deferred(_))));

    let remotes_dir = &fixture.settings().flatpak_remotes_dir;
    for dir in remotes_dir.ancestors().take(3) {
        assert!(!dir.join("escaped.repo").exists());
    }

    Ok(())
}

#[test]
fn broken_feed_fails_before_touching_disk() -> Result<()> {
    let fixture = SadbFixture::new()?;

    let result = generate_sources("flathub: [unclosed", &SourceRegistry::default(), fixture.settings());
    assert!(matches!(result, Err(ReconcileError::Feed(_))));
    assert!(!fixture.remote_path("flathub").exists());

    Ok(())
}

#[test]
fn settings_file_resolves_user_overrides() -> Result<()> {
    let fixture = SadbFixture::new()?;
    let data = formatdoc! {r#"
        [system]
        repo_url = "https://example.org/sadb/"
        db_location = "/var/lib/sadb/sadb.db"
        timeout_secs = 10

        [user.alice]
        repo_url = "https://mirror.example.org/sadb/"
        db_location = "{}/alice.db"
    "#, fixture.root().display()};
    let file: SettingsFile = data.parse()?;

    let alice = Settings::resolve(&file, "alice", None)?;
    assert_eq!(alice.repo_url, "https://mirror.example.org/sadb/");
    assert_eq!(alice.db_location, fixture.root().join("alice.db"));
    assert_eq!(alice.timeout.as_secs(), 10);

    let bob = Settings::resolve(&file, "bob", None)?;
    assert_eq!(bob.repo_url, "https://example.org/sadb/");
    assert_eq!(bob.db_location.to_str(), Some("/var/lib/sadb/sadb.db"));

    Ok(())
}

#[derive(Debug)]
struct StaticInstallation(Vec<InstalledRef>);

impl Installation for StaticInstallation {
    fn installed_refs(&self) -> sadb::installed::Result<Vec<InstalledRef>> {
        Ok(self.0.clone())
    }

    fn load_appdata(&self, _: &InstalledRef) -> sadb::installed::Result<Option<Vec<u8>>> {
        Ok(Some(
            indoc! {r#"
                <components>
                  <component type="desktop-application">
                    <name>Maps</name>
                    <developer_name>The GNOME Project</developer_name>
                  </component>
                </components>
            "#}
            .as_bytes()
            .to_vec(),
        ))
    }
}

#[test]
fn installed_apps_reuse_catalog_entries() -> Result<()> {
    let fixture = SadbFixture::new()?;
    let mut catalog = fixture.open_catalog()?;
    refresh_catalog(&mut catalog, APP_FEED)?;

    let installed = |name: &str, is_current| InstalledRef {
        kind: RefKind::App,
        name: name.into(),
        arch: "x86_64".into(),
        branch: "stable".into(),
        origin: "flathub".into(),
        is_current,
    };
    let installation = StaticInstallation(vec![
        installed("org.mozilla.firefox", false),
        installed("org.gnome.Maps", true),
    ]);

    let apps = Importer::new(installation, "en").enumerate(&catalog)?;
    catalog.replace_installed(&apps)?;

    let stored = catalog.installed_apps()?;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].app.app_id, "firefox");
    assert!(stored[0].update_available);
    assert_eq!(stored[1].app.app_id, "flathub-org-gnome-Maps");
    assert_eq!(stored[1].app.author, "The GNOME Project");
    assert!(!stored[1].update_available);

    Ok(())
}
