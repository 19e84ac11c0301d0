// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! App feed parsing.
//!
//! The app feed is a YAML mapping of app ids to app attributes:
//!
//! ```yaml
//! firefox:
//!   name: Firefox
//!   primary_src: flathub
//!   src_pkg_name: app/org.mozilla.firefox/x86_64/stable
//!   author: Mozilla
//!   pricing: 1
//!   mobile: 3
//!   still_rating: 4
//! ```
//!
//! Closed enumerations are given as their integer codes. Apps keep the order
//! they are declared in.

use crate::catalog::{App, Catalog, CatalogError, Result};

use serde_yaml_ng::{Mapping, Value};
use std::{fs::read_to_string, path::Path};
use tracing::{info, instrument};

/// Parse app feed.
///
/// # Errors
///
/// - Return [`CatalogError::Yaml`] if feed is not a mapping of app ids to
///   valid app attributes, including unknown enumeration codes.
/// - Return [`CatalogError::InvalidAppId`] if an app id is not a scalar.
pub fn apps_from_yaml(yaml: &str) -> Result<Vec<App>> {
    // INVARIANT: An empty document is an empty feed, not an error.
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mapping: Mapping = serde_yaml_ng::from_str(yaml)?;
    mapping
        .into_iter()
        .map(|(key, value)| {
            let app_id = match key {
                Value::String(app_id) => app_id,
                Value::Number(number) => number.to_string(),
                other => return Err(CatalogError::InvalidAppId(format!("{other:?}"))),
            };

            let mut app: App = serde_yaml_ng::from_value(value)?;
            app.app_id = app_id;
            Ok(app)
        })
        .collect()
}

/// Parse app feed stored at path.
///
/// # Errors
///
/// - Return [`CatalogError::Io`] if file cannot be read.
/// - Return [`CatalogError::Yaml`] if feed cannot be parsed.
pub fn apps_from_yaml_path(path: impl AsRef<Path>) -> Result<Vec<App>> {
    let path = path.as_ref();
    let data = read_to_string(path).map_err(|err| CatalogError::Io {
        source: err,
        path: path.to_path_buf(),
    })?;

    apps_from_yaml(&data)
}

/// Render single app as a one-entry feed.
///
/// # Errors
///
/// - Return [`CatalogError::Yaml`] if app cannot be serialized.
pub fn app_to_yaml(app: &App) -> Result<String> {
    let mut mapping = Mapping::new();
    mapping.insert(
        Value::String(app.app_id.clone()),
        serde_yaml_ng::to_value(app)?,
    );

    Ok(serde_yaml_ng::to_string(&mapping)?)
}

/// Replace every app in catalog with the apps of the feed.
///
/// The feed is parsed completely before the catalog is touched, so a broken
/// feed leaves the catalog as it was. Returns number of apps stored.
///
/// # Errors
///
/// - Return [`CatalogError::Yaml`] if feed cannot be parsed.
/// - Return [`CatalogError::Sqlite`] if catalog cannot be updated.
#[instrument(skip(catalog, yaml), level = "debug")]
pub fn refresh_catalog(catalog: &mut Catalog, yaml: &str) -> Result<usize> {
    let apps = apps_from_yaml(yaml)?;
    info!("app feed declares {} apps", apps.len());
    catalog.replace_apps(&apps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MobileSupport, Pricing, StillRating};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const FEED: &str = indoc! {r#"
        firefox:
          name: Firefox
          primary_src: flathub
          src_pkg_name: app/org.mozilla.firefox/x86_64/stable
          author: Mozilla
          categories: [Network, WebBrowser]
          license: MPL-2.0
          pricing: 1
          mobile: 3
          still_rating: 4
        chrome:
          name: Chrome
          primary_src: flathub
          src_pkg_name: app/com.google.Chrome/x86_64/stable
          author: Google
          still_rating: 1
    "#};

    #[test]
    fn apps_from_yaml_keeps_order_and_ids() -> anyhow::Result<()> {
        let apps = apps_from_yaml(FEED)?;

        let ids = apps.iter().map(|app| app.app_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["firefox", "chrome"]);

        let firefox = &apps[0];
        assert_eq!(firefox.categories, vec!["Network", "WebBrowser"]);
        assert_eq!(firefox.app_license, "MPL-2.0");
        assert_eq!(firefox.pricing, Pricing::Free);
        assert_eq!(firefox.mobile, MobileSupport::Hybrid);
        assert_eq!(firefox.still_rating, StillRating::Gold);

        let chrome = &apps[1];
        assert_eq!(chrome.app_license, "Proprietary");
        assert_eq!(chrome.pricing, Pricing::Unknown);
        assert_eq!(chrome.still_rating, StillRating::Caution);

        Ok(())
    }

    #[test]
    fn apps_from_yaml_rejects_unknown_codes() {
        let feed = indoc! {r#"
            broken:
              name: Broken
              primary_src: flathub
              src_pkg_name: app/broken
              pricing: 99
        "#};

        assert!(matches!(apps_from_yaml(feed), Err(CatalogError::Yaml(_))));
    }

    #[test]
    fn apps_from_yaml_treats_null_as_absent() -> anyhow::Result<()> {
        let feed = indoc! {r#"
            firefox:
              name: Firefox
              primary_src: flathub
              src_pkg_name: app/org.mozilla.firefox/x86_64/stable
              homepage: null
              donate_url:
              categories: ~
              license: null
              pricing: null
        "#};

        let apps = apps_from_yaml(feed)?;
        let mut expect = App::new(
            "firefox",
            "Firefox",
            "flathub",
            "app/org.mozilla.firefox/x86_64/stable",
        );
        expect.app_license = "Proprietary".into();
        assert_eq!(apps, vec![expect]);

        Ok(())
    }

    #[test]
    fn apps_from_yaml_accepts_empty_feed() -> anyhow::Result<()> {
        assert!(apps_from_yaml("")?.is_empty());
        Ok(())
    }

    #[test]
    fn app_to_yaml_reparses_into_same_app() -> anyhow::Result<()> {
        let apps = apps_from_yaml(FEED)?;
        let yaml = app_to_yaml(&apps[0])?;

        assert_eq!(apps_from_yaml(&yaml)?, vec![apps[0].clone()]);

        Ok(())
    }

    #[test]
    fn refresh_catalog_replaces_previous_apps() -> anyhow::Result<()> {
        let mut catalog = Catalog::open_in_memory()?;
        catalog.add_app(&App::new("stale", "Stale", "flathub", "app/stale"))?;

        let stored = refresh_catalog(&mut catalog, FEED)?;
        assert_eq!(stored, 2);

        let ids = catalog
            .all_apps()?
            .into_iter()
            .map(|app| app.app_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["firefox", "chrome"]);

        Ok(())
    }

    #[test]
    fn refresh_catalog_keeps_catalog_on_broken_feed() -> anyhow::Result<()> {
        let mut catalog = Catalog::open_in_memory()?;
        catalog.add_app(&App::new("kept", "Kept", "flathub", "app/kept"))?;

        assert!(refresh_catalog(&mut catalog, "- not\n- a mapping\n").is_err());
        assert_eq!(catalog.all_apps()?.len(), 1);

        Ok(())
    }
}
