// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Catalog database.
//!
//! The catalog lives in a single SQLite database with two tables of the same
//! layout: `apps` for everything the feed knows about, and `installed` for
//! the apps found on this machine. The `installed` table carries one extra
//! `update_available` column.
//!
//! List fields are stored as comma-separated text. Enumerations are stored
//! as their integer codes, and rejected on read if the code is unknown.
//!
//! # Duplicate Handling
//!
//! Single inserts are strict: inserting an app whose source and package
//! name are already taken fails with [`CatalogError::DuplicatePackage`]. Bulk
//! inserts are imports: the first occurrence of a key wins, and later
//! duplicates are dropped with a warning instead of failing the whole batch.

use crate::{
    catalog::{from_csl, to_csl, App, CatalogError, InstalledApp, Result},
    privilege::{fix_perms, is_sudo_root},
};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::{collections::HashSet, path::Path};
use tracing::{debug, info, instrument, warn};

const COLUMNS: &str = "id, name, primary_src, src_pkg_name, icon_url, author, summary, \
    description, categories, keywords, mimetypes, license, pricing, mobile, still_rating, \
    still_rating_notes, homepage, donate_url, screenshot_urls, demo_url, addons";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS apps
        (id text, name text, primary_src text, src_pkg_name text, icon_url text,
        author text, summary text, description text, categories text, keywords text,
        mimetypes text, license text, pricing int, mobile int, still_rating int,
        still_rating_notes text, homepage text, donate_url text, screenshot_urls text,
        demo_url text, addons text);
    CREATE TABLE IF NOT EXISTS installed
        (id text, name text, primary_src text, src_pkg_name text, icon_url text,
        author text, summary text, description text, categories text, keywords text,
        mimetypes text, license text, pricing int, mobile int, still_rating int,
        still_rating_notes text, homepage text, donate_url text, screenshot_urls text,
        demo_url text, addons text, update_available int);
";

/// Tables of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Apps,
    Installed,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Self::Apps => "apps",
            Self::Installed => "installed",
        }
    }
}

/// Handle to the catalog database.
#[derive(Debug)]
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open catalog for reading and writing.
    ///
    /// Creates the database, its parent directories, and its tables if they
    /// do not exist yet. Under `sudo`, anything newly created is handed back
    /// to the invoking user.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::Io`] if parent directories cannot be created.
    /// - Return [`CatalogError::Sqlite`] if database cannot be opened.
    /// - Return [`CatalogError::Privilege`] if ownership cannot be fixed.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let new_db = !path.exists();

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            let created = mkdirp::mkdirp(parent).map_err(|err| CatalogError::Io {
                source: err,
                path: parent.to_path_buf(),
            })?;
            if created.is_some() && is_sudo_root() {
                fix_perms(parent)?;
            }
        }

        debug!("open catalog {:?}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        if new_db {
            info!("created new catalog at {:?}", path.display());
            if is_sudo_root() {
                fix_perms(path)?;
            }
        }

        Ok(Self { conn })
    }

    /// Open existing catalog for reading only.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::Sqlite`] if database cannot be opened.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self { conn })
    }

    /// Open fresh catalog that only lives in memory.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::Sqlite`] if database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self { conn })
    }

    /// Get app by id.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::InvalidCode`] if a stored enumeration code is
    ///   unknown.
    /// - Return [`CatalogError::Sqlite`] if the query fails.
    pub fn get_app(&self, app_id: &str) -> Result<Option<App>> {
        let sql = format!("SELECT {COLUMNS} FROM apps WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![app_id], app_from_row)
            .optional()?)
    }

    /// Find app by source and package name.
    pub fn find_app(&self, primary_src: &str, src_pkg_name: &str) -> Result<Option<App>> {
        let sql = format!("SELECT {COLUMNS} FROM apps WHERE primary_src = ?1 AND src_pkg_name = ?2");
        Ok(self
            .conn
            .query_row(&sql, params![primary_src, src_pkg_name], app_from_row)
            .optional()?)
    }

    /// List all apps.
    pub fn all_apps(&self) -> Result<Vec<App>> {
        let sql = format!("SELECT {COLUMNS} FROM apps ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let apps = stmt
            .query_map([], app_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(apps)
    }

    /// List all installed apps.
    pub fn installed_apps(&self) -> Result<Vec<InstalledApp>> {
        let sql = format!("SELECT {COLUMNS}, update_available FROM installed ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let apps = stmt
            .query_map([], |row| {
                Ok(InstalledApp::new(app_from_row(row)?, row.get::<_, bool>(21)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(apps)
    }

    /// Insert one app.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::DuplicatePackage`] if an app with the same
    ///   source and package name already exists.
    pub fn add_app(&self, app: &App) -> Result<()> {
        insert_one(&self.conn, Table::Apps, app, None)
    }

    /// Insert many apps, dropping duplicates.
    ///
    /// Returns number of apps actually inserted.
    pub fn add_apps(&mut self, apps: &[App]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let inserted = insert_many(&tx, Table::Apps, apps.iter().map(|app| (app, None)))?;
        tx.commit()?;

        Ok(inserted)
    }

    /// Delete all apps.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM apps", [])?;
        Ok(())
    }

    /// Replace all apps in one transaction.
    ///
    /// Readers never observe a half-cleared table. Returns number of apps
    /// inserted.
    #[instrument(skip(self, apps), level = "debug")]
    pub fn replace_apps(&mut self, apps: &[App]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM apps", [])?;
        let inserted = insert_many(&tx, Table::Apps, apps.iter().map(|app| (app, None)))?;
        tx.commit()?;

        info!("catalog now holds {inserted} apps");
        Ok(inserted)
    }

    /// Insert one installed app.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::DuplicatePackage`] if an installed app with
    ///   the same source and package name already exists.
    pub fn add_installed_app(&self, app: &InstalledApp) -> Result<()> {
        insert_one(&self.conn, Table::Installed, &app.app, Some(app.update_available))
    }

    /// Insert many installed apps, dropping duplicates.
    ///
    /// Returns number of apps actually inserted.
    pub fn add_installed_apps(&mut self, apps: &[InstalledApp]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let inserted = insert_many(
            &tx,
            Table::Installed,
            apps.iter().map(|app| (&app.app, Some(app.update_available))),
        )?;
        tx.commit()?;

        Ok(inserted)
    }

    /// Delete all installed apps.
    pub fn clear_installed(&self) -> Result<()> {
        self.conn.execute("DELETE FROM installed", [])?;
        Ok(())
    }

    /// Replace all installed apps in one transaction.
    ///
    /// Returns number of apps inserted.
    #[instrument(skip(self, apps), level = "debug")]
    pub fn replace_installed(&mut self, apps: &[InstalledApp]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM installed", [])?;
        let inserted = insert_many(
            &tx,
            Table::Installed,
            apps.iter().map(|app| (&app.app, Some(app.update_available))),
        )?;
        tx.commit()?;

        info!("{inserted} installed apps recorded");
        Ok(inserted)
    }
}

fn text(row: &Row<'_>, index: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(index)?.unwrap_or_default())
}

fn app_from_row(row: &Row<'_>) -> rusqlite::Result<App> {
    Ok(App {
        app_id: text(row, 0)?,
        name: text(row, 1)?,
        primary_src: text(row, 2)?,
        src_pkg_name: text(row, 3)?,
        icon_url: text(row, 4)?,
        author: text(row, 5)?,
        summary: text(row, 6)?,
        description: text(row, 7)?,
        categories: from_csl(row.get(8)?),
        keywords: from_csl(row.get(9)?),
        mimetypes: from_csl(row.get(10)?),
        app_license: text(row, 11)?,
        pricing: row.get(12)?,
        mobile: row.get(13)?,
        still_rating: row.get(14)?,
        still_rating_notes: text(row, 15)?,
        homepage: text(row, 16)?,
        donate_url: text(row, 17)?,
        screenshot_urls: from_csl(row.get(18)?),
        demo_url: text(row, 19)?,
        addons: from_csl(row.get(20)?),
    })
}

fn exists(conn: &Connection, table: Table, app: &App) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE primary_src = ?1 AND src_pkg_name = ?2",
        table.name()
    );
    Ok(conn
        .query_row(&sql, params![app.primary_src, app.src_pkg_name], |_| Ok(()))
        .optional()?
        .is_some())
}

fn existing_keys(conn: &Connection, table: Table) -> Result<HashSet<(String, String)>> {
    let sql = format!("SELECT primary_src, src_pkg_name FROM {}", table.name());
    let mut stmt = conn.prepare(&sql)?;
    let keys = stmt
        .query_map([], |row| Ok((text(row, 0)?, text(row, 1)?)))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;

    Ok(keys)
}

fn insert_one(
    conn: &Connection,
    table: Table,
    app: &App,
    update_available: Option<bool>,
) -> Result<()> {
    if exists(conn, table, app)? {
        return Err(CatalogError::DuplicatePackage {
            primary_src: app.primary_src.clone(),
            src_pkg_name: app.src_pkg_name.clone(),
        });
    }

    insert(conn, table, app, update_available)
}

fn insert_many<'a>(
    conn: &Connection,
    table: Table,
    apps: impl IntoIterator<Item = (&'a App, Option<bool>)>,
) -> Result<usize> {
    // INVARIANT: First occurrence of a key wins, stored or in batch.
    let mut seen = existing_keys(conn, table)?;
    let mut inserted = 0;
    for (app, update_available) in apps {
        let key = (app.primary_src.clone(), app.src_pkg_name.clone());
        if !seen.insert(key) {
            warn!("skip duplicate package {app} in {}", table.name());
            continue;
        }

        insert(conn, table, app, update_available)?;
        inserted += 1;
    }

    Ok(inserted)
}

fn insert(
    conn: &Connection,
    table: Table,
    app: &App,
    update_available: Option<bool>,
) -> Result<()> {
    let categories = to_csl(&app.categories);
    let keywords = to_csl(&app.keywords);
    let mimetypes = to_csl(&app.mimetypes);
    let screenshot_urls = to_csl(&app.screenshot_urls);
    let addons = to_csl(&app.addons);

    match (table, update_available) {
        (Table::Apps, _) => conn.execute(
            "INSERT INTO apps VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, \
             ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                app.app_id,
                app.name,
                app.primary_src,
                app.src_pkg_name,
                app.icon_url,
                app.author,
                app.summary,
                app.description,
                categories,
                keywords,
                mimetypes,
                app.app_license,
                app.pricing,
                app.mobile,
                app.still_rating,
                app.still_rating_notes,
                app.homepage,
                app.donate_url,
                screenshot_urls,
                app.demo_url,
                addons,
            ],
        )?,
        (Table::Installed, update_available) => conn.execute(
            "INSERT INTO installed VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, \
             ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                app.app_id,
                app.name,
                app.primary_src,
                app.src_pkg_name,
                app.icon_url,
                app.author,
                app.summary,
                app.description,
                categories,
                keywords,
                mimetypes,
                app.app_license,
                app.pricing,
                app.mobile,
                app.still_rating,
                app.still_rating_notes,
                app.homepage,
                app.donate_url,
                screenshot_urls,
                app.demo_url,
                addons,
                update_available.unwrap_or(false),
            ],
        )?,
    };

    Ok(())
}
