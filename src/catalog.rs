// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! App catalog.
//!
//! The __catalog__ is the local store of every app the curated feed knows
//! about, plus a separate listing of the apps installed on this machine.
//!
//! # Identity
//!
//! An app is identified by the pair of its primary source and its package
//! name within that source, e.g., `flathub` and
//! `app/org.mozilla.firefox/x86_64/stable`. No two apps in the catalog may
//! share that pair. The app id is a separate, mostly stable handle used by
//! front ends.
//!
//! # Closed Enumerations
//!
//! Pricing, mobile support, and still rating are closed sets with stable
//! integer codes. Codes are what the feed and the database carry. An unknown
//! code is a data-integrity error, never silently mapped to `Unknown`.

pub mod feed;
pub mod store;

pub use store::Catalog;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Declare a closed enumeration with stable integer codes.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub enum $name {
            #[default]
            $($(#[$variant_meta])* $variant = $code,)+
        }

        impl $name {
            /// Stable integer code.
            pub fn code(self) -> i64 {
                self as i64
            }
        }

        impl TryFrom<i64> for $name {
            type Error = InvalidCode;

            fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
                match code {
                    $($code => Ok(Self::$variant),)+
                    _ => Err(InvalidCode {
                        kind: stringify!($name),
                        code,
                    }),
                }
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.code()
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.code()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let code = value.as_i64()?;
                Self::try_from(code).map_err(|err| rusqlite::types::FromSqlError::Other(Box::new(err)))
            }
        }
    };
}

coded_enum! {
    /// Pricing model of an app.
    Pricing {
        Unknown = 0,
        Free = 1,
        FreeWithAds = 2,
        FreeWithInAppPurchases = 3,
        Freemium = 4,
        OneTime = 5,
        Subscription = 6,
        ExternalSubscription = 7,
    }
}

coded_enum! {
    /// Form factors an app supports.
    MobileSupport {
        Unknown = 0,
        PcOnly = 1,
        MobileOnly = 2,
        Hybrid = 3,
    }
}

coded_enum! {
    /// Curated rating of how well an app respects its users.
    StillRating {
        Unknown = 0,
        Caution = 1,
        Bronze = 2,
        Silver = 3,
        Gold = 4,
        GoldPlus = 5,
    }
}

/// Integer code outside of a closed enumeration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} code {code}")]
pub struct InvalidCode {
    pub kind: &'static str,
    pub code: i64,
}

fn default_license() -> String {
    "Proprietary".into()
}

// INVARIANT: Explicit null in the feed means the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_license<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_license))
}

/// One distributable app.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct App {
    /// Mostly stable identifier. Key of the app in the feed.
    #[serde(skip)]
    pub app_id: String,

    pub name: String,
    pub primary_src: String,
    pub src_pkg_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub icon_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mimetypes: Vec<String>,
    #[serde(default = "default_license", deserialize_with = "null_as_license", rename = "license")]
    pub app_license: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pricing: Pricing,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mobile: MobileSupport,
    #[serde(default, deserialize_with = "null_as_default")]
    pub still_rating: StillRating,
    #[serde(default, deserialize_with = "null_as_default")]
    pub still_rating_notes: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub homepage: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub donate_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub screenshot_urls: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub demo_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub addons: Vec<String>,
}

impl App {
    /// Construct new app with required identity, and defaults for the rest.
    pub fn new(
        app_id: impl Into<String>,
        name: impl Into<String>,
        primary_src: impl Into<String>,
        src_pkg_name: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            name: name.into(),
            primary_src: primary_src.into(),
            src_pkg_name: src_pkg_name.into(),
            icon_url: String::new(),
            author: String::new(),
            summary: String::new(),
            description: String::new(),
            categories: Vec::new(),
            keywords: Vec::new(),
            mimetypes: Vec::new(),
            app_license: default_license(),
            pricing: Pricing::default(),
            mobile: MobileSupport::default(),
            still_rating: StillRating::default(),
            still_rating_notes: String::new(),
            homepage: String::new(),
            donate_url: String::new(),
            screenshot_urls: Vec::new(),
            demo_url: String::new(),
            addons: Vec::new(),
        }
    }

    /// Uniqueness key of app.
    pub fn key(&self) -> (&str, &str) {
        (&self.primary_src, &self.src_pkg_name)
    }
}

impl Display for App {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} ({}:{})", self.app_id, self.primary_src, self.src_pkg_name)
    }
}

/// App installed on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub app: App,

    /// Package manager knows of a newer version.
    pub update_available: bool,
}

impl InstalledApp {
    /// Construct new installed app.
    pub fn new(app: App, update_available: bool) -> Self {
        Self {
            app,
            update_available,
        }
    }
}

impl From<App> for InstalledApp {
    fn from(app: App) -> Self {
        Self::new(app, false)
    }
}

/// Join list into comma-separated text. Empty lists are stored as nothing.
pub(crate) fn to_csl(list: &[String]) -> Option<String> {
    if list.is_empty() {
        None
    } else {
        Some(list.join(","))
    }
}

/// Split comma-separated text into list. Nothing yields an empty list.
pub(crate) fn from_csl(csl: Option<String>) -> Vec<String> {
    match csl {
        Some(csl) if !csl.is_empty() => csl.split(',').map(str::to_owned).collect(),
        _ => Vec::new(),
    }
}

/// Catalog error types.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// App with the same source and package name is already stored.
    #[error("an app with src_pkg_name {src_pkg_name} already exists in {primary_src}")]
    DuplicatePackage {
        primary_src: String,
        src_pkg_name: String,
    },

    /// Stored enumeration code is unknown.
    #[error(transparent)]
    InvalidCode(#[from] InvalidCode),

    /// Database operation fails.
    #[error(transparent)]
    Sqlite(rusqlite::Error),

    /// App id in feed is not a scalar.
    #[error("app id {0} is not a string")]
    InvalidAppId(String),

    /// Feed cannot be parsed or rendered.
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Feed or database location cannot be accessed.
    #[error("failed to access {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: std::path::PathBuf,
    },

    /// Ownership of database cannot be handed back to the invoking user.
    #[error(transparent)]
    Privilege(#[from] crate::privilege::PrivilegeError),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        // INVARIANT: Unknown codes read back from the store stay integrity errors.
        match err {
            rusqlite::Error::FromSqlConversionFailure(index, kind, inner) => {
                match inner.downcast::<InvalidCode>() {
                    Ok(invalid) => Self::InvalidCode(*invalid),
                    Err(inner) => {
                        Self::Sqlite(rusqlite::Error::FromSqlConversionFailure(index, kind, inner))
                    }
                }
            }
            err => Self::Sqlite(err),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
