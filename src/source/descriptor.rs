// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source descriptor parsing.
//!
//! The source feed is a YAML mapping of source names to the attributes that
//! describe the desired state of that source:
//!
//! ```yaml
//! flathub:
//!   type: flatpak
//!   repo_url: https://dl.flathub.org/repo/
//!   alt_urls:
//!     - https://flathub.mirror.example.org/repo/
//!   gpg: mQINBFlD2sABEADsiUZUO...
//! ```
//!
//! The type of a source may be given as either `type` or `source_type`.
//! Sources keep the order they are declared in.
//!
//! Text attributes are normalized on parse: every line is trimmed and blank
//! lines are dropped. Block scalars such as a long `gpg: |` key therefore
//! compare equal to what the keyfile parser reads back from disk.

use crate::path::is_plain_file_stem;

use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::{collections::BTreeSet, str::FromStr};

/// Declared, desired-state description of one source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Unique name of source. Doubles as title of rendered config.
    pub name: String,

    /// Declared type string used to pick a backend.
    pub source_type: String,

    /// Canonical repository URL.
    pub repo_url: Option<String>,

    /// URLs that are equivalent to the canonical URL, e.g., mirrors.
    pub alt_urls: BTreeSet<String>,

    /// Homepage of source.
    pub homepage: Option<String>,

    /// Description of source.
    pub description: Option<String>,

    /// Comment for source.
    pub comment: Option<String>,

    /// Icon of source.
    pub icon_url: Option<String>,

    /// Signing key of source.
    pub gpg: Option<String>,
}

impl SourceDescriptor {
    /// Parse one named source out of a full source feed.
    ///
    /// # Errors
    ///
    /// - Return [`DescriptorError::Yaml`] if feed is not valid YAML.
    /// - Return [`DescriptorError::UnknownSource`] if feed lacks the source.
    pub fn from_feed(yaml: &str, name: &str) -> Result<Self> {
        let feed: SourceFeed = yaml.parse()?;
        feed.into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.descriptor)
            .unwrap_or(Err(DescriptorError::UnknownSource(name.into())))
    }

    /// Check if URL is either the canonical URL or one of its alternates.
    pub fn accepts_url(&self, url: &str) -> bool {
        self.repo_url.as_deref() == Some(url) || self.alt_urls.contains(url)
    }
}

/// Parsed source feed.
///
/// Each entry is parsed independently so that one broken source does not
/// hide the others. The caller decides whether a broken entry is fatal.
#[derive(Debug, Default)]
pub struct SourceFeed {
    entries: Vec<FeedEntry>,
}

/// One named entry of a source feed.
#[derive(Debug)]
pub struct FeedEntry {
    /// Name the source was declared under.
    pub name: String,

    /// Parsed descriptor, or the reason it could not be parsed.
    pub descriptor: Result<SourceDescriptor>,
}

impl SourceFeed {
    /// Number of declared sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if feed declares no sources.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over parsed entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for SourceFeed {
    type Item = FeedEntry;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromStr for SourceFeed {
    type Err = DescriptorError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        // INVARIANT: An empty document is an empty feed, not an error.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let mapping: Mapping = serde_yaml_ng::from_str(data)?;
        let entries = mapping
            .into_iter()
            .map(|(key, value)| match key {
                // INVARIANT: Source names end up in file names, so they cannot
                // name another directory.
                Value::String(name) if !is_plain_file_stem(&name) => FeedEntry {
                    descriptor: Err(DescriptorError::UnsafeName(name.clone())),
                    name,
                },
                Value::String(name) => FeedEntry {
                    descriptor: parse_entry(name.clone(), value),
                    name,
                },
                other => {
                    let name = format!("{other:?}");
                    FeedEntry {
                        descriptor: Err(DescriptorError::InvalidName(name.clone())),
                        name,
                    }
                }
            })
            .collect();

        Ok(Self { entries })
    }
}

fn parse_entry(name: String, value: Value) -> Result<SourceDescriptor> {
    let raw: RawDescriptor =
        serde_yaml_ng::from_value(value).map_err(|err| DescriptorError::Invalid {
            source: err,
            name: name.clone(),
        })?;

    let source_type = raw
        .source_type
        .ok_or_else(|| DescriptorError::MissingType(name.clone()))?;

    Ok(SourceDescriptor {
        name,
        source_type,
        repo_url: normalize(raw.repo_url),
        alt_urls: raw
            .alt_urls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|url| normalize(Some(url)))
            .collect(),
        homepage: normalize(raw.homepage),
        description: normalize(raw.description),
        comment: normalize(raw.comment),
        icon_url: normalize(raw.icon_url),
        gpg: normalize(raw.gpg),
    })
}

fn normalize(value: Option<String>) -> Option<String> {
    let value = value?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!value.is_empty()).then_some(value)
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(rename = "type", alias = "source_type")]
    source_type: Option<String>,
    repo_url: Option<String>,
    homepage: Option<String>,
    description: Option<String>,
    comment: Option<String>,
    icon_url: Option<String>,
    gpg: Option<String>,
    alt_urls: Option<Vec<String>>,
}

/// Source descriptor error types.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Feed is not valid YAML, or not a mapping.
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Source name is not a string.
    #[error("source name {0} is not a string")]
    InvalidName(String),

    /// Source name cannot be used as a file name.
    #[error("source name {0:?} cannot be used as a file name")]
    UnsafeName(String),

    /// Source attributes do not fit the descriptor layout.
    #[error("invalid attributes for source {name}")]
    Invalid {
        #[source]
        source: serde_yaml_ng::Error,
        name: String,
    },

    /// Source does not declare a type.
    #[error("source {0} does not declare a type")]
    MissingType(String),

    /// Source is not declared in feed.
    #[error("source {0} not found in feed")]
    UnknownSource(String),
}

/// Friendly result alias :3
pub type Result<T, E = DescriptorError> = std::result::Result<T, E>;
