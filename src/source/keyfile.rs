// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! INI-style keyfile handling.
//!
//! Flatpak remote descriptors are plain keyfiles: named sections in square
//! brackets, followed by `Key=Value` lines. Keys are case sensitive. Blank
//! lines, and lines starting with `#` or `;` are ignored. A line that starts
//! with whitespace continues the value of the previous key.
//!
//! Sections and keys keep their insertion order, so rendering a keyfile built
//! from the same input always yields byte-identical output.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Ordered keyfile document.
///
/// # Invariant
///
/// - No duplicate section names.
/// - No duplicate keys within a section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Keyfile {
    sections: Vec<Section>,
}

impl Keyfile {
    /// Construct new empty keyfile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get section by name.
    pub fn section(&self, name: impl AsRef<str>) -> Option<&Section> {
        self.sections
            .iter()
            .find(|section| section.name == name.as_ref())
    }

    /// Get mutable section by name, inserting an empty one if missing.
    pub fn section_mut(&mut self, name: impl Into<String>) -> &mut Section {
        let name = name.into();
        match self.sections.iter().position(|section| section.name == name) {
            Some(index) => &mut self.sections[index],
            None => {
                self.sections.push(Section::new(name));
                let last = self.sections.len() - 1;
                &mut self.sections[last]
            }
        }
    }

    /// List section names in order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|section| section.name.as_str())
    }
}

impl FromStr for Keyfile {
    type Err = KeyfileError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut keyfile = Keyfile::new();
        let mut current: Option<usize> = None;
        let mut last_key: Option<String> = None;

        for (index, raw) in data.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // INVARIANT: Indented lines continue the previous value.
            if raw.starts_with([' ', '\t']) {
                let (Some(section), Some(key)) = (current, last_key.as_ref()) else {
                    return Err(KeyfileError::UnexpectedContinuation { line });
                };
                let entry = keyfile.sections[section]
                    .entries
                    .iter_mut()
                    .find(|(name, _)| name == key)
                    .ok_or(KeyfileError::UnexpectedContinuation { line })?;
                entry.1.push('\n');
                entry.1.push_str(trimmed);
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or(KeyfileError::MalformedHeader { line })?
                    .trim();
                if name.is_empty() {
                    return Err(KeyfileError::MalformedHeader { line });
                }
                if keyfile.section(name).is_some() {
                    return Err(KeyfileError::DuplicateSection {
                        line,
                        section: name.into(),
                    });
                }
                keyfile.sections.push(Section::new(name));
                current = Some(keyfile.sections.len() - 1);
                last_key = None;
                continue;
            }

            let Some(section) = current else {
                return Err(KeyfileError::MissingSectionHeader { line });
            };

            let (key, value) = trimmed
                .split_once('=')
                .ok_or(KeyfileError::MalformedEntry { line })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(KeyfileError::MalformedEntry { line });
            }

            let section = &mut keyfile.sections[section];
            if section.get(key).is_some() {
                return Err(KeyfileError::DuplicateKey {
                    line,
                    key: key.into(),
                });
            }
            section.entries.push((key.into(), value.trim().into()));
            last_key = Some(key.into());
        }

        Ok(keyfile)
    }
}

impl Display for Keyfile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (index, section) in self.sections.iter().enumerate() {
            if index > 0 {
                fmt.write_str("\n")?;
            }
            write!(fmt, "{section}")?;
        }

        Ok(())
    }
}

/// Named section of ordered key/value entries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    /// Construct new empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Name of section.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lookup value of key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key.as_ref())
            .map(|(_, value)| value.as_str())
    }

    /// Set value of key, replacing existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set value of key if there is one.
    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }
}

impl Display for Section {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "[{}]", self.name)?;
        for (key, value) in &self.entries {
            let mut lines = value.split('\n');
            writeln!(fmt, "{key}={}", lines.next().unwrap_or_default())?;
            for line in lines {
                writeln!(fmt, "  {line}")?;
            }
        }

        Ok(())
    }
}

/// Keyfile parsing error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KeyfileError {
    /// Entry appears before any section header.
    #[error("line {line}: entry outside of any section")]
    MissingSectionHeader { line: usize },

    /// Section header is not closed or empty.
    #[error("line {line}: malformed section header")]
    MalformedHeader { line: usize },

    /// Entry is missing its `=` separator or key.
    #[error("line {line}: expected 'Key=Value'")]
    MalformedEntry { line: usize },

    /// Section declared twice.
    #[error("line {line}: duplicate section [{section}]")]
    DuplicateSection { line: usize, section: String },

    /// Key declared twice in one section.
    #[error("line {line}: duplicate key {key}")]
    DuplicateKey { line: usize, key: String },

    /// Indented line without a key to continue.
    #[error("line {line}: continuation line without a key")]
    UnexpectedContinuation { line: usize },
}
