// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source configuration reconciliation.
//!
//! Brings the on-disk configuration of every declared source in line with
//! the source feed.
//!
//! # Checking
//!
//! [`check_sources`] is read-only. It stops at the first source whose
//! configuration does not match its descriptor, and reports that source
//! together with a human readable reason.
//!
//! # Generating
//!
//! [`generate_sources`] writes the canonical configuration of every source
//! that does not match. A source that fails fatally does not stop the pass.
//! Such failures are collected and reported together once every other source
//! had its chance. Afterwards every source is checked again, so a pass that
//! returns successfully leaves every source reconciled.

use crate::{
    config::Settings,
    source::{
        descriptor::DescriptorError, SourceError, SourceFeed, SourceRegistry, SourceType,
    },
};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, info, instrument, warn};

/// Outcome of a full check over all sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckReport {
    /// Every source is reconciled.
    Passed,

    /// First source found out of line.
    Failed { source: String, reason: String },
}

impl CheckReport {
    /// Check if every source is reconciled.
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl Display for CheckReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Passed => fmt.write_str("all sources match"),
            Self::Failed { reason, .. } => fmt.write_str(reason),
        }
    }
}

/// Outcome of a generation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    /// Sources whose configuration was written.
    pub written: Vec<String>,

    /// Sources that already matched.
    pub unchanged: Vec<String>,
}

/// Build every declared source.
///
/// # Errors
///
/// - Return [`ReconcileError::Feed`] if feed cannot be parsed.
/// - Return [`ReconcileError::Descriptor`] if any entry is invalid.
/// - Return [`ReconcileError::Source`] if any entry cannot be built.
pub fn load_sources(
    feed: &str,
    registry: &SourceRegistry,
    settings: &Settings,
) -> Result<Vec<Box<dyn SourceType>>> {
    let feed: SourceFeed = feed.parse()?;
    feed.into_iter()
        .map(|entry| {
            let descriptor = entry.descriptor.map_err(|err| ReconcileError::Descriptor {
                source: err,
                name: entry.name.clone(),
            })?;
            registry
                .create(descriptor, settings)
                .map_err(|err| ReconcileError::Source {
                    source: err,
                    name: entry.name,
                })
        })
        .collect()
}

/// Check every declared source against its on-disk configuration.
///
/// # Errors
///
/// - Return [`ReconcileError`] if feed cannot be parsed, or any source fails
///   fatally, e.g., unsupported type or unreadable configuration.
#[instrument(skip(feed, registry, settings), level = "debug")]
pub fn check_sources(
    feed: &str,
    registry: &SourceRegistry,
    settings: &Settings,
) -> Result<CheckReport> {
    check_all(&load_sources(feed, registry, settings)?)
}

/// Check already built sources, stopping at the first one out of line.
///
/// # Errors
///
/// - Return [`ReconcileError::Source`] if a configuration cannot be read.
pub fn check_all(sources: &[Box<dyn SourceType>]) -> Result<CheckReport> {
    for source in sources {
        let reconciliation = source
            .check_config()
            .map_err(|err| ReconcileError::Source {
                source: err,
                name: source.name().into(),
            })?;

        if let Some(reason) = reconciliation.reason(source.name()) {
            info!("{reason}");
            return Ok(CheckReport::Failed {
                source: source.name().into(),
                reason,
            });
        }

        debug!("source {} matches", source.name());
    }

    Ok(CheckReport::Passed)
}

/// Write canonical configuration for every source out of line.
///
/// # Errors
///
/// - Return [`ReconcileError::Feed`] if feed cannot be parsed.
/// - Return [`ReconcileError::Deferred`] with every fatal per-source failure,
///   after all other sources were processed.
/// - Return [`ReconcileError::Unreconciled`] if a source still does not
///   match after the pass.
#[instrument(skip(feed, registry, settings), level = "debug")]
pub fn generate_sources(
    feed: &str,
    registry: &SourceRegistry,
    settings: &Settings,
) -> Result<GenerateReport> {
    let feed: SourceFeed = feed.parse()?;
    let mut report = GenerateReport::default();
    let mut sources = Vec::with_capacity(feed.len());
    let mut deferred = Vec::new();

    for entry in feed {
        let name = entry.name;
        let source = match entry.descriptor {
            Ok(descriptor) => registry.create(descriptor, settings),
            Err(err) => {
                warn!("skip source {name}: {err}");
                deferred.push(ReconcileError::Descriptor { source: err, name });
                continue;
            }
        };

        let source = match source {
            Ok(source) => source,
            Err(err) => {
                warn!("skip source {name}: {err}");
                deferred.push(ReconcileError::Source { source: err, name });
                continue;
            }
        };

        match reconcile_one(source.as_ref()) {
            Ok(true) => report.written.push(name),
            Ok(false) => report.unchanged.push(name),
            Err(err) => {
                warn!("failed to reconcile source {name}: {err}");
                deferred.push(ReconcileError::Source { source: err, name });
                continue;
            }
        }

        sources.push(source);
    }

    if !deferred.is_empty() {
        return Err(ReconcileError::Deferred(deferred));
    }

    // INVARIANT: Successful pass leaves every source reconciled.
    if let CheckReport::Failed { source, reason } = check_all(&sources)? {
        return Err(ReconcileError::Unreconciled {
            name: source,
            reason,
        });
    }

    info!(
        "wrote {} sources, {} already matched",
        report.written.len(),
        report.unchanged.len()
    );
    Ok(report)
}

/// Reconcile one source, returning whether its configuration was written.
fn reconcile_one(source: &dyn SourceType) -> std::result::Result<bool, SourceError> {
    let reconciliation = source.check_config()?;
    if reconciliation.is_matched() {
        debug!("source {} already matches", source.name());
        return Ok(false);
    }

    debug!("source {} is out of line: {reconciliation:?}", source.name());
    source.write_config()?;
    Ok(true)
}

/// Reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Source feed cannot be parsed.
    #[error(transparent)]
    Feed(#[from] DescriptorError),

    /// Feed entry is not a valid descriptor.
    #[error("invalid descriptor for source {name}")]
    Descriptor {
        #[source]
        source: DescriptorError,
        name: String,
    },

    /// Source fails fatally.
    #[error("source {name} failed")]
    Source {
        #[source]
        source: SourceError,
        name: String,
    },

    /// Some sources failed fatally while the others were reconciled.
    #[error("failed to reconcile {} sources: {}", .0.len(), join_errors(.0))]
    Deferred(Vec<ReconcileError>),

    /// Source still does not match after its configuration was written.
    #[error("source {name} still does not match: {reason}")]
    Unreconciled { name: String, reason: String },
}

fn join_errors(errors: &[ReconcileError]) -> String {
    errors
        .iter()
        .map(|err| match std::error::Error::source(err) {
            Some(source) => format!("{err} ({source})"),
            None => err.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Friendly result alias :3
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
