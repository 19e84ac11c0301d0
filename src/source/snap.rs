// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snap source type.
//!
//! The Snap Store is built into snapd, so there is no remote configuration to
//! render, write, or check. A Snap source is always considered reconciled.

use crate::source::{Reconciliation, Result, SourceDescriptor, SourceType};

use std::path::PathBuf;

/// Declared type string of Snap sources.
pub const TYPE: &str = "snap";

/// Snap Store source.
#[derive(Debug, Clone)]
pub struct SnapSource {
    descriptor: SourceDescriptor,
}

impl SnapSource {
    /// Construct new Snap source.
    pub fn new(descriptor: SourceDescriptor) -> Self {
        Self { descriptor }
    }
}

impl SourceType for SnapSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn config_path(&self) -> Option<PathBuf> {
        None
    }

    fn generate_config(&self) -> String {
        String::new()
    }

    fn write_config(&self) -> Result<()> {
        Ok(())
    }

    fn check_config(&self) -> Result<Reconciliation> {
        Ok(Reconciliation::Matched)
    }
}
