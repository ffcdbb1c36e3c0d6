//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `template-clone` command-line tool, one file per command.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `template_clone` library.

use std::path::Path;

use anyhow::Result;

use template_clone::catalog::TypeCatalog;
use template_clone::config::{self, CloneConfig};

pub mod clone;
pub mod plan;
pub mod validate;

/// Load the clone configuration, or the defaults when no file is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<CloneConfig> {
    match path {
        Some(path) => config::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path.display(), e)),
        None => Ok(CloneConfig::default()),
    }
}

pub(crate) fn load_catalog(path: &Path, config: &CloneConfig) -> Result<TypeCatalog> {
    TypeCatalog::from_file(path, config)
        .map_err(|e| anyhow::anyhow!("Failed to load catalog from {}: {}", path.display(), e))
}
