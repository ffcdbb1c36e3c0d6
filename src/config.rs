//! # Clone Configuration
//!
//! This module defines the conventions a clone session follows: which field
//! names play the special roles in the clone rules (the template link, the
//! is-template marker, the re-entrancy suppression tag, the name and rank
//! fields), the marker substring appended to the suppression tag, the rank
//! offset, the document format and the commit concurrency limit.
//!
//! Every key has a default, so an empty file is a valid configuration. The
//! file is YAML, usually named `.template-clone.yaml`:
//!
//! ```yaml
//! template_field: Template
//! rank_offset: 10000
//! suppression_marker: " [cloned]"
//! auth_headers:
//!   Authorization: Token abc
//! ```
//!
//! Unknown keys are rejected so that a misspelled role name does not silently
//! fall back to its default.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Format used when reading and writing rich-text documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Md,
    Html,
    Json,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Md => "md",
            DocumentFormat::Html => "html",
            DocumentFormat::Json => "json",
        }
    }
}

/// Conventions applied by a clone session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloneConfig {
    /// Field linking a subject to its template. Cleared on clones.
    pub template_field: String,
    /// Boolean marker identifying template entities. Forced to false on clones.
    pub template_marker_field: String,
    /// Back-collection of `template_field`. Never cloned.
    pub template_targets_field: String,
    /// Tag field used to suppress remote automations on freshly cloned entities.
    pub suppression_tag_field: String,
    /// Substring appended (once) to the suppression tag.
    pub suppression_marker: String,
    /// Field whose value has the word "template" removed.
    pub name_field: String,
    /// Manual ordering field.
    pub rank_field: String,
    /// Added to the template's rank so clones sort after existing siblings.
    pub rank_offset: i64,
    pub document_format: DocumentFormat,
    /// Upper bound on concurrent writes issued by the committer.
    pub commit_concurrency: usize,
    /// Headers forwarded to the store when copying attached files.
    pub auth_headers: BTreeMap<String, String>,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            template_field: "Template".to_string(),
            template_marker_field: "Is Template".to_string(),
            template_targets_field: "Templated Entities".to_string(),
            suppression_tag_field: "Automation Tag".to_string(),
            suppression_marker: " [cloned]".to_string(),
            name_field: "Name".to_string(),
            rank_field: "Rank".to_string(),
            rank_offset: 10_000,
            document_format: DocumentFormat::Md,
            commit_concurrency: 8,
            auth_headers: BTreeMap::new(),
        }
    }
}

impl CloneConfig {
    /// Commit concurrency, never less than one.
    pub fn effective_concurrency(&self) -> usize {
        self.commit_concurrency.max(1)
    }
}

/// Parse a YAML string into a [`CloneConfig`].
///
/// An empty document yields the defaults.
pub fn parse(yaml_content: &str) -> Result<CloneConfig> {
    if yaml_content.trim().is_empty() {
        return Ok(CloneConfig::default());
    }

    serde_yaml::from_str::<CloneConfig>(yaml_content).map_err(|e| {
        let message = e.to_string();
        let hint = if message.contains("unknown field") {
            Some("Check the key against the documented configuration keys".to_string())
        } else {
            None
        };
        Error::ConfigParse { message, hint }
    })
}

/// Load and parse a configuration file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<CloneConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}
