//! # Error Handling
//!
//! This module defines the centralized error type for `template-clone`. It
//! uses the `thiserror` library to build a single `Error` enum that covers
//! every failure a clone session can run into, each variant carrying enough
//! context to point at the entity or field involved.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants fall into four groups:
//!   - schema problems found while building the type catalog
//!     (`SchemaAmbiguity`, `UnhandledFieldKind`, `UnknownType`, `UnknownField`),
//!   - invariant violations inside a clone session (`ReRegisteredIdentity`,
//!     `ReResolvedTemplate`, `SubjectIsCloneSource`, `UnknownProxy`, `PendingCreation`),
//!   - input problems (`MissingTemplateReference`, `MissingDocument`,
//!     `ConfigParse`),
//!   - failures reported by the external store (`RemoteOperation`).
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! None of these are retried inside the crate. Any error aborts the clone
//! session it occurs in; entities already created remotely are left in place.

use std::sync::Arc;

use thiserror::Error;

use crate::value::EntityKey;

/// Main error type for template-clone operations
#[derive(Error, Debug)]
pub enum Error {
    /// More than one field on the target type carries a link rule pointing
    /// back at the collection's holder, so the auto-link pairing is ambiguous.
    #[error("Ambiguous auto-link pairing for {field}: candidates {}", candidates.join(", "))]
    SchemaAmbiguity {
        field: String,
        candidates: Vec<String>,
    },

    /// A field's kind is not one the clone rules know how to handle.
    #[error("Unhandled field kind for {holder}.{field}")]
    UnhandledFieldKind { holder: String, field: String },

    /// A type name used in the catalog or by a caller is not declared.
    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    /// A field name used in the catalog is not declared on its type.
    #[error("Unknown field: {holder}.{field}")]
    UnknownField { holder: String, field: String },

    /// The subject has no template to clone from.
    #[error("No template reference for subject {subject}")]
    MissingTemplateReference { subject: String },

    /// The subject is already the template of another clone in this session.
    #[error("Subject {subject} is already the source of a clone in this session")]
    SubjectIsCloneSource { subject: String },

    /// An identity was registered twice in the entity registry.
    #[error("Identity already registered: {key}")]
    ReRegisteredIdentity { key: EntityKey },

    /// References to a template were resolved a second time.
    #[error("References to template {key} were already resolved")]
    ReResolvedTemplate { key: EntityKey },

    /// A proxy handle does not belong to this session.
    #[error("Unknown proxy handle: {id}")]
    UnknownProxy { id: usize },

    /// An entity was used by id before its creation completed.
    #[error("Entity of type {type_name} has not been created yet")]
    PendingCreation { type_name: String },

    /// The subject has no document allocated for a document field.
    #[error("No document allocated for {key} field {field}")]
    MissingDocument { key: String, field: String },

    /// The external store rejected or failed an operation.
    #[error("Remote operation failed: {operation} {key} - {message}")]
    RemoteOperation {
        operation: String,
        key: String,
        message: String,
    },

    /// An error occurred while parsing a configuration or catalog file.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An error indicating that a mutex has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// A failure observed through an in-flight operation shared by several
    /// awaiters. Use [`Error::innermost`] to reach the original error.
    #[error(transparent)]
    Propagated(Arc<Error>),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Builds a `RemoteOperation` error.
    pub fn remote(
        operation: impl Into<String>,
        key: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::RemoteOperation {
            operation: operation.into(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Returns the error underneath any `Propagated` wrappers.
    pub fn innermost(&self) -> &Error {
        match self {
            Error::Propagated(inner) => inner.innermost(),
            other => other,
        }
    }

    pub(crate) fn lock(context: &str) -> Self {
        Self::LockPoisoned {
            context: context.to_string(),
        }
    }
}

impl From<Arc<Error>> for Error {
    fn from(shared: Arc<Error>) -> Self {
        match Arc::try_unwrap(shared) {
            Ok(error) => error,
            Err(shared) => Error::Propagated(shared),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_schema_ambiguity() {
        let error = Error::SchemaAmbiguity {
            field: "Project.Items".to_string(),
            candidates: vec!["Item.Owner".to_string(), "Item.Parent".to_string()],
        };
        let display = format!("{}", error);
        assert!(display.contains("Ambiguous auto-link pairing"));
        assert!(display.contains("Project.Items"));
        assert!(display.contains("Item.Owner, Item.Parent"));
    }

    #[test]
    fn test_error_display_re_resolved_template() {
        let error = Error::ReResolvedTemplate {
            key: EntityKey::new("Task", "t1"),
        };
        let display = format!("{}", error);
        assert!(display.contains("already resolved"));
        assert!(display.contains("Task/t1"));
    }

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "unknown field `rank_ofset`".to_string(),
            hint: Some("Check the spelling of the key".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration parsing error"));
        assert!(display.contains("hint:"));
        assert!(display.contains("Check the spelling"));
    }

    #[test]
    fn test_error_display_remote() {
        let error = Error::remote("create", "Task", "HTTP 502");
        let display = format!("{}", error);
        assert!(display.contains("Remote operation failed"));
        assert!(display.contains("create Task"));
        assert!(display.contains("HTTP 502"));
    }

    #[test]
    fn test_innermost_peels_propagated() {
        let original = Arc::new(Error::remote("fetch", "Task/t1", "timeout"));
        let error = Error::Propagated(Arc::new(Error::Propagated(original)));
        assert!(matches!(
            error.innermost(),
            Error::RemoteOperation { operation, .. } if operation == "fetch"
        ));
    }

    #[test]
    fn test_from_arc_unwraps_unique() {
        let error: Error = Arc::new(Error::UnknownProxy { id: 3 }).into();
        assert!(matches!(error, Error::UnknownProxy { id: 3 }));
    }

    #[test]
    fn test_from_arc_keeps_shared() {
        let shared = Arc::new(Error::UnknownProxy { id: 3 });
        let _other = Arc::clone(&shared);
        let error: Error = shared.into();
        assert!(matches!(error, Error::Propagated(_)));
        assert!(matches!(error.innermost(), Error::UnknownProxy { id: 3 }));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
    }
}
