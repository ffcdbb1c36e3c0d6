//! # Template Clone Library
//!
//! This library clones graphs of template entities in a remote, schema-driven
//! data store. Given a subject entity and a template of the same type, it
//! populates the subject from the template and recursively clones or links
//! everything the template references, following rules derived from the
//! field schema. It backs the `template-clone` command-line tool but works
//! with any [`store::EntityStore`] implementation.
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//! use template_clone::catalog::TypeCatalog;
//! use template_clone::config::CloneConfig;
//! use template_clone::session::CloneSession;
//! use template_clone::store::MemoryStore;
//! use template_clone::value::{Entity, EntityKey, Value};
//!
//! let config = CloneConfig::default();
//! let catalog = TypeCatalog::from_yaml(
//!     r#"
//! types:
//!   - name: Task
//!     fields:
//!       - { name: Name, kind: primitive }
//!       - { name: Template, kind: relation, target: Task }
//! "#,
//!     &config,
//! )
//! .unwrap();
//!
//! let store = Arc::new(MemoryStore::new());
//! store
//!     .insert(Entity::new("Task", "tpl").with_field("Name", Value::text("Launch TEMPLATE")))
//!     .unwrap();
//! store.insert(Entity::new("Task", "new")).unwrap();
//!
//! let session = CloneSession::new(Arc::new(catalog), store.clone(), config).unwrap();
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! runtime
//!     .block_on(session.clone_subject(&EntityKey::new("Task", "new"), Some("tpl".into())))
//!     .unwrap();
//!
//! let subject = store.entity(&EntityKey::new("Task", "new")).unwrap().unwrap();
//! assert_eq!(subject.field("Name"), Some(&Value::text("Launch")));
//! ```
//!
//! ## Core Concepts
//!
//! - **Type Catalog (`catalog`)**: Immutable field metadata loaded from YAML.
//!   Every field is classified once into the action taken when it is cloned.
//! - **Values (`value`)**: Entity identities and the tagged field values
//!   exchanged with the store.
//! - **Entity Store (`store`)**: The remote store interface, plus an
//!   in-memory implementation.
//! - **Clone Session (`session`)**: The registry of entity proxies, the
//!   reference tracker, the clone orchestrator and the batch committer.
//! - **Configuration (`config`)**: Field-name conventions and tuning knobs.
//! - **Events (`events`)**: Progress notifications for callers that want to
//!   follow a clone run.
//!
//! ## Execution Flow
//!
//! 1.  **Fetch**: Load the subject and its template into the registry.
//! 2.  **Populate**: Stage the template's fields onto the subject, cloning
//!     one-sided relations and collection members concurrently. Each template
//!     is cloned at most once per session.
//! 3.  **Resolve**: Retarget links that pointed at a template to its clone.
//! 4.  **Commit**: Flush every staged write to the store.

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod output;
pub mod session;
pub mod store;
pub mod transform;
pub mod value;

#[cfg(test)]
mod transform_proptest;
