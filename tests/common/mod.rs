//! Shared test utilities for integration and E2E tests.
//!
//! This module provides the onboarding catalog and store used across test
//! files, plus helpers for reading results back out of a `MemoryStore`.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let fixture = Fixture::onboarding();
//!     // ... test code
//! }
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use template_clone::catalog::TypeCatalog;
use template_clone::config::CloneConfig;
use template_clone::session::CloneSession;
use template_clone::store::MemoryStore;
use template_clone::value::{Entity, EntityId, EntityKey, FileRef, Value};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    pub use super::catalogs;
    pub use super::Fixture;
}

/// Catalog YAML used by the tests.
pub mod catalogs {
    /// Tasks with projects, people, checklists, rule-derived items and
    /// documents.
    pub const ONBOARDING: &str = r#"
types:
  - name: Task
    fields:
      - { name: Name, kind: primitive }
      - { name: Rank, kind: primitive }
      - { name: Code, kind: primitive }
      - { name: Template, kind: relation, target: Task, inverse: Templated Entities }
      - { name: Templated Entities, kind: collection, target: Task, inverse: Template }
      - { name: Is Template, kind: primitive }
      - { name: Automation Tag, kind: primitive }
      - { name: Project, kind: relation, target: Project, inverse: Task }
      - { name: Owner, kind: relation, target: User, inverse: Owned Tasks }
      - { name: Assignees, kind: collection, target: User, inverse: Assigned Tasks }
      - { name: Checklist, kind: collection, target: Step, inverse: Task }
      - { name: Items, kind: collection, target: Item, read_only: true }
      - { name: Labels, kind: enum, cardinality: many }
      - { name: State, kind: enum }
      - { name: Description, kind: document }
      - { name: Files, kind: file }
      - { name: Comments, kind: comments }
      - { name: Progress, kind: primitive, read_only: true }
  - name: Project
    fields:
      - { name: Name, kind: primitive }
      - { name: Is Template, kind: primitive }
      - { name: Task, kind: relation, target: Task, inverse: Project }
  - name: User
    fields:
      - { name: Name, kind: primitive }
      - { name: Is Template, kind: primitive }
      - { name: Owned Tasks, kind: collection, target: Task, inverse: Owner }
      - { name: Assigned Tasks, kind: collection, target: Task, inverse: Assignees }
  - name: Step
    fields:
      - { name: Name, kind: primitive }
      - { name: Task, kind: relation, target: Task, inverse: Checklist }
  - name: Item
    fields:
      - { name: Name, kind: primitive }
      - { name: Task Code, kind: primitive }
      - name: Task
        kind: relation
        target: Task
        read_only: true
        link_rule: { correlates: Task, own: Task Code, other: Code }
"#;

    /// A single self-contained type.
    pub const NOTES: &str = r#"
types:
  - name: Note
    fields:
      - { name: Name, kind: primitive }
      - { name: Template, kind: relation, target: Note }
      - { name: Is Template, kind: primitive }
"#;
}

/// A catalog, a seeded store and the config both were built with.
pub struct Fixture {
    pub catalog: Arc<TypeCatalog>,
    pub store: Arc<MemoryStore>,
    pub config: CloneConfig,
}

impl Fixture {
    pub fn new(catalog_yaml: &str) -> Self {
        let config = CloneConfig::default();
        let catalog = Arc::new(TypeCatalog::from_yaml(catalog_yaml, &config).unwrap());
        let store = Arc::new(MemoryStore::new().with_catalog(&catalog));
        Self {
            catalog,
            store,
            config,
        }
    }

    /// The onboarding catalog with template task `t1`, subject `s1` and
    /// everything `t1` points at.
    pub fn onboarding() -> Self {
        let fixture = Self::new(catalogs::ONBOARDING);
        let store = &fixture.store;

        store
            .insert(
                Entity::new("Task", "t1")
                    .with_field("Name", Value::text("Onboarding TEMPLATE"))
                    .with_field("Rank", Value::Scalar(json!(5)))
                    .with_field("Code", Value::text("ONB"))
                    .with_field("Template", Value::Ref(None))
                    .with_field("Templated Entities", refs(&["s1"]))
                    .with_field("Is Template", Value::Scalar(json!(true)))
                    .with_field("Automation Tag", Value::text("sync"))
                    .with_field("Project", Value::Ref(Some(EntityId::new("p1"))))
                    .with_field("Owner", Value::Ref(Some(EntityId::new("u1"))))
                    .with_field("Assignees", refs(&["u1", "u2"]))
                    .with_field("Checklist", refs(&["st1"]))
                    .with_field("Items", refs(&["i1"]))
                    .with_field("Labels", refs(&["label-urgent"]))
                    .with_field("State", Value::Choice(Some("Open".to_string())))
                    .with_field("Description", Value::Document(Some("doc-t1".to_string())))
                    .with_field("Files", Value::Files(vec![brief()]))
                    .with_field("Progress", Value::Scalar(json!(50))),
            )
            .unwrap();
        store
            .insert(
                Entity::new("Task", "s1")
                    .with_field("Name", Value::text("New hire"))
                    .with_field("Template", Value::Ref(Some(EntityId::new("t1"))))
                    .with_field("Description", Value::Document(Some("doc-s1".to_string()))),
            )
            .unwrap();
        store
            .insert(
                Entity::new("Project", "p1")
                    .with_field("Name", Value::text("Onboarding project TEMPLATE"))
                    .with_field("Is Template", Value::Scalar(json!(true)))
                    .with_field("Task", Value::Ref(Some(EntityId::new("t1")))),
            )
            .unwrap();
        store
            .insert(
                Entity::new("User", "u1")
                    .with_field("Name", Value::text("Alice"))
                    .with_field("Is Template", Value::Scalar(json!(false))),
            )
            .unwrap();
        store
            .insert(
                Entity::new("User", "u2")
                    .with_field("Name", Value::text("Buddy template"))
                    .with_field("Is Template", Value::Scalar(json!(true))),
            )
            .unwrap();
        store
            .insert(
                Entity::new("Step", "st1")
                    .with_field("Name", Value::text("Sign contract"))
                    .with_field("Task", Value::Ref(Some(EntityId::new("t1")))),
            )
            .unwrap();
        store
            .insert(
                Entity::new("Item", "i1")
                    .with_field("Name", Value::text("Laptop"))
                    .with_field("Task Code", Value::text("ONB")),
            )
            .unwrap();
        store.insert_document("doc-t1", "# Welcome aboard").unwrap();
        store.insert_document("doc-s1", "").unwrap();

        fixture
    }

    pub fn session(&self) -> CloneSession {
        CloneSession::new(
            Arc::clone(&self.catalog),
            self.store.clone(),
            self.config.clone(),
        )
        .unwrap()
    }

    /// Stored state of an entity; panics when it does not exist.
    pub fn entity(&self, type_name: &str, id: &str) -> Entity {
        self.store
            .entity(&EntityKey::new(type_name, id))
            .unwrap()
            .unwrap_or_else(|| panic!("{}/{} not in store", type_name, id))
    }

    /// Entities of one type created during the test, in creation order.
    pub fn created_of(&self, type_name: &str) -> Vec<Entity> {
        self.store
            .created()
            .unwrap()
            .into_iter()
            .filter(|key| key.type_name == type_name)
            .map(|key| self.entity(&key.type_name, key.id.as_str()))
            .collect()
    }
}

pub fn refs(ids: &[&str]) -> Value {
    Value::Refs(ids.iter().map(|id| EntityId::new(*id)).collect())
}

pub fn brief() -> FileRef {
    FileRef {
        url: "https://files.example.com/onboarding/brief.pdf".to_string(),
        name: "brief.pdf".to_string(),
    }
}

/// Snapshot JSON of the onboarding store, for CLI tests.
pub fn onboarding_snapshot_json() -> String {
    Fixture::onboarding()
        .store
        .snapshot()
        .unwrap()
        .to_json()
        .unwrap()
}
