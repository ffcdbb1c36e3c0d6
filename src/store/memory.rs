//! In-memory entity store
//!
//! `MemoryStore` keeps entities and document contents in a mutex-guarded map.
//! It backs the CLI, which loads and saves it as a JSON snapshot, and the test
//! suite, which uses its call counters and failure injection.
//!
//! Every operation yields to the scheduler once before it runs, the way a
//! network round trip would, so concurrent branches of a clone session
//! interleave the same way they do against a real store.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EntityStore;
use crate::catalog::{FieldKind, TypeCatalog};
use crate::config::DocumentFormat;
use crate::error::{Error, Result};
use crate::value::{Entity, EntityId, EntityKey, FileRef, Value};

/// Serialized form of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Document contents by secret.
    #[serde(default)]
    pub documents: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetches: usize,
    pub creates: usize,
    pub updates: usize,
    pub members_added: usize,
    pub document_reads: usize,
    pub document_writes: usize,
    pub file_copies: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    entities: BTreeMap<EntityKey, Entity>,
    documents: BTreeMap<String, String>,
    document_fields: BTreeMap<String, Vec<String>>,
    file_fields: BTreeMap<String, String>,
    failing_creates: HashSet<String>,
    created: Vec<EntityKey>,
    next_id: u64,
    calls: CallCounts,
}

/// Entity store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the snapshot's entities and documents
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            for entity in snapshot.entities {
                state.entities.insert(entity.key(), entity);
            }
            state.documents = snapshot.documents;
        }
        store
    }

    /// Teach the store which document and file fields each type has, so that
    /// creation allocates documents and file copies land in the right field.
    pub fn with_catalog(self, catalog: &TypeCatalog) -> Self {
        if let Ok(mut state) = self.state.lock() {
            for type_name in catalog.type_names() {
                let documents: Vec<String> = catalog
                    .document_fields_of(type_name)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                state.document_fields.insert(type_name.to_string(), documents);

                let file_field = catalog
                    .fields_of(type_name)
                    .ok()
                    .into_iter()
                    .flatten()
                    .find(|field| field.kind == FieldKind::File)
                    .map(|field| field.name.clone());
                if let Some(file_field) = file_field {
                    state.file_fields.insert(type_name.to_string(), file_field);
                }
            }
        }
        self
    }

    /// Make every creation of `type_name` fail.
    pub fn fail_creates_of(&self, type_name: &str) -> Result<()> {
        self.state()?.failing_creates.insert(type_name.to_string());
        Ok(())
    }

    /// Insert or replace an entity
    pub fn insert(&self, entity: Entity) -> Result<()> {
        self.state()?.entities.insert(entity.key(), entity);
        Ok(())
    }

    pub fn insert_document(&self, secret: &str, content: &str) -> Result<()> {
        self.state()?
            .documents
            .insert(secret.to_string(), content.to_string());
        Ok(())
    }

    pub fn entity(&self, key: &EntityKey) -> Result<Option<Entity>> {
        Ok(self.state()?.entities.get(key).cloned())
    }

    pub fn document(&self, secret: &str) -> Result<Option<String>> {
        Ok(self.state()?.documents.get(secret).cloned())
    }

    /// Entities created through the store, in creation order.
    pub fn created(&self) -> Result<Vec<EntityKey>> {
        Ok(self.state()?.created.clone())
    }

    pub fn calls(&self) -> Result<CallCounts> {
        Ok(self.state()?.calls)
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        let state = self.state()?;
        Ok(Snapshot {
            entities: state.entities.values().cloned().collect(),
            documents: state.documents.clone(),
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| Error::lock("memory store"))
    }
}

fn not_found(operation: &str, key: &EntityKey) -> Error {
    Error::remote(operation, key, "entity not found")
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn fetch_entity(
        &self,
        type_name: &str,
        id: &EntityId,
        fields: &[String],
    ) -> Result<Entity> {
        tokio::task::yield_now().await;

        let mut state = self.state()?;
        state.calls.fetches += 1;

        let key = EntityKey::new(type_name, id.clone());
        let stored = state
            .entities
            .get(&key)
            .ok_or_else(|| not_found("fetch", &key))?;

        let mut entity = Entity::new(type_name, id.clone());
        for name in fields {
            if let Some(value) = stored.fields.get(name) {
                entity.fields.insert(name.clone(), value.clone());
            }
        }
        Ok(entity)
    }

    async fn create_entity(
        &self,
        type_name: &str,
        fields: BTreeMap<String, Value>,
    ) -> Result<Entity> {
        tokio::task::yield_now().await;

        let mut state = self.state()?;
        state.calls.creates += 1;

        if state.failing_creates.contains(type_name) {
            return Err(Error::remote("create", type_name, "creation rejected"));
        }

        state.next_id += 1;
        let serial = state.next_id;
        let id = EntityId::new(format!("{}-clone-{}", type_name.to_lowercase(), serial));

        let mut entity = Entity::new(type_name, id);
        entity.fields = fields;

        let document_fields = state
            .document_fields
            .get(type_name)
            .cloned()
            .unwrap_or_default();
        for field in document_fields {
            let secret = format!("doc-{}-{}", serial, field.to_lowercase().replace(' ', "-"));
            state.documents.insert(secret.clone(), String::new());
            entity.fields.insert(field, Value::Document(Some(secret)));
        }

        state.created.push(entity.key());
        state.entities.insert(entity.key(), entity.clone());
        Ok(entity)
    }

    async fn update_entity(
        &self,
        type_name: &str,
        id: &EntityId,
        fields: BTreeMap<String, Value>,
    ) -> Result<()> {
        tokio::task::yield_now().await;

        let mut state = self.state()?;
        state.calls.updates += 1;

        let key = EntityKey::new(type_name, id.clone());
        let entity = state
            .entities
            .get_mut(&key)
            .ok_or_else(|| not_found("update", &key))?;
        entity.fields.extend(fields);
        Ok(())
    }

    async fn add_collection_member(
        &self,
        type_name: &str,
        id: &EntityId,
        field: &str,
        member: &EntityId,
    ) -> Result<()> {
        tokio::task::yield_now().await;

        let mut state = self.state()?;
        state.calls.members_added += 1;

        let key = EntityKey::new(type_name, id.clone());
        let entity = state
            .entities
            .get_mut(&key)
            .ok_or_else(|| not_found("add member", &key))?;

        let slot = entity
            .fields
            .entry(field.to_string())
            .or_insert_with(|| Value::Refs(Vec::new()));
        match slot {
            Value::Refs(members) => {
                if !members.contains(member) {
                    members.push(member.clone());
                }
                Ok(())
            }
            _ => Err(Error::remote(
                "add member",
                &key,
                format!("field {} is not a collection", field),
            )),
        }
    }

    async fn get_document_content(&self, secret: &str, _format: DocumentFormat) -> Result<String> {
        tokio::task::yield_now().await;

        let mut state = self.state()?;
        state.calls.document_reads += 1;
        state
            .documents
            .get(secret)
            .cloned()
            .ok_or_else(|| Error::remote("read document", secret, "document not found"))
    }

    async fn set_document_content(
        &self,
        secret: &str,
        content: &str,
        _format: DocumentFormat,
    ) -> Result<()> {
        tokio::task::yield_now().await;

        let mut state = self.state()?;
        state.calls.document_writes += 1;
        state
            .documents
            .insert(secret.to_string(), content.to_string());
        Ok(())
    }

    async fn copy_file_by_url(
        &self,
        file: &FileRef,
        type_name: &str,
        id: &EntityId,
        _auth_headers: &BTreeMap<String, String>,
    ) -> Result<()> {
        tokio::task::yield_now().await;

        let mut state = self.state()?;
        state.calls.file_copies += 1;

        let field = state
            .file_fields
            .get(type_name)
            .cloned()
            .unwrap_or_else(|| "Files".to_string());
        let key = EntityKey::new(type_name, id.clone());
        let entity = state
            .entities
            .get_mut(&key)
            .ok_or_else(|| not_found("copy file", &key))?;

        match entity
            .fields
            .entry(field)
            .or_insert_with(|| Value::Files(Vec::new()))
        {
            Value::Files(files) => {
                files.push(file.clone());
                Ok(())
            }
            _ => Err(Error::remote("copy file", &key, "field is not a file list")),
        }
    }
}
