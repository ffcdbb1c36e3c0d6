//! # Entity Store Interface
//!
//! The remote data store is an external collaborator. This module defines the
//! operations a clone session needs from it as the [`EntityStore`] trait, so
//! that the real API client and the in-memory [`memory::MemoryStore`] used by
//! tests and the CLI can be swapped freely.
//!
//! All operations are asynchronous and are the only suspension points of a
//! clone session. Implementations report failures as
//! [`Error::RemoteOperation`](crate::error::Error::RemoteOperation); the
//! session never retries them.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::DocumentFormat;
use crate::error::Result;
use crate::value::{Entity, EntityId, FileRef, Value};

pub mod memory;

pub use memory::MemoryStore;

/// Operations a clone session performs against the remote store.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch an entity with the given fields populated.
    async fn fetch_entity(&self, type_name: &str, id: &EntityId, fields: &[String])
        -> Result<Entity>;

    /// Create an entity with an initial payload and return it as created,
    /// including any document secrets the store allocated.
    async fn create_entity(
        &self,
        type_name: &str,
        fields: BTreeMap<String, Value>,
    ) -> Result<Entity>;

    async fn update_entity(
        &self,
        type_name: &str,
        id: &EntityId,
        fields: BTreeMap<String, Value>,
    ) -> Result<()>;

    async fn add_collection_member(
        &self,
        type_name: &str,
        id: &EntityId,
        field: &str,
        member: &EntityId,
    ) -> Result<()>;

    async fn get_document_content(&self, secret: &str, format: DocumentFormat) -> Result<String>;

    async fn set_document_content(
        &self,
        secret: &str,
        content: &str,
        format: DocumentFormat,
    ) -> Result<()>;

    /// Attach a copy of the file at `file.url` to the entity.
    async fn copy_file_by_url(
        &self,
        file: &FileRef,
        type_name: &str,
        id: &EntityId,
        auth_headers: &BTreeMap<String, String>,
    ) -> Result<()>;
}
