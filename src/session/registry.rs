//! Entity Registry
//!
//! Session-wide map from `(type, id)` to an [`EntityProxy`]. Proxies live in
//! an arena and are addressed by [`ProxyId`]; at most one proxy exists per
//! identity.
//!
//! Every proxy owns a shared *materialization* future: the fetch for proxies
//! of existing entities, the creation for clones. The slot and its future are
//! reserved synchronously, under the session lock, before anybody awaits, so
//! concurrent branches asking for the same identity converge on one fetch.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use log::debug;

use super::{CloneSession, SessionState};
use crate::error::{Error, Result};
use crate::events::CloneEvent;
use crate::value::{Entity, EntityId, EntityKey, FileRef, Value};

/// Handle to a proxy owned by a session's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(usize);

impl ProxyId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// In-flight or finished fetch/creation of a proxy's entity.
pub(crate) type Materialization =
    Shared<BoxFuture<'static, std::result::Result<Arc<Entity>, Arc<Error>>>>;

/// In-memory state of one entity instance during a clone session.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityProxy {
    pub type_name: String,
    /// Absent until the entity exists remotely.
    pub id: Option<EntityId>,
    /// Receives writes from the committer.
    pub is_clone: bool,
    pub pending_fields: BTreeMap<String, Value>,
    pub pending_collections: BTreeMap<String, Vec<EntityId>>,
    pub pending_files: Vec<FileRef>,
    /// Set on a template once its clone has been requested.
    pub clone_of: Option<ProxyId>,
}

impl EntityProxy {
    fn new(type_name: String, id: Option<EntityId>) -> Self {
        Self {
            type_name,
            id,
            is_clone: false,
            pending_fields: BTreeMap::new(),
            pending_collections: BTreeMap::new(),
            pending_files: Vec::new(),
            clone_of: None,
        }
    }

    pub fn key(&self) -> Option<EntityKey> {
        self.id
            .as_ref()
            .map(|id| EntityKey::new(self.type_name.clone(), id.clone()))
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending_fields.is_empty()
            || self.pending_collections.values().any(|ids| !ids.is_empty())
            || !self.pending_files.is_empty()
    }
}

#[derive(Default)]
pub struct Registry {
    proxies: Vec<EntityProxy>,
    materializations: Vec<Materialization>,
    by_key: HashMap<EntityKey, ProxyId>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("proxies", &self.proxies)
            .field("by_key", &self.by_key)
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn lookup(&self, key: &EntityKey) -> Option<ProxyId> {
        self.by_key.get(key).copied()
    }

    pub fn proxy(&self, id: ProxyId) -> Result<&EntityProxy> {
        self.proxies
            .get(id.0)
            .ok_or(Error::UnknownProxy { id: id.0 })
    }

    pub fn proxy_mut(&mut self, id: ProxyId) -> Result<&mut EntityProxy> {
        self.proxies
            .get_mut(id.0)
            .ok_or(Error::UnknownProxy { id: id.0 })
    }

    pub fn proxy_ids(&self) -> impl Iterator<Item = ProxyId> {
        (0..self.proxies.len()).map(ProxyId)
    }

    pub(crate) fn materialization(&self, id: ProxyId) -> Result<Materialization> {
        self.materializations
            .get(id.0)
            .cloned()
            .ok_or(Error::UnknownProxy { id: id.0 })
    }

    /// Id the next reserved proxy will receive.
    pub(crate) fn next_proxy_id(&self) -> ProxyId {
        ProxyId(self.proxies.len())
    }

    /// Reserve a proxy for an existing identity.
    pub(crate) fn reserve(&mut self, key: EntityKey, fetch: Materialization) -> Result<ProxyId> {
        if self.by_key.contains_key(&key) {
            return Err(Error::ReRegisteredIdentity { key });
        }
        let id = self.push(EntityProxy::new(key.type_name.clone(), Some(key.id.clone())), fetch);
        self.by_key.insert(key, id);
        Ok(id)
    }

    /// Reserve a proxy for an entity that is still being created.
    pub(crate) fn reserve_empty(&mut self, type_name: &str, creation: Materialization) -> ProxyId {
        self.push(EntityProxy::new(type_name.to_string(), None), creation)
    }

    /// Record the id a created entity received.
    pub(crate) fn register(&mut self, id: ProxyId, entity_id: EntityId) -> Result<()> {
        let proxy = self.proxy_mut(id)?;
        let key = EntityKey::new(proxy.type_name.clone(), entity_id.clone());
        proxy.id = Some(entity_id);
        if self.by_key.contains_key(&key) {
            return Err(Error::ReRegisteredIdentity { key });
        }
        self.by_key.insert(key, id);
        Ok(())
    }

    /// Id of the clone already produced for `template`, if it exists remotely.
    pub fn existing_clone_id(&self, template: &EntityKey) -> Option<EntityId> {
        let template = self.lookup(template)?;
        let clone = self.proxies.get(template.0)?.clone_of?;
        self.proxies.get(clone.0)?.id.clone()
    }

    fn push(&mut self, proxy: EntityProxy, materialization: Materialization) -> ProxyId {
        let id = ProxyId(self.proxies.len());
        self.proxies.push(proxy);
        self.materializations.push(materialization);
        id
    }
}

impl CloneSession {
    /// Return the proxy for an identity, fetching the entity on first use.
    pub async fn get_or_fetch(&self, key: &EntityKey) -> Result<ProxyId> {
        let (proxy, materialization) = {
            let mut state = self.lock()?;
            match state.registry.lookup(key) {
                Some(proxy) => (proxy, state.registry.materialization(proxy)?),
                None => {
                    let fetch = self.fetch_future(key.clone())?;
                    let proxy = state.registry.reserve(key.clone(), fetch.clone())?;
                    (proxy, fetch)
                }
            }
        };

        materialization.await?;
        Ok(proxy)
    }

    /// Reserve a proxy for a new entity and start its creation.
    ///
    /// Runs under the caller's lock so that the reservation and whatever the
    /// caller records about it happen before any other task can observe the
    /// registry.
    pub(crate) fn create_empty(
        &self,
        state: &mut SessionState,
        type_name: &str,
        payload: BTreeMap<String, Value>,
        template: EntityKey,
    ) -> ProxyId {
        let proxy = state.registry.next_proxy_id();
        let creation = self.creation_future(proxy, type_name.to_string(), payload, template);
        state.registry.reserve_empty(type_name, creation)
    }

    /// The proxy's entity, once fetched or created.
    pub(crate) async fn entity(&self, proxy: ProxyId) -> Result<Arc<Entity>> {
        let materialization = self.lock()?.registry.materialization(proxy)?;
        Ok(materialization.await?)
    }

    /// Remote id of a proxy whose entity exists.
    pub(crate) fn entity_id(&self, proxy: ProxyId) -> Result<EntityId> {
        let state = self.lock()?;
        let proxy = state.registry.proxy(proxy)?;
        proxy.id.clone().ok_or_else(|| Error::PendingCreation {
            type_name: proxy.type_name.clone(),
        })
    }

    fn fetch_future(&self, key: EntityKey) -> Result<Materialization> {
        let store = Arc::clone(&self.store);
        let events = Arc::clone(&self.events);
        let fields = self.catalog.field_names(&key.type_name)?;

        Ok(async move {
            let entity = store
                .fetch_entity(&key.type_name, &key.id, &fields)
                .await
                .map_err(Arc::new)?;
            debug!("Fetched {}", key);
            events.emit(CloneEvent::Fetched { key });
            Ok(Arc::new(entity))
        }
        .boxed()
        .shared())
    }

    fn creation_future(
        &self,
        proxy: ProxyId,
        type_name: String,
        payload: BTreeMap<String, Value>,
        template: EntityKey,
    ) -> Materialization {
        let store = Arc::clone(&self.store);
        let events = Arc::clone(&self.events);
        let state: Weak<_> = Arc::downgrade(&self.state);

        async move {
            let entity = store
                .create_entity(&type_name, payload)
                .await
                .map_err(Arc::new)?;

            {
                let state = state
                    .upgrade()
                    .ok_or_else(|| Arc::new(Error::lock("session dropped")))?;
                let mut state = state
                    .lock()
                    .map_err(|_| Arc::new(Error::lock("session state")))?;
                state
                    .registry
                    .register(proxy, entity.id.clone())
                    .map_err(Arc::new)?;
            }

            debug!("Created {} as clone of {}", entity.key(), template);
            events.emit(CloneEvent::Created {
                template,
                clone: entity.key(),
            });
            Ok(Arc::new(entity))
        }
        .boxed()
        .shared()
    }
}
