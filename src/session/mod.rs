//! # Clone Sessions
//!
//! A [`CloneSession`] owns everything one clone run needs: the immutable
//! [`TypeCatalog`], the [`EntityStore`] it talks to, the registry of proxies
//! and the reference tracker. Sessions are independent; nothing is shared
//! between them except the catalog.
//!
//! ## Lifecycle
//!
//! 1. [`CloneSession::get_or_fetch`] loads the subject.
//! 2. [`CloneSession::clone_from_template`] walks the template graph, creating
//!    clones and staging their field values as pending writes.
//! 3. [`CloneSession::commit`] flushes every pending write to the store.
//!
//! [`CloneSession::clone_subject`] runs all three for a single subject.
//!
//! Session state sits behind one mutex that is only ever held between
//! suspension points, never across one. Tasks spawned by a clone run are
//! driven concurrently on the caller's task, so no state is shared across
//! threads beyond what the store implementation itself does.

use std::sync::{Arc, Mutex, MutexGuard};

use log::info;
use tokio::sync::mpsc;

use crate::catalog::TypeCatalog;
use crate::config::CloneConfig;
use crate::error::{Error, Result};
use crate::events::{CloneEvent, EventSink};
use crate::store::EntityStore;
use crate::transform::NameTransform;
use crate::value::{EntityId, EntityKey};

pub mod commit;
pub mod orchestrator;
pub mod references;
pub mod registry;

pub use commit::CommitReport;
pub use orchestrator::CloneContext;
pub use references::{ReferenceRecord, ReferenceTracker};
pub use registry::{EntityProxy, ProxyId, Registry};

/// Mutable state of a session.
#[derive(Debug, Default)]
pub struct SessionState {
    pub(crate) registry: Registry,
    pub(crate) references: ReferenceTracker,
}

/// Result of cloning and committing one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    pub subject: EntityKey,
    pub template: EntityKey,
    pub report: CommitReport,
}

pub struct CloneSession {
    catalog: Arc<TypeCatalog>,
    store: Arc<dyn EntityStore>,
    config: Arc<CloneConfig>,
    names: NameTransform,
    state: Arc<Mutex<SessionState>>,
    events: Arc<EventSink>,
}

impl CloneSession {
    pub fn new(
        catalog: Arc<TypeCatalog>,
        store: Arc<dyn EntityStore>,
        config: CloneConfig,
    ) -> Result<Self> {
        Ok(Self {
            catalog,
            store,
            names: NameTransform::new()?,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(SessionState::default())),
            events: Arc::new(EventSink::default()),
        })
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &CloneConfig {
        &self.config
    }

    /// Receive [`CloneEvent`]s for everything this session does from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CloneEvent> {
        self.events.subscribe()
    }

    /// Snapshot of a proxy's current state.
    pub fn proxy(&self, id: ProxyId) -> Result<EntityProxy> {
        Ok(self.lock()?.registry.proxy(id)?.clone())
    }

    pub fn lookup(&self, key: &EntityKey) -> Result<Option<ProxyId>> {
        Ok(self.lock()?.registry.lookup(key))
    }

    /// Every (template, clone) pair produced so far, in creation order.
    pub fn clone_pairs(&self) -> Result<Vec<(EntityKey, EntityKey)>> {
        let state = self.lock()?;
        let mut pairs = Vec::new();
        for id in state.registry.proxy_ids() {
            let template = state.registry.proxy(id)?;
            let Some(clone) = template.clone_of else {
                continue;
            };
            if let (Some(template_key), Some(clone_key)) =
                (template.key(), state.registry.proxy(clone)?.key())
            {
                pairs.push((template_key, clone_key));
            }
        }
        pairs.sort_by_key(|(_, clone)| {
            state.registry.lookup(clone).map_or(usize::MAX, |id| id.index())
        });
        Ok(pairs)
    }

    /// Clone `template` (or the subject's own template link) into `subject`
    /// and commit the result.
    pub async fn clone_subject(
        &self,
        subject: &EntityKey,
        template: Option<EntityId>,
    ) -> Result<CloneOutcome> {
        let proxy = self.get_or_fetch(subject).await?;
        let template = self.clone_from_template(proxy, template).await?;
        let report = self.commit().await?;
        info!(
            "Cloned {} into {}: {} clones, {} updates",
            template, subject, report.clones, report.updates
        );
        Ok(CloneOutcome {
            subject: subject.clone(),
            template,
            report,
        })
    }

    /// Clone several subjects one after another.
    ///
    /// Each subject starts from an empty registry and reference tracker, so
    /// subjects sharing a template each get their own clones and none of
    /// them links to another's. Stops at the first failure; subjects
    /// committed before it stay committed. Afterwards the session holds the
    /// state of the last subject attempted.
    pub async fn clone_subjects(
        &self,
        subjects: &[(EntityKey, Option<EntityId>)],
    ) -> Result<Vec<CloneOutcome>> {
        let mut outcomes = Vec::with_capacity(subjects.len());
        for (subject, template) in subjects {
            self.reset()?;
            outcomes.push(self.clone_subject(subject, template.clone()).await?);
        }
        Ok(outcomes)
    }

    /// Forget every proxy and reference of earlier runs.
    fn reset(&self) -> Result<()> {
        *self.lock()? = SessionState::default();
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, SessionState>> {
        self.state.lock().map_err(|_| Error::lock("session state"))
    }
}
