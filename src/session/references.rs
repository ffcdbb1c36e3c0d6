//! Reference Tracker
//!
//! Links written onto clones may point at entities that are themselves
//! templates whose clones do not exist yet. Those links are written with the
//! template's id and recorded here; once the template's clone has been fully
//! populated, every recorded link is retargeted to the clone.

use std::collections::HashMap;

use super::registry::{ProxyId, Registry};
use super::SessionState;
use crate::error::{Error, Result};
use crate::value::{EntityId, EntityKey, Value};

/// A link on `referencer` that points at a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub referencer: ProxyId,
    pub field: String,
    /// Position in a pending collection, or `None` for a single relation.
    pub slot: Option<usize>,
}

#[derive(Debug, Default)]
pub struct ReferenceTracker {
    pending: HashMap<EntityKey, Vec<ReferenceRecord>>,
    resolved: HashMap<EntityKey, EntityId>,
}

impl ReferenceTracker {
    pub fn record_reference(&mut self, target: EntityKey, record: ReferenceRecord) {
        self.pending.entry(target).or_default().push(record);
    }

    pub fn is_resolved(&self, template: &EntityKey) -> bool {
        self.resolved.contains_key(template)
    }

    /// Clone that replaced `template`, once its references were resolved.
    pub fn resolved_clone(&self, template: &EntityKey) -> Option<&EntityId> {
        self.resolved.get(template)
    }

    pub fn pending_count(&self, template: &EntityKey) -> usize {
        self.pending.get(template).map_or(0, Vec::len)
    }

    /// Retarget every recorded link to `template` onto `clone`.
    ///
    /// Returns the number of links rewritten. Resolving the same template
    /// twice is an invariant violation.
    pub fn resolve_references_to(
        &mut self,
        template: &EntityKey,
        clone: &EntityId,
        registry: &mut Registry,
    ) -> Result<usize> {
        if self.resolved.contains_key(template) {
            return Err(Error::ReResolvedTemplate {
                key: template.clone(),
            });
        }

        let records = self.pending.remove(template).unwrap_or_default();
        for record in &records {
            let proxy = registry.proxy_mut(record.referencer)?;
            match record.slot {
                None => {
                    proxy
                        .pending_fields
                        .insert(record.field.clone(), Value::Ref(Some(clone.clone())));
                }
                Some(slot) => {
                    // a slot already flushed by an earlier commit is gone
                    if let Some(member) = proxy
                        .pending_collections
                        .get_mut(&record.field)
                        .and_then(|members| members.get_mut(slot))
                    {
                        *member = clone.clone();
                    }
                }
            }
        }

        self.resolved.insert(template.clone(), clone.clone());
        Ok(records.len())
    }
}

impl SessionState {
    /// Id to write for a link from `referencer` to `target`.
    ///
    /// Prefers a clone of `target` made earlier in the session. Otherwise the
    /// link keeps pointing at `target` and is recorded for retargeting.
    pub(crate) fn link_target(
        &mut self,
        referencer: ProxyId,
        field: &str,
        slot: Option<usize>,
        target: EntityKey,
    ) -> EntityId {
        if let Some(clone) = self.references.resolved_clone(&target) {
            return clone.clone();
        }
        if let Some(clone) = self.registry.existing_clone_id(&target) {
            return clone;
        }

        let id = target.id.clone();
        self.references.record_reference(
            target,
            ReferenceRecord {
                referencer,
                field: field.to_string(),
                slot,
            },
        );
        id
    }

    /// Set a single relation on `referencer` to `target`, retargetable.
    pub(crate) fn link_relation(
        &mut self,
        referencer: ProxyId,
        field: &str,
        target: EntityKey,
    ) -> Result<()> {
        let id = self.link_target(referencer, field, None, target);
        self.registry
            .proxy_mut(referencer)?
            .pending_fields
            .insert(field.to_string(), Value::Ref(Some(id)));
        Ok(())
    }

    /// Append `target` to a pending collection on `referencer`, retargetable.
    pub(crate) fn link_member(
        &mut self,
        referencer: ProxyId,
        field: &str,
        target: EntityKey,
    ) -> Result<()> {
        let slot = self
            .registry
            .proxy(referencer)?
            .pending_collections
            .get(field)
            .map_or(0, Vec::len);
        let id = self.link_target(referencer, field, Some(slot), target);
        self.push_member(referencer, field, id)
    }

    /// Reserve the next slot of a pending collection for a member resolved
    /// later, holding `placeholder` until then. Keeps template order no
    /// matter which member task finishes first.
    pub(crate) fn reserve_member(
        &mut self,
        referencer: ProxyId,
        field: &str,
        placeholder: EntityId,
    ) -> Result<usize> {
        let members = self
            .registry
            .proxy_mut(referencer)?
            .pending_collections
            .entry(field.to_string())
            .or_default();
        members.push(placeholder);
        Ok(members.len() - 1)
    }

    /// Write the final id into a slot taken by [`reserve_member`](Self::reserve_member).
    pub(crate) fn fill_member(
        &mut self,
        referencer: ProxyId,
        field: &str,
        slot: usize,
        member: EntityId,
    ) -> Result<()> {
        let proxy = self.registry.proxy_mut(referencer)?;
        let holder = proxy.type_name.clone();
        let entry = proxy
            .pending_collections
            .get_mut(field)
            .and_then(|members| members.get_mut(slot))
            .ok_or_else(|| Error::UnknownField {
                holder,
                field: format!("{}[{}]", field, slot),
            })?;
        *entry = member;
        Ok(())
    }

    /// Link `target` into a reserved slot, retargetable.
    pub(crate) fn link_member_at(
        &mut self,
        referencer: ProxyId,
        field: &str,
        slot: usize,
        target: EntityKey,
    ) -> Result<()> {
        let id = self.link_target(referencer, field, Some(slot), target);
        self.fill_member(referencer, field, slot, id)
    }

    /// Append an already final id to a pending collection.
    pub(crate) fn push_member(
        &mut self,
        referencer: ProxyId,
        field: &str,
        member: EntityId,
    ) -> Result<()> {
        self.registry
            .proxy_mut(referencer)?
            .pending_collections
            .entry(field.to_string())
            .or_default()
            .push(member);
        Ok(())
    }
}
