//! Clone Orchestrator
//!
//! Walks a template's field graph and populates a subject from it. Primitive
//! fields are staged immediately; relations, collection members and
//! documents become child tasks that are driven concurrently and joined
//! before the template's references are resolved.
//!
//! Each template is cloned at most once per session. The first branch to ask
//! for a template reserves its clone and records it on the template proxy in
//! the same critical section; every later branch awaits that clone's
//! creation instead of creating another.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use log::{debug, info, warn};

use super::registry::ProxyId;
use super::CloneSession;
use crate::catalog::{CollectionPolicy, FieldDescriptor, FieldPlan, LinkedFields};
use crate::error::{Error, Result};
use crate::events::CloneEvent;
use crate::transform::{offset_rank, with_marker};
use crate::value::{Entity, EntityId, EntityKey, Value};

/// Where a clone request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneContext {
    pub parent: Option<EntityKey>,
    pub field: Option<String>,
}

impl CloneContext {
    pub fn field(parent: EntityKey, field: impl Into<String>) -> Self {
        Self {
            parent: Some(parent),
            field: Some(field.into()),
        }
    }
}

type Task<'a> = BoxFuture<'a, Result<()>>;

impl CloneSession {
    /// Populate `subject` from a template.
    ///
    /// The template defaults to the subject's own template link. Returns the
    /// template's key once the whole graph below it has been staged; nothing
    /// is written to the store until [`commit`](Self::commit).
    pub async fn clone_from_template(
        &self,
        subject: ProxyId,
        template: Option<EntityId>,
    ) -> Result<EntityKey> {
        let subject_entity = self.entity(subject).await?;
        let subject_key = subject_entity.key();

        let template_id = match template {
            Some(id) => id,
            None => subject_entity
                .field(&self.config.template_field)
                .and_then(Value::as_ref_id)
                .cloned()
                .ok_or_else(|| Error::MissingTemplateReference {
                    subject: subject_key.to_string(),
                })?,
        };
        let template_key = EntityKey::new(subject_key.type_name.clone(), template_id);

        {
            let state = self.lock()?;
            if template_key == subject_key || state.registry.proxy(subject)?.clone_of.is_some() {
                return Err(Error::SubjectIsCloneSource {
                    subject: subject_key.to_string(),
                });
            }
            if state.references.is_resolved(&template_key) {
                return Err(Error::ReResolvedTemplate { key: template_key });
            }
        }

        let template = self.get_or_fetch(&template_key).await?;
        {
            let mut state = self.lock()?;
            let proxy = state.registry.proxy_mut(template)?;
            if proxy.clone_of.is_none() {
                proxy.clone_of = Some(subject);
            }
        }

        info!("Cloning {} from template {}", subject_key, template_key);
        self.populate(subject, template).await?;
        Ok(template_key)
    }

    /// Clone of a template, creating it on first request.
    ///
    /// Concurrent requests for the same template return the same proxy and
    /// cause a single remote creation. Only the request that created the
    /// clone populates it; the others return as soon as it exists.
    pub async fn get_or_create_clone(
        &self,
        type_name: &str,
        template_id: &EntityId,
        context: CloneContext,
    ) -> Result<ProxyId> {
        let template_key = EntityKey::new(type_name, template_id.clone());
        let template = self.get_or_fetch(&template_key).await?;
        let template_entity = self.entity(template).await?;

        self.events.emit(CloneEvent::CloneRequested {
            template: template_key.clone(),
            parent: context.parent,
            field: context.field,
        });

        let (clone, originator) = {
            let mut state = self.lock()?;
            match state.registry.proxy(template)?.clone_of {
                Some(existing) => (existing, false),
                None => {
                    let payload = self.creation_payload(&template_entity);
                    let clone =
                        self.create_empty(&mut state, type_name, payload, template_key.clone());
                    state.registry.proxy_mut(template)?.clone_of = Some(clone);
                    (clone, true)
                }
            }
        };

        if !originator {
            debug!("Reusing clone of {}", template_key);
            self.events.emit(CloneEvent::CloneDeduplicated {
                template: template_key,
            });
        }

        self.entity(clone).await?;
        if originator {
            self.populate(clone, template).await?;
        }
        Ok(clone)
    }

    /// Initial payload of a new clone: its raw name plus the suppression tag
    /// so that external automations ignore the half-built entity.
    fn creation_payload(&self, template: &Entity) -> BTreeMap<String, Value> {
        let mut payload = BTreeMap::new();
        let config = &self.config;
        let type_name = &template.type_name;

        if self.catalog.has_field(type_name, &config.name_field) {
            if let Some(name) = template.field(&config.name_field) {
                payload.insert(config.name_field.clone(), name.clone());
            }
        }
        if self.catalog.has_field(type_name, &config.suppression_tag_field) {
            let tag = template
                .field(&config.suppression_tag_field)
                .and_then(Value::as_text);
            payload.insert(
                config.suppression_tag_field.clone(),
                Value::text(with_marker(tag, &config.suppression_marker)),
            );
        }
        payload
    }

    /// Stage every field of `template` onto `subject`, then retarget links
    /// that pointed at the template.
    fn populate(&self, subject: ProxyId, template: ProxyId) -> BoxFuture<'_, Result<()>> {
        async move {
            let template_entity = self.entity(template).await?;
            let subject_entity = self.entity(subject).await?;
            let template_key = template_entity.key();
            let subject_key = subject_entity.key();
            self.lock()?.registry.proxy_mut(subject)?.is_clone = true;

            let mut tasks: Vec<Task<'_>> = Vec::new();
            let mut collections = Vec::new();

            for field in self.catalog.fields_of(&template_entity.type_name)? {
                let name = field.name.as_str();
                let value = template_entity.field(name);

                match field.plan {
                    FieldPlan::ClearTemplateLink => {
                        self.stage(subject, name, Value::Ref(None))?;
                    }
                    FieldPlan::ResetTemplateMarker => {
                        self.stage(subject, name, Value::Scalar(serde_json::Value::Bool(false)))?;
                    }
                    FieldPlan::MarkSuppressionTag => {
                        let tag = with_marker(
                            value.and_then(Value::as_text),
                            &self.config.suppression_marker,
                        );
                        self.stage(subject, name, Value::text(tag))?;
                    }
                    FieldPlan::SkipReadOnly
                    | FieldPlan::SkipSystem
                    | FieldPlan::SkipTemplateTargets => {}
                    FieldPlan::CopyFiles => {
                        if let Some(Value::Files(files)) = value {
                            let mut state = self.lock()?;
                            let proxy = state.registry.proxy_mut(subject)?;
                            proxy.pending_files.extend(files.iter().cloned());
                        }
                    }
                    FieldPlan::CopyDocument => {
                        tasks.push(
                            self.copy_document(
                                field,
                                Arc::clone(&template_entity),
                                Arc::clone(&subject_entity),
                            )
                            .boxed(),
                        );
                    }
                    FieldPlan::CopyEnumSelection => {
                        let entries = value.map(Value::as_refs).unwrap_or_default();
                        let mut state = self.lock()?;
                        for entry in entries {
                            state.push_member(subject, name, entry.clone())?;
                        }
                    }
                    FieldPlan::StripTemplateWord => match value {
                        Some(Value::Scalar(serde_json::Value::String(text))) => {
                            self.stage(subject, name, Value::text(self.names.strip(text)))?;
                        }
                        Some(other) => self.stage(subject, name, other.clone())?,
                        None => {}
                    },
                    FieldPlan::OffsetRank => {
                        self.stage(subject, name, offset_rank(value, self.config.rank_offset))?;
                    }
                    FieldPlan::CopyEnumName | FieldPlan::CopyScalar => {
                        if let Some(value) = value {
                            self.stage(subject, name, value.clone())?;
                        }
                    }
                    FieldPlan::CopyCollection(policy) => collections.push((field, policy)),
                    FieldPlan::CloneRelation => {
                        if let Some(target) = self.related_key(field, value)? {
                            tasks.push(self.clone_relation(subject, field, target).boxed());
                        }
                    }
                    FieldPlan::LinkRelation => {
                        if let Some(target) = self.related_key(field, value)? {
                            self.lock()?.link_relation(subject, name, target)?;
                        }
                    }
                }
            }

            for (field, policy) in collections {
                let Some(target_type) = field.target.as_deref() else {
                    continue;
                };
                let members = template_entity
                    .field(&field.name)
                    .map(Value::as_refs)
                    .unwrap_or_default();
                let member_keys = members
                    .iter()
                    .map(|id| EntityKey::new(target_type, id.clone()));

                match policy {
                    CollectionPolicy::AutoLink => match self.catalog.linked_fields_of(field.id)? {
                        Some(linked) => {
                            for member in member_keys {
                                tasks.push(
                                    self.auto_link_member(
                                        subject,
                                        Arc::clone(&subject_entity),
                                        field,
                                        member,
                                        linked.clone(),
                                    )
                                    .boxed(),
                                );
                            }
                        }
                        None => {
                            if !members.is_empty() {
                                warn!(
                                    "Skipping {}: no link rule pairs it with {}",
                                    field.qualified_name(),
                                    target_type
                                );
                            }
                        }
                    },
                    CollectionPolicy::CloneMembers => {
                        for member in member_keys {
                            let slot = self.lock()?.reserve_member(
                                subject,
                                &field.name,
                                member.id.clone(),
                            )?;
                            tasks.push(self.clone_member(subject, field, member, slot).boxed());
                        }
                    }
                    CollectionPolicy::LinkMembers => {
                        let members_can_be_templates = self
                            .catalog
                            .has_field(target_type, &self.config.template_marker_field);
                        for member in member_keys {
                            if members_can_be_templates {
                                let slot = self.lock()?.reserve_member(
                                    subject,
                                    &field.name,
                                    member.id.clone(),
                                )?;
                                tasks.push(
                                    self.link_or_clone_member(subject, field, member, slot)
                                        .boxed(),
                                );
                            } else {
                                self.lock()?.link_member(subject, &field.name, member)?;
                            }
                        }
                    }
                }
            }

            debug!("{}: {} child tasks from {}", subject_key, tasks.len(), template_key);
            future::try_join_all(tasks).await?;

            let retargeted = {
                let mut state = self.lock()?;
                let super::SessionState {
                    registry,
                    references,
                } = &mut *state;
                references.resolve_references_to(&template_key, &subject_key.id, registry)?
            };
            self.events.emit(CloneEvent::ReferencesResolved {
                template: template_key,
                clone: subject_key,
                retargeted,
            });
            Ok(())
        }
        .boxed()
    }

    fn stage(&self, proxy: ProxyId, field: &str, value: Value) -> Result<()> {
        self.lock()?
            .registry
            .proxy_mut(proxy)?
            .pending_fields
            .insert(field.to_string(), value);
        Ok(())
    }

    fn related_key(
        &self,
        field: &FieldDescriptor,
        value: Option<&Value>,
    ) -> Result<Option<EntityKey>> {
        let Some(id) = value.and_then(Value::as_ref_id) else {
            return Ok(None);
        };
        let target = field.target.as_deref().ok_or_else(|| Error::UnknownField {
            holder: field.holder.clone(),
            field: field.name.clone(),
        })?;
        Ok(Some(EntityKey::new(target, id.clone())))
    }

    async fn clone_relation(
        &self,
        subject: ProxyId,
        field: &FieldDescriptor,
        target: EntityKey,
    ) -> Result<()> {
        let clone = self.clone_for(subject, field, &target).await?;
        let clone_id = self.entity_id(clone)?;
        self.stage(subject, &field.name, Value::Ref(Some(clone_id)))
    }

    async fn clone_member(
        &self,
        subject: ProxyId,
        field: &FieldDescriptor,
        member: EntityKey,
        slot: usize,
    ) -> Result<()> {
        let clone = self.clone_for(subject, field, &member).await?;
        let clone_id = self.entity_id(clone)?;
        self.lock()?.fill_member(subject, &field.name, slot, clone_id)
    }

    /// Members that are templates in their own right are cloned; all
    /// others are linked.
    async fn link_or_clone_member(
        &self,
        subject: ProxyId,
        field: &FieldDescriptor,
        member: EntityKey,
        slot: usize,
    ) -> Result<()> {
        let proxy = self.get_or_fetch(&member).await?;
        let entity = self.entity(proxy).await?;
        let is_template = entity
            .field(&self.config.template_marker_field)
            .is_some_and(Value::is_truthy);

        if is_template {
            self.clone_member(subject, field, member, slot).await
        } else {
            self.lock()?.link_member_at(subject, &field.name, slot, member)
        }
    }

    /// Clone a member of a rule-derived collection and point the clone back
    /// at the subject through the rule's fields.
    async fn auto_link_member(
        &self,
        subject: ProxyId,
        subject_entity: Arc<Entity>,
        field: &FieldDescriptor,
        member: EntityKey,
        linked: LinkedFields,
    ) -> Result<()> {
        let clone = self.clone_for(subject, field, &member).await?;

        let staged = self
            .lock()?
            .registry
            .proxy(subject)?
            .pending_fields
            .get(&linked.own)
            .cloned();
        match staged.or_else(|| subject_entity.field(&linked.own).cloned()) {
            Some(value) => self.stage(clone, &linked.other, value),
            None => {
                warn!(
                    "{} has no value for {}, clone of {} stays unlinked",
                    subject_entity.key(),
                    linked.own,
                    member
                );
                Ok(())
            }
        }
    }

    async fn clone_for(
        &self,
        subject: ProxyId,
        field: &FieldDescriptor,
        target: &EntityKey,
    ) -> Result<ProxyId> {
        let parent = self.lock()?.registry.proxy(subject)?.key();
        let context = CloneContext {
            parent,
            field: Some(field.name.clone()),
        };
        self.get_or_create_clone(&target.type_name, &target.id, context)
            .await
    }

    async fn copy_document(
        &self,
        field: &FieldDescriptor,
        template: Arc<Entity>,
        subject: Arc<Entity>,
    ) -> Result<()> {
        let Some(Value::Document(Some(source))) = template.field(&field.name) else {
            return Ok(());
        };
        let Some(Value::Document(Some(destination))) = subject.field(&field.name) else {
            return Err(Error::MissingDocument {
                key: subject.key().to_string(),
                field: field.name.clone(),
            });
        };

        let format = self.config.document_format;
        let content = self.store.get_document_content(source, format).await?;
        self.store
            .set_document_content(destination, &content, format)
            .await?;

        self.events.emit(CloneEvent::DocumentCopied {
            key: subject.key(),
            field: field.name.clone(),
        });
        Ok(())
    }
}
