//! # Type Catalog
//!
//! Read-only metadata about entity types: each type's ordered fields, their
//! kinds, cardinality, read-only flag, relation targets and, for fields that
//! are derived by a link rule, the pair of fields the rule correlates.
//!
//! The catalog is built once per session from a [`CatalogFile`]. Building it
//! does three things:
//!
//! 1.  **Interning**: every field gets a stable [`FieldId`], an index into a
//!     flat descriptor table. Memoised lookups are keyed by that id.
//! 2.  **Validation**: relation targets, inverse fields and link-rule fields
//!     must exist. A field kind the clone rules do not know fails here with
//!     `UnhandledFieldKind`, so no field is ever silently dropped later.
//! 3.  **Classification**: each field receives its [`FieldPlan`], the action
//!     the orchestrator takes for it. The orchestrator matches exhaustively on
//!     the plan.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::CloneConfig;
use crate::error::{Error, Result};

/// Field kind as declared by the schema service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Primitive,
    Enum,
    Relation,
    Collection,
    Document,
    File,
    Comments,
    SystemReference,
    View,
    /// Any kind string this crate does not know. Rejected at catalog build.
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

/// Link rule correlating an expression field on this type with one on another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkRule {
    /// Type on the other side of the rule.
    pub correlates: String,
    /// Expression field on the type declaring the rule.
    pub own: String,
    /// Expression field on `correlates`.
    pub other: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub target: Option<String>,
    /// Field on `target` forming the other side of this relation.
    #[serde(default)]
    pub inverse: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub link_rule: Option<LinkRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSpec {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// Catalog file as supplied by the schema service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    pub types: Vec<TypeSpec>,
}

/// Interned field identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

/// How members of a collection field are reproduced on the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPolicy {
    /// Read-only collection populated by a link rule: clone each member and
    /// point the clone back at the subject through the rule's fields.
    AutoLink,
    /// One-sided collection: every member is cloned.
    CloneMembers,
    /// Many-sided collection: members are linked, unless a member is itself
    /// a template entity, in which case it is cloned.
    LinkMembers,
}

/// Action taken for a field when cloning a template into a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPlan {
    ClearTemplateLink,
    ResetTemplateMarker,
    MarkSuppressionTag,
    SkipReadOnly,
    SkipSystem,
    CopyFiles,
    CopyDocument,
    CopyEnumSelection,
    CopyEnumName,
    StripTemplateWord,
    OffsetRank,
    CopyScalar,
    SkipTemplateTargets,
    CopyCollection(CollectionPolicy),
    CloneRelation,
    LinkRelation,
}

impl FieldPlan {
    /// Short label used by the `plan` command and in logs.
    pub fn describe(&self) -> &'static str {
        match self {
            FieldPlan::ClearTemplateLink => "clear template link",
            FieldPlan::ResetTemplateMarker => "reset template marker",
            FieldPlan::MarkSuppressionTag => "append suppression marker",
            FieldPlan::SkipReadOnly => "skip (read-only)",
            FieldPlan::SkipSystem => "skip (system)",
            FieldPlan::CopyFiles => "copy files",
            FieldPlan::CopyDocument => "copy document",
            FieldPlan::CopyEnumSelection => "copy enum selection",
            FieldPlan::CopyEnumName => "copy enum name",
            FieldPlan::StripTemplateWord => "copy name without \"template\"",
            FieldPlan::OffsetRank => "copy rank with offset",
            FieldPlan::CopyScalar => "copy value",
            FieldPlan::SkipTemplateTargets => "skip (template targets)",
            FieldPlan::CopyCollection(CollectionPolicy::AutoLink) => "clone members, auto-link",
            FieldPlan::CopyCollection(CollectionPolicy::CloneMembers) => "clone members",
            FieldPlan::CopyCollection(CollectionPolicy::LinkMembers) => "link members",
            FieldPlan::CloneRelation => "clone target",
            FieldPlan::LinkRelation => "link target",
        }
    }
}

/// Static metadata for one (type, field).
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub holder: String,
    pub name: String,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
    pub target: Option<String>,
    pub inverse: Option<String>,
    pub read_only: bool,
    pub link_rule: Option<LinkRule>,
    /// The other side of this relation is single-valued.
    pub one_sided: bool,
    pub plan: FieldPlan,
}

impl FieldDescriptor {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.holder, self.name)
    }
}

/// Field pairing that makes a clone associate itself with a subject through
/// a link rule: set `other` on the clone to the subject's value of `own`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedFields {
    /// Expression field on the collection holder (the subject side).
    pub own: String,
    /// Expression field on the member type (the clone side).
    pub other: String,
}

/// Immutable, cached type metadata for one clone session.
#[derive(Debug)]
pub struct TypeCatalog {
    fields: Vec<FieldDescriptor>,
    type_order: Vec<String>,
    types: BTreeMap<String, Vec<FieldId>>,
    index: HashMap<(String, String), FieldId>,
    linked: Mutex<HashMap<FieldId, Option<LinkedFields>>>,
}

impl TypeCatalog {
    /// Build a catalog from parsed type specifications.
    pub fn from_types(types: Vec<TypeSpec>, config: &CloneConfig) -> Result<Self> {
        let specs: BTreeMap<&str, &TypeSpec> =
            types.iter().map(|t| (t.name.as_str(), t)).collect();

        let mut catalog = TypeCatalog {
            fields: Vec::new(),
            type_order: Vec::new(),
            types: BTreeMap::new(),
            index: HashMap::new(),
            linked: Mutex::new(HashMap::new()),
        };

        for type_spec in &types {
            if catalog.types.contains_key(&type_spec.name) {
                return Err(Error::ConfigParse {
                    message: format!("type {} is declared twice", type_spec.name),
                    hint: None,
                });
            }

            let mut ids = Vec::with_capacity(type_spec.fields.len());
            for spec in &type_spec.fields {
                let key = (type_spec.name.clone(), spec.name.clone());
                if catalog.index.contains_key(&key) {
                    return Err(Error::ConfigParse {
                        message: format!("field {}.{} is declared twice", key.0, key.1),
                        hint: None,
                    });
                }

                let one_sided = resolve_one_sided(&type_spec.name, spec, &specs)?;
                validate_link_rule(&type_spec.name, spec, &specs)?;
                let plan = classify(&type_spec.name, spec, one_sided, config)?;

                let id = FieldId(catalog.fields.len());
                catalog.fields.push(FieldDescriptor {
                    id,
                    holder: type_spec.name.clone(),
                    name: spec.name.clone(),
                    kind: spec.kind,
                    cardinality: spec.cardinality,
                    target: spec.target.clone(),
                    inverse: spec.inverse.clone(),
                    read_only: spec.read_only,
                    link_rule: spec.link_rule.clone(),
                    one_sided,
                    plan,
                });
                catalog.index.insert(key, id);
                ids.push(id);
            }

            catalog.type_order.push(type_spec.name.clone());
            catalog.types.insert(type_spec.name.clone(), ids);
        }

        debug!(
            "Catalog built: {} types, {} fields",
            catalog.type_order.len(),
            catalog.fields.len()
        );
        Ok(catalog)
    }

    /// Parse and build a catalog from YAML.
    pub fn from_yaml(yaml_content: &str, config: &CloneConfig) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml_content)?;
        Self::from_types(file.types, config)
    }

    /// Load and build a catalog from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P, config: &CloneConfig) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_yaml(&content, config)
    }

    /// Type names in declaration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.type_order.iter().map(String::as_str)
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Fields of a type, in catalog order.
    pub fn fields_of(&self, type_name: &str) -> Result<Vec<&FieldDescriptor>> {
        let ids = self.types.get(type_name).ok_or_else(|| Error::UnknownType {
            name: type_name.to_string(),
        })?;
        Ok(ids.iter().map(|id| &self.fields[id.0]).collect())
    }

    /// Names of every field of a type, as requested from the store on fetch.
    pub fn field_names(&self, type_name: &str) -> Result<Vec<String>> {
        Ok(self
            .fields_of(type_name)?
            .into_iter()
            .map(|field| field.name.clone())
            .collect())
    }

    pub fn field(&self, id: FieldId) -> &FieldDescriptor {
        &self.fields[id.0]
    }

    pub fn field_named(&self, type_name: &str, field_name: &str) -> Option<&FieldDescriptor> {
        self.index
            .get(&(type_name.to_string(), field_name.to_string()))
            .map(|id| &self.fields[id.0])
    }

    pub fn has_field(&self, type_name: &str, field_name: &str) -> bool {
        self.field_named(type_name, field_name).is_some()
    }

    /// Names of document fields of a type.
    pub fn document_fields_of(&self, type_name: &str) -> Vec<&str> {
        self.types
            .get(type_name)
            .into_iter()
            .flatten()
            .map(|id| &self.fields[id.0])
            .filter(|field| field.kind == FieldKind::Document)
            .map(|field| field.name.as_str())
            .collect()
    }

    /// Auto-link pairing for a relation derived by a link rule.
    ///
    /// Looks for the unique field on the relation's target type whose link
    /// rule correlates back to the relation's holder. Returns `None` when no
    /// such field exists and `SchemaAmbiguity` when more than one does.
    pub fn linked_fields_of(&self, id: FieldId) -> Result<Option<LinkedFields>> {
        {
            let memo = self.linked.lock().map_err(|_| Error::lock("linked fields memo"))?;
            if let Some(cached) = memo.get(&id) {
                return Ok(cached.clone());
            }
        }

        let linked = self.compute_linked_fields(self.field(id))?;

        let mut memo = self.linked.lock().map_err(|_| Error::lock("linked fields memo"))?;
        memo.insert(id, linked.clone());
        Ok(linked)
    }

    fn compute_linked_fields(&self, field: &FieldDescriptor) -> Result<Option<LinkedFields>> {
        let Some(target) = field.target.as_deref() else {
            return Ok(None);
        };

        let candidates: Vec<&FieldDescriptor> = self
            .fields_of(target)?
            .into_iter()
            .filter(|candidate| {
                candidate
                    .link_rule
                    .as_ref()
                    .is_some_and(|rule| rule.correlates == field.holder)
            })
            .collect();

        match candidates.as_slice() {
            [] => Ok(None),
            [single] => Ok(single.link_rule.as_ref().map(|rule| LinkedFields {
                own: rule.other.clone(),
                other: rule.own.clone(),
            })),
            many => Err(Error::SchemaAmbiguity {
                field: field.qualified_name(),
                candidates: many.iter().map(|c| c.qualified_name()).collect(),
            }),
        }
    }

    /// Resolve every auto-link pairing up front.
    ///
    /// Returns the read-only collections that have no pairing; an ambiguous
    /// pairing is an error.
    pub fn validate(&self) -> Result<Vec<&FieldDescriptor>> {
        let mut unpaired = Vec::new();
        for field in &self.fields {
            if field.plan == FieldPlan::CopyCollection(CollectionPolicy::AutoLink)
                && self.linked_fields_of(field.id)?.is_none()
            {
                unpaired.push(field);
            }
        }
        Ok(unpaired)
    }
}

fn target_spec<'a>(
    holder: &str,
    spec: &FieldSpec,
    specs: &BTreeMap<&str, &'a TypeSpec>,
) -> Result<&'a TypeSpec> {
    let target = spec.target.as_deref().ok_or_else(|| Error::ConfigParse {
        message: format!("{}.{} has no target type", holder, spec.name),
        hint: Some("Relations and collections need a `target:` key".to_string()),
    })?;
    specs.get(target).copied().ok_or_else(|| Error::UnknownType {
        name: target.to_string(),
    })
}

fn resolve_one_sided(
    holder: &str,
    spec: &FieldSpec,
    specs: &BTreeMap<&str, &TypeSpec>,
) -> Result<bool> {
    if !matches!(spec.kind, FieldKind::Relation | FieldKind::Collection) {
        return Ok(false);
    }

    let target = target_spec(holder, spec, specs)?;
    let Some(inverse) = spec.inverse.as_deref() else {
        return Ok(false);
    };

    let other_side = target
        .fields
        .iter()
        .find(|field| field.name == inverse)
        .ok_or_else(|| Error::UnknownField {
            holder: target.name.clone(),
            field: inverse.to_string(),
        })?;

    Ok(other_side.kind == FieldKind::Relation)
}

fn validate_link_rule(
    holder: &str,
    spec: &FieldSpec,
    specs: &BTreeMap<&str, &TypeSpec>,
) -> Result<()> {
    let Some(rule) = &spec.link_rule else {
        return Ok(());
    };

    let own_type = specs.get(holder).copied().ok_or_else(|| Error::UnknownType {
        name: holder.to_string(),
    })?;
    let other_type = specs
        .get(rule.correlates.as_str())
        .copied()
        .ok_or_else(|| Error::UnknownType {
            name: rule.correlates.clone(),
        })?;

    for (type_spec, field_name) in [(own_type, &rule.own), (other_type, &rule.other)] {
        if !type_spec.fields.iter().any(|f| &f.name == field_name) {
            return Err(Error::UnknownField {
                holder: type_spec.name.clone(),
                field: field_name.clone(),
            });
        }
    }
    Ok(())
}

/// Decide the clone action for a field. Rules are checked in order and the
/// first match wins.
fn classify(
    holder: &str,
    spec: &FieldSpec,
    one_sided: bool,
    config: &CloneConfig,
) -> Result<FieldPlan> {
    if spec.kind == FieldKind::Unrecognized {
        return Err(Error::UnhandledFieldKind {
            holder: holder.to_string(),
            field: spec.name.clone(),
        });
    }

    if spec.name == config.template_field {
        return Ok(FieldPlan::ClearTemplateLink);
    }
    if spec.name == config.template_marker_field {
        return Ok(FieldPlan::ResetTemplateMarker);
    }
    if spec.name == config.suppression_tag_field {
        return Ok(FieldPlan::MarkSuppressionTag);
    }
    if spec.read_only && spec.kind != FieldKind::Collection {
        return Ok(FieldPlan::SkipReadOnly);
    }

    let plan = match spec.kind {
        FieldKind::Comments | FieldKind::SystemReference | FieldKind::View => {
            FieldPlan::SkipSystem
        }
        FieldKind::File => FieldPlan::CopyFiles,
        FieldKind::Document => FieldPlan::CopyDocument,
        FieldKind::Enum => match spec.cardinality {
            Cardinality::Many => FieldPlan::CopyEnumSelection,
            Cardinality::One => FieldPlan::CopyEnumName,
        },
        FieldKind::Primitive if spec.name == config.name_field => FieldPlan::StripTemplateWord,
        FieldKind::Primitive if spec.name == config.rank_field => FieldPlan::OffsetRank,
        FieldKind::Primitive => FieldPlan::CopyScalar,
        FieldKind::Collection if spec.name == config.template_targets_field => {
            FieldPlan::SkipTemplateTargets
        }
        FieldKind::Collection if spec.read_only => {
            FieldPlan::CopyCollection(CollectionPolicy::AutoLink)
        }
        FieldKind::Collection if one_sided => {
            FieldPlan::CopyCollection(CollectionPolicy::CloneMembers)
        }
        FieldKind::Collection => FieldPlan::CopyCollection(CollectionPolicy::LinkMembers),
        FieldKind::Relation if one_sided => FieldPlan::CloneRelation,
        FieldKind::Relation => FieldPlan::LinkRelation,
        FieldKind::Unrecognized => {
            return Err(Error::UnhandledFieldKind {
                holder: holder.to_string(),
                field: spec.name.clone(),
            })
        }
    };
    Ok(plan)
}
