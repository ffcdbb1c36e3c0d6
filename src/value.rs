//! Entity identities and field values exchanged with the entity store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote identifier of an entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of an entity: its type plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(type_name: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_name, self.id)
    }
}

/// An attached file, copied to clones by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    pub name: String,
}

/// Value of a single field.
///
/// Serialized externally tagged, e.g. `{"scalar": 5}` or `{"ref": "p1"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Text, number, boolean or null.
    Scalar(serde_json::Value),
    /// Single-valued relation.
    Ref(Option<EntityId>),
    /// Collection members or multi-select enum entries, in order.
    Refs(Vec<EntityId>),
    /// Display name of the selected single-select enum entry.
    Choice(Option<String>),
    /// Secret of the rich-text document backing the field.
    Document(Option<String>),
    Files(Vec<FileRef>),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Scalar(serde_json::Value::String(text.into()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Scalar(serde_json::Value::String(text)) => Some(text),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<&EntityId> {
        match self {
            Value::Ref(id) => id.as_ref(),
            _ => None,
        }
    }

    pub fn as_refs(&self) -> &[EntityId] {
        match self {
            Value::Refs(ids) => ids,
            _ => &[],
        }
    }

    /// Truthiness used for the is-template marker.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Scalar(serde_json::Value::Bool(flag)) => *flag,
            Value::Scalar(serde_json::Value::Null) => false,
            Value::Scalar(serde_json::Value::String(text)) => !text.is_empty(),
            Value::Scalar(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::Scalar(_) => true,
            Value::Ref(id) => id.is_some(),
            Value::Refs(ids) => !ids.is_empty(),
            Value::Choice(name) => name.is_some(),
            Value::Document(secret) => secret.is_some(),
            Value::Files(files) => !files.is_empty(),
        }
    }
}

/// A fetched or created entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: EntityId,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(type_name: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.type_name.clone(), self.id.clone())
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_key_display() {
        let key = EntityKey::new("Task", "t1");
        assert_eq!(key.to_string(), "Task/t1");
    }

    #[test]
    fn test_value_serialization_is_tagged() {
        let value = Value::Ref(Some(EntityId::new("p1")));
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"ref": "p1"}));

        let parsed: Value = serde_json::from_value(json!({"scalar": 5})).unwrap();
        assert_eq!(parsed, Value::Scalar(json!(5)));
    }

    #[test]
    fn test_entity_deserializes_with_type_key() {
        let entity: Entity = serde_json::from_value(json!({
            "type": "Task",
            "id": "t1",
            "fields": {
                "Name": {"scalar": "Onboarding TEMPLATE"},
                "Assignees": {"refs": ["u1", "u2"]}
            }
        }))
        .unwrap();

        assert_eq!(entity.key(), EntityKey::new("Task", "t1"));
        assert_eq!(entity.field("Name").and_then(Value::as_text), Some("Onboarding TEMPLATE"));
        assert_eq!(entity.field("Assignees").unwrap().as_refs().len(), 2);
    }

    #[test]
    fn test_is_truthy() {
        assert!(Value::Scalar(json!(true)).is_truthy());
        assert!(!Value::Scalar(json!(false)).is_truthy());
        assert!(!Value::Scalar(json!(null)).is_truthy());
        assert!(!Value::Ref(None).is_truthy());
        assert!(Value::Refs(vec![EntityId::new("a")]).is_truthy());
    }
}
