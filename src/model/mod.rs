//! Object Model
//!
//! Schema describing entity types, their attributes and their relationships.
//! A model is loaded once, validated, and then shared immutably as `Arc<Model>`
//! by every coordinator and context of a manager.

pub mod loader;
pub mod validation;

pub use validation::{check_deleted_targets, validate_record};

use crate::error::ModelError;
use crate::object::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Storage type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Bool,
    Integer,
    Double,
    String,
    Bytes,
    Timestamp,
}

impl AttributeKind {
    /// Whether `value` may be stored in an attribute of this kind.
    ///
    /// Null is accepted here; optionality is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (AttributeKind::Bool, Value::Bool(_))
                | (AttributeKind::Integer, Value::Integer(_))
                | (AttributeKind::Double, Value::Double(_))
                | (AttributeKind::Double, Value::Integer(_))
                | (AttributeKind::String, Value::String(_))
                | (AttributeKind::Bytes, Value::Bytes(_))
                | (AttributeKind::Timestamp, Value::Timestamp(_))
        )
    }

    /// Parse a textual literal (CLI input, model defaults) into a value of this kind.
    pub fn parse_value(&self, text: &str) -> Result<Value, ModelError> {
        let invalid = |reason: String| ModelError::Invalid(format!("'{}': {}", text, reason));
        match self {
            AttributeKind::Bool => text
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|e| invalid(e.to_string())),
            AttributeKind::Integer => text
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| invalid(e.to_string())),
            AttributeKind::Double => text
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| invalid(e.to_string())),
            AttributeKind::String => Ok(Value::String(text.to_string())),
            AttributeKind::Bytes => hex::decode(text.trim_start_matches("0x"))
                .map(Value::Bytes)
                .map_err(|e| invalid(e.to_string())),
            AttributeKind::Timestamp => DateTime::parse_from_rfc3339(text)
                .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

/// Literal default value as written in a model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl Literal {
    /// Convert into a value of the given kind.
    pub fn to_value(&self, kind: AttributeKind) -> Result<Value, ModelError> {
        let value = match (kind, self) {
            (AttributeKind::Bool, Literal::Bool(b)) => Value::Bool(*b),
            (AttributeKind::Integer, Literal::Integer(i)) => Value::Integer(*i),
            (AttributeKind::Double, Literal::Double(d)) => Value::Double(*d),
            (AttributeKind::Double, Literal::Integer(i)) => Value::Double(*i as f64),
            (kind, Literal::String(s)) => kind.parse_value(s)?,
            (kind, other) => {
                return Err(ModelError::Invalid(format!(
                    "default {:?} does not fit attribute kind {:?}",
                    other, kind
                )))
            }
        };
        Ok(value)
    }
}

/// One attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescription {
    pub name: String,
    pub kind: AttributeKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
}

/// One relationship of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDescription {
    pub name: String,
    pub destination: String,
    #[serde(default)]
    pub to_many: bool,
    #[serde(default)]
    pub optional: bool,
}

/// Entity type: named set of attributes and relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescription {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDescription>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDescription>,
}

impl EntityDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Add a required attribute.
    pub fn attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDescription {
            name: name.into(),
            kind,
            optional: false,
            default: None,
        });
        self
    }

    /// Add an optional attribute.
    pub fn optional_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDescription {
            name: name.into(),
            kind,
            optional: true,
            default: None,
        });
        self
    }

    /// Add a required attribute with a default applied on insert.
    pub fn attribute_with_default(
        mut self,
        name: impl Into<String>,
        kind: AttributeKind,
        default: Literal,
    ) -> Self {
        self.attributes.push(AttributeDescription {
            name: name.into(),
            kind,
            optional: false,
            default: Some(default),
        });
        self
    }

    /// Add an optional to-one relationship.
    pub fn to_one(mut self, name: impl Into<String>, destination: impl Into<String>) -> Self {
        self.relationships.push(RelationshipDescription {
            name: name.into(),
            destination: destination.into(),
            to_many: false,
            optional: true,
        });
        self
    }

    /// Add an optional to-many relationship.
    pub fn to_many(mut self, name: impl Into<String>, destination: impl Into<String>) -> Self {
        self.relationships.push(RelationshipDescription {
            name: name.into(),
            destination: destination.into(),
            to_many: true,
            optional: true,
        });
        self
    }

    pub fn find_attribute(&self, name: &str) -> Option<&AttributeDescription> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn find_relationship(&self, name: &str) -> Option<&RelationshipDescription> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

/// Complete object model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub entities: Vec<EntityDescription>,
}

fn default_version() -> u32 {
    1
}

impl Model {
    /// Build and check a model.
    pub fn new(
        name: impl Into<String>,
        version: u32,
        entities: Vec<EntityDescription>,
    ) -> Result<Self, ModelError> {
        let model = Self {
            name: name.into(),
            version,
            entities,
        };
        model.check()?;
        Ok(model)
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDescription> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    /// Structural checks: unique names, storable names, resolvable
    /// relationship destinations, defaults matching their attribute kind.
    pub fn check(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::Invalid("model name cannot be empty".to_string()));
        }

        let mut entity_names = HashSet::new();
        for entity in &self.entities {
            check_name("entity", &entity.name)?;
            if !entity_names.insert(entity.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "duplicate entity '{}'",
                    entity.name
                )));
            }
        }

        for entity in &self.entities {
            let mut property_names = HashSet::new();
            for attribute in &entity.attributes {
                check_name("attribute", &attribute.name)?;
                if !property_names.insert(attribute.name.as_str()) {
                    return Err(ModelError::Invalid(format!(
                        "duplicate property '{}.{}'",
                        entity.name, attribute.name
                    )));
                }
                if let Some(default) = &attribute.default {
                    default.to_value(attribute.kind).map_err(|e| {
                        ModelError::Invalid(format!(
                            "default of '{}.{}': {}",
                            entity.name, attribute.name, e
                        ))
                    })?;
                }
            }
            for relationship in &entity.relationships {
                check_name("relationship", &relationship.name)?;
                if !property_names.insert(relationship.name.as_str()) {
                    return Err(ModelError::Invalid(format!(
                        "duplicate property '{}.{}'",
                        entity.name, relationship.name
                    )));
                }
                if !entity_names.contains(relationship.destination.as_str()) {
                    return Err(ModelError::Invalid(format!(
                        "relationship '{}.{}' points at unknown entity '{}'",
                        entity.name, relationship.name, relationship.destination
                    )));
                }
            }
        }

        Ok(())
    }

    /// Content hash of the model (blake3, hex).
    ///
    /// Two models hash equal exactly when their serialized form is equal, so a
    /// store records the hash of the model that created it and refuses others.
    pub fn content_hash(&self) -> Result<String, ModelError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| ModelError::Invalid(format!("cannot encode model: {}", e)))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

fn check_name(what: &str, name: &str) -> Result<(), ModelError> {
    if name.is_empty() {
        return Err(ModelError::Invalid(format!("{} name cannot be empty", what)));
    }
    if name.contains('\0') || name.contains('/') {
        return Err(ModelError::Invalid(format!(
            "{} name '{}' contains a reserved character",
            what,
            name.escape_default()
        )));
    }
    Ok(())
}
