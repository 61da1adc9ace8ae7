//! Attribute definitions for entities.

use super::types::{ScalarType, StorageKind};
use crate::storage::Value;
use serde::{Deserialize, Serialize};

/// A scalar-valued property of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Declared value type.
    pub scalar_type: ScalarType,
    /// Storage layout.
    #[serde(default)]
    pub storage: StorageKind,
    /// Whether the attribute may hold no value.
    #[serde(default)]
    pub optional: bool,
    /// Value given to existing rows when the attribute is introduced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Name of the property this attribute continues from the previous version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_from: Option<String>,
    /// Free-form documentation, never part of the structural identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// Default value for an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Current timestamp (evaluated when the default is applied).
    CurrentTimestamp,
}

impl DefaultValue {
    /// Materialize this default as a value of the given type.
    ///
    /// Returns `None` when the default cannot represent the type.
    pub fn to_value(&self, scalar_type: ScalarType) -> Option<Value> {
        let value = match (self, scalar_type) {
            (DefaultValue::Bool(b), ScalarType::Bool) => Value::Bool(*b),
            (DefaultValue::Int(i), ScalarType::Int32) => Value::Int32(i32::try_from(*i).ok()?),
            (DefaultValue::Int(i), ScalarType::Int64) => Value::Int64(*i),
            (DefaultValue::Int(i), ScalarType::Timestamp) => Value::Timestamp(*i),
            (DefaultValue::Int(i), ScalarType::Float32) => Value::Float32(*i as f32),
            (DefaultValue::Int(i), ScalarType::Float64) => Value::Float64(*i as f64),
            (DefaultValue::Float(f), ScalarType::Float32) => Value::Float32(*f as f32),
            (DefaultValue::Float(f), ScalarType::Float64) => Value::Float64(*f),
            (DefaultValue::String(s), ScalarType::String) => Value::String(s.clone()),
            (DefaultValue::Bytes(b), ScalarType::Bytes) => Value::Bytes(b.clone()),
            (DefaultValue::CurrentTimestamp, ScalarType::Timestamp) => {
                Value::Timestamp(crate::storage::key::current_timestamp() as i64)
            }
            _ => return None,
        };
        Some(value)
    }
}

impl Attribute {
    /// Create a new required attribute.
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            storage: StorageKind::Inline,
            optional: false,
            default: None,
            rename_from: None,
            documentation: None,
        }
    }

    /// Create an optional attribute.
    pub fn optional(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            optional: true,
            ..Self::new(name, scalar_type)
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the storage kind.
    pub fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    /// Mark this attribute as the continuation of `old_name`.
    pub fn renamed_from(mut self, old_name: impl Into<String>) -> Self {
        self.rename_from = Some(old_name.into());
        self
    }

    /// Attach documentation.
    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    /// Check if this attribute has a default value.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// The value existing rows receive when this attribute is introduced.
    pub fn initial_value(&self) -> Option<Value> {
        self.default
            .as_ref()
            .and_then(|default| default.to_value(self.scalar_type))
    }
}
