//! Entity declarations and resolved entity descriptors.

use super::{Attribute, PropertyDescriptor, QuerySpec, Relationship};
use serde::{Deserialize, Serialize};

/// An entity as declared by the caller, before inheritance and inverses are
/// resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDeclaration {
    /// Entity name (unique within a schema).
    pub name: String,
    /// Parent entity, if this entity inherits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Whether instances of exactly this entity may be created.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Name this entity had in the previous version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_from: Option<String>,
    /// Properties in declaration order, excluding inherited ones.
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

impl EntityDeclaration {
    /// Declare a concrete entity with no parent.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            is_abstract: false,
            rename_from: None,
            properties: Vec::new(),
        }
    }

    /// Inherit from `parent`.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Mark as abstract.
    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark this entity as the continuation of `old_name`.
    pub fn renamed_from(mut self, old_name: impl Into<String>) -> Self {
        self.rename_from = Some(old_name.into());
        self
    }

    /// Add a property.
    pub fn with_property(mut self, property: impl Into<PropertyDescriptor>) -> Self {
        self.properties.push(property.into());
        self
    }

    /// Add an attribute.
    pub fn with_attribute(self, attribute: Attribute) -> Self {
        self.with_property(attribute)
    }

    /// Add a relationship.
    pub fn with_relationship(self, relationship: Relationship) -> Self {
        self.with_property(relationship)
    }

    /// Add a query spec.
    pub fn with_query(self, query: QuerySpec) -> Self {
        self.with_property(query)
    }
}

/// A fully resolved entity inside a [`Schema`](super::Schema).
///
/// Attribute, relationship and query lists are flattened over the inheritance
/// chain with inherited properties first. Every relationship has a resolved
/// inverse on its related entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub is_abstract: bool,
    pub parent: Option<String>,
    /// Direct children, sorted by name.
    pub subentities: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
    pub queries: Vec<QuerySpec>,
    pub rename_from: Option<String>,
}

impl EntityDescriptor {
    /// Get an attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get a relationship by name.
    pub fn get_relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Get a query spec by name.
    pub fn get_query(&self, name: &str) -> Option<&QuerySpec> {
        self.queries.iter().find(|q| q.name == name)
    }

    /// Check if any property of this entity is named `name`.
    pub fn has_property(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
            || self.get_relationship(name).is_some()
            || self.get_query(name).is_some()
    }

    /// All property names, attributes first.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.relationships.iter().map(|r| r.name.as_str()))
            .chain(self.queries.iter().map(|q| q.name.as_str()))
    }
}
