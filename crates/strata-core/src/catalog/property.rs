//! The property sum type consumed by entity declarations.

use super::{Attribute, QuerySpec, Relationship};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One declared property of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyDescriptor {
    Attribute(Attribute),
    Relationship(Relationship),
    Query(QuerySpec),
}

/// Discriminant of a [`PropertyDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Attribute,
    Relationship,
    Query,
}

impl PropertyDescriptor {
    /// Property name.
    pub fn name(&self) -> &str {
        match self {
            PropertyDescriptor::Attribute(a) => &a.name,
            PropertyDescriptor::Relationship(r) => &r.name,
            PropertyDescriptor::Query(q) => &q.name,
        }
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyDescriptor::Attribute(_) => PropertyKind::Attribute,
            PropertyDescriptor::Relationship(_) => PropertyKind::Relationship,
            PropertyDescriptor::Query(_) => PropertyKind::Query,
        }
    }

    /// Rename marker, if any. Queries never carry one.
    pub fn rename_from(&self) -> Option<&str> {
        match self {
            PropertyDescriptor::Attribute(a) => a.rename_from.as_deref(),
            PropertyDescriptor::Relationship(r) => r.rename_from.as_deref(),
            PropertyDescriptor::Query(_) => None,
        }
    }
}

impl From<Attribute> for PropertyDescriptor {
    fn from(attribute: Attribute) -> Self {
        PropertyDescriptor::Attribute(attribute)
    }
}

impl From<Relationship> for PropertyDescriptor {
    fn from(relationship: Relationship) -> Self {
        PropertyDescriptor::Relationship(relationship)
    }
}

impl From<QuerySpec> for PropertyDescriptor {
    fn from(query: QuerySpec) -> Self {
        PropertyDescriptor::Query(query)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Attribute => write!(f, "attribute"),
            PropertyKind::Relationship => write!(f, "relationship"),
            PropertyKind::Query => write!(f, "query"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    #[test]
    fn test_descriptor_accessors() {
        let attr: PropertyDescriptor =
            Attribute::new("title", ScalarType::String).renamed_from("name").into();
        assert_eq!(attr.name(), "title");
        assert_eq!(attr.kind(), PropertyKind::Attribute);
        assert_eq!(attr.rename_from(), Some("name"));

        let query: PropertyDescriptor = QuerySpec::new("all", "Book", "").into();
        assert_eq!(query.kind(), PropertyKind::Query);
        assert_eq!(query.rename_from(), None);
    }

    #[test]
    fn test_descriptor_json_tag() {
        let json = r#"{"kind":"relationship","name":"place","related_entity":"Place",
            "inverse_name":"occupants","range":{"min":0,"max":1}}"#;
        let prop: PropertyDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(prop.kind(), PropertyKind::Relationship);
        assert_eq!(prop.name(), "place");
    }
}
