//! Schema - a validated, versioned snapshot of all entities.

use super::EntityDescriptor;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A validated schema graph.
///
/// Built by [`SchemaBuilder`](super::SchemaBuilder); immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Version identifier, unique within a version chain.
    pub version: String,
    /// Resolved entities keyed by name.
    pub entities: BTreeMap<String, EntityDescriptor>,
    /// Entity names in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<String>,
}

/// Structural identity of a schema as recorded by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreFingerprint(pub [u8; 32]);

impl StoreFingerprint {
    /// Parse a hex-encoded fingerprint.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for StoreFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Schema {
    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(name)
    }

    /// List all entity names in sorted order.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(|s| s.as_str())
    }

    /// Entities in declaration order. Entities missing from the recorded
    /// order follow in sorted order.
    pub fn entities_in_order(&self) -> Vec<&EntityDescriptor> {
        let mut out: Vec<&EntityDescriptor> =
            self.order.iter().filter_map(|name| self.entities.get(name)).collect();
        if out.len() < self.entities.len() {
            let listed: std::collections::HashSet<&str> =
                out.iter().map(|e| e.name.as_str()).collect();
            out.extend(
                self.entities
                    .values()
                    .filter(|e| !listed.contains(e.name.as_str())),
            );
        }
        out
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Ancestors of `name`, nearest first.
    pub fn ancestors(&self, name: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.entities.get(name).and_then(|e| e.parent.as_deref());
        while let Some(parent) = current {
            out.push(parent);
            current = self.entities.get(parent).and_then(|e| e.parent.as_deref());
        }
        out
    }

    /// Check if `name` is `ancestor` or inherits from it.
    pub fn is_kind_of(&self, name: &str, ancestor: &str) -> bool {
        name == ancestor || self.ancestors(name).contains(&ancestor)
    }

    /// Compute the structural fingerprint.
    ///
    /// Only the shape of stored data contributes: entity names, abstractness,
    /// parents, attribute types/storage/optionality and relationship targets,
    /// inverses and ranges. Versions, queries, defaults, documentation and
    /// rename markers do not.
    pub fn fingerprint(&self) -> StoreFingerprint {
        let mut hasher = blake3::Hasher::new();
        for (name, entity) in &self.entities {
            field(&mut hasher, b"E");
            field(&mut hasher, name.as_bytes());
            field(&mut hasher, &[entity.is_abstract as u8]);
            field(&mut hasher, entity.parent.as_deref().unwrap_or("").as_bytes());

            let mut attributes: Vec<_> = entity.attributes.iter().collect();
            attributes.sort_by(|a, b| a.name.cmp(&b.name));
            for attr in attributes {
                field(&mut hasher, b"A");
                field(&mut hasher, attr.name.as_bytes());
                field(&mut hasher, attr.scalar_type.as_str().as_bytes());
                field(&mut hasher, attr.storage.as_str().as_bytes());
                field(&mut hasher, &[attr.optional as u8]);
            }

            let mut relationships: Vec<_> = entity.relationships.iter().collect();
            relationships.sort_by(|a, b| a.name.cmp(&b.name));
            for rel in relationships {
                field(&mut hasher, b"R");
                field(&mut hasher, rel.name.as_bytes());
                field(&mut hasher, rel.related_entity.as_bytes());
                field(&mut hasher, rel.inverse_name.as_bytes());
                field(&mut hasher, rel.range.to_string().as_bytes());
            }
        }
        StoreFingerprint(*hasher.finalize().as_bytes())
    }

    /// Serialize the schema to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Deserialize a schema from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

fn field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(bytes);
    hasher.update(&[0]);
}

#[cfg(test)]
mod tests {
    use crate::catalog::{
        Attribute, EntityDeclaration, QuerySpec, Relationship, ScalarType, SchemaBuilder,
        StoreFingerprint,
    };
    use crate::catalog::{CardinalityRange, DeleteBehavior};

    fn sample(version: &str) -> crate::catalog::Schema {
        SchemaBuilder::new(version)
            .with_entity(
                EntityDeclaration::new("Animal")
                    .with_abstract()
                    .with_attribute(Attribute::new("name", ScalarType::String)),
            )
            .with_entity(
                EntityDeclaration::new("Dog")
                    .with_parent("Animal")
                    .with_attribute(Attribute::optional("breed", ScalarType::String))
                    .with_relationship(Relationship::to_one("owner", "Owner", "dogs").with_inverse(
                        CardinalityRange::to_many(),
                        DeleteBehavior::Cascade,
                    )),
            )
            .with_entity(EntityDeclaration::new("Owner"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_ancestry() {
        let schema = sample("v1");
        assert_eq!(schema.ancestors("Dog"), vec!["Animal"]);
        assert!(schema.is_kind_of("Dog", "Animal"));
        assert!(schema.is_kind_of("Dog", "Dog"));
        assert!(!schema.is_kind_of("Animal", "Dog"));
        assert!(!schema.is_kind_of("Owner", "Animal"));
        assert_eq!(schema.entity_names().collect::<Vec<_>>(), vec!["Animal", "Dog", "Owner"]);
    }

    #[test]
    fn test_fingerprint_ignores_version_and_queries() {
        let a = sample("v1");
        let mut b = sample("v2");
        b.entities
            .get_mut("Owner")
            .unwrap()
            .queries
            .push(QuerySpec::new("all_dogs", "Dog", ""));
        b.entities.get_mut("Dog").unwrap().attributes[1].documentation = Some("doc".into());

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_tracks_shape() {
        let a = sample("v1");
        let mut b = sample("v1");
        b.entities.get_mut("Dog").unwrap().attributes[1].optional = false;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_hex() {
        let fp = sample("v1").fingerprint();
        let text = fp.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(StoreFingerprint::from_hex(&text), Some(fp));
        assert_eq!(StoreFingerprint::from_hex("abcd"), None);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let schema = sample("v1");
        let bytes = schema.to_bytes().unwrap();
        let decoded = crate::catalog::Schema::from_bytes(&bytes).unwrap();
        assert_eq!(schema, decoded);
    }
}
