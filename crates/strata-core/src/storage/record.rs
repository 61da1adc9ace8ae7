//! Record type for stored objects.

use super::Value;
use crate::error::StoreError;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a stored record, unique within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One stored object.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Concrete entity name.
    pub entity: String,

    /// Attribute values keyed by attribute name.
    pub attributes: BTreeMap<String, Value>,

    /// Related record ids keyed by relationship name.
    pub links: BTreeMap<String, Vec<u64>>,

    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: u64,
}

impl Record {
    /// Create an empty record of `entity` with the current timestamp.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attributes: BTreeMap::new(),
            links: BTreeMap::new(),
            created_at: super::key::current_timestamp(),
        }
    }

    /// Get an attribute value; missing attributes read as null.
    pub fn get(&self, attribute: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.attributes.get(attribute).unwrap_or(&NULL)
    }

    /// Ids linked through `relationship`.
    pub fn linked(&self, relationship: &str) -> Vec<RecordId> {
        self.links
            .get(relationship)
            .map(|ids| ids.iter().copied().map(RecordId).collect())
            .unwrap_or_default()
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}
