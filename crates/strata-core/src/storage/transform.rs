//! Lightweight structural transform between two models.
//!
//! Every record is rewritten to the target model in one sled batch together
//! with the new model and fingerprint, so a failed transform leaves the store
//! at the source model.

use super::engine::scan_records;
use super::key::{record_key, META_FINGERPRINT, META_MODEL};
use super::{Record, RecordId, Value};
use crate::catalog::{EntityDescriptor, Schema};
use crate::error::StoreError;
use crate::migration::SchemaDiff;
use sled::Tree;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Counters reported by [`ModelTransform::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Records rewritten to the target model.
    pub records: usize,
    /// Records dropped with their removed entity.
    pub dropped: usize,
}

/// Mapping of stored data from one model onto the next.
pub struct ModelTransform<'a> {
    from: &'a Schema,
    to: &'a Schema,
    diff: SchemaDiff,
    /// Old entity name to new entity name, for entities that survive.
    entities: BTreeMap<String, String>,
}

impl<'a> ModelTransform<'a> {
    /// Compute the transform from `from` to `to`.
    pub fn compute(from: &'a Schema, to: &'a Schema) -> Result<Self, StoreError> {
        let diff = SchemaDiff::compute(from, to)?;
        let entities = to
            .entity_names()
            .filter_map(|new| {
                let old = diff.old_entity_name(new)?;
                from.get_entity(old)
                    .map(|_| (old.to_string(), new.to_string()))
            })
            .collect();
        Ok(Self {
            from,
            to,
            diff,
            entities,
        })
    }

    /// The underlying schema diff.
    pub fn diff(&self) -> &SchemaDiff {
        &self.diff
    }

    /// Rewrite every record in `tree` and install the target model.
    pub fn apply(&self, tree: &Tree) -> Result<TransformStats, StoreError> {
        let mut records = Vec::new();
        let mut dropped = HashSet::new();
        for result in scan_records(tree) {
            let (id, record) = result?;
            if self.entities.contains_key(&record.entity) {
                records.push((id, record));
            } else {
                dropped.insert(id.0);
            }
        }

        let inverse = self.inverse_links(&records, &dropped);

        let mut batch = sled::Batch::default();
        for id in &dropped {
            batch.remove(record_key(RecordId(*id)));
        }
        for (id, record) in &records {
            let rewritten = self.rewrite(*id, record, &dropped, &inverse)?;
            batch.insert(record_key(*id), rewritten.to_bytes()?);
        }
        batch.insert(META_MODEL, self.to.to_bytes()?);
        batch.insert(META_FINGERPRINT, self.to.fingerprint().as_bytes().to_vec());
        tree.apply_batch(batch)?;

        let stats = TransformStats {
            records: records.len(),
            dropped: dropped.len(),
        };
        debug!(
            from = %self.from.version,
            to = %self.to.version,
            changes = self.diff.change_count(),
            records = stats.records,
            dropped = stats.dropped,
            "rewrote records"
        );
        Ok(stats)
    }

    /// Links seen from the other side: for each surviving link, the partner
    /// record and the inverse relationship name map to the linking record.
    fn inverse_links(
        &self,
        records: &[(RecordId, Record)],
        dropped: &HashSet<u64>,
    ) -> HashMap<(u64, String), Vec<u64>> {
        let mut inverse: HashMap<(u64, String), Vec<u64>> = HashMap::new();
        for (id, record) in records {
            let Some(descriptor) = self
                .entities
                .get(&record.entity)
                .and_then(|name| self.to.get_entity(name))
            else {
                continue;
            };
            for relationship in &descriptor.relationships {
                let Some(ids) = self
                    .old_relationship_name(descriptor, &relationship.name)
                    .and_then(|old| record.links.get(old))
                else {
                    continue;
                };
                for partner in ids.iter().filter(|p| !dropped.contains(p)) {
                    inverse
                        .entry((*partner, relationship.inverse_name.clone()))
                        .or_default()
                        .push(id.0);
                }
            }
        }
        inverse
    }

    fn rewrite(
        &self,
        id: RecordId,
        record: &Record,
        dropped: &HashSet<u64>,
        inverse: &HashMap<(u64, String), Vec<u64>>,
    ) -> Result<Record, StoreError> {
        let entity = self
            .entities
            .get(&record.entity)
            .ok_or_else(|| StoreError::UnknownEntity(record.entity.clone()))?;
        let descriptor = self
            .to
            .get_entity(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))?;
        if descriptor.is_abstract {
            return Err(StoreError::AbstractEntity(entity.clone()));
        }

        let mut out = Record {
            entity: entity.clone(),
            attributes: BTreeMap::new(),
            links: BTreeMap::new(),
            created_at: record.created_at,
        };

        for attribute in &descriptor.attributes {
            let carried = match self.old_attribute_name(descriptor, &attribute.name) {
                Some(old) => record.attributes.get(old),
                // New attribute: keep a value a script staged under its name.
                None => record.attributes.get(&attribute.name),
            };
            let value = match carried {
                Some(value) if !value.is_null() => value.clone(),
                _ => attribute.initial_value().unwrap_or(Value::Null),
            };
            if !value.conforms_to(attribute.scalar_type, attribute.optional) {
                return Err(match value.scalar_type() {
                    None => StoreError::MissingValue {
                        entity: entity.clone(),
                        attribute: attribute.name.clone(),
                    },
                    Some(found) => StoreError::IncompatibleValue {
                        entity: entity.clone(),
                        attribute: attribute.name.clone(),
                        expected: attribute.scalar_type.to_string(),
                        found: found.to_string(),
                    },
                });
            }
            out.attributes.insert(attribute.name.clone(), value);
        }

        for relationship in &descriptor.relationships {
            let links: Vec<u64> = match self.old_relationship_name(descriptor, &relationship.name) {
                Some(old) => record
                    .links
                    .get(old)
                    .map(|ids| ids.iter().copied().filter(|id| !dropped.contains(id)).collect())
                    .unwrap_or_default(),
                // New relationship: rebuild it from the surviving inverse side.
                None => inverse
                    .get(&(id.0, relationship.name.clone()))
                    .cloned()
                    .unwrap_or_default(),
            };
            if !relationship.range.contains(links.len()) {
                return Err(StoreError::CardinalityViolation {
                    entity: entity.clone(),
                    relationship: relationship.name.clone(),
                    count: links.len(),
                    range: relationship.range.to_string(),
                });
            }
            if !links.is_empty() {
                out.links.insert(relationship.name.clone(), links);
            }
        }

        Ok(out)
    }

    fn old_attribute_name<'n>(&'n self, entity: &EntityDescriptor, name: &'n str) -> Option<&'n str> {
        match self.diff.entity(&entity.name) {
            Some(difference) => difference.attributes.old_name_of(name),
            None => Some(name),
        }
    }

    fn old_relationship_name<'n>(
        &'n self,
        entity: &EntityDescriptor,
        name: &'n str,
    ) -> Option<&'n str> {
        match self.diff.entity(&entity.name) {
            Some(difference) => difference.relationships.old_name_of(name),
            None => Some(name),
        }
    }
}
