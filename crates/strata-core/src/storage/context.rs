//! Buffered read-write access to a [`SledStore`](super::SledStore).

use super::engine::{read_record, scan_records};
use super::key::{current_timestamp, marker_key, record_key};
use super::{Record, RecordId, Value};
use crate::catalog::{Attribute, DeleteBehavior, EntityDescriptor, Relationship, Schema};
use crate::error::StoreError;
use crate::migration::MigrationContext;
use sled::{Db, Tree};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// How strictly a context checks writes against its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Attribute values must match their declared types, required attributes
    /// must be set, abstract entities cannot be instantiated, and every
    /// modified record must satisfy its cardinality ranges on save.
    Strict,
    /// Only entity and relationship names are checked. Used by migration
    /// scripts, which may leave attribute values shaped for the next model.
    Permissive,
}

/// A unit of work against the store.
///
/// Writes are buffered in memory; reads see buffered writes. [`save`] commits
/// everything in one sled batch. Dropping a context without saving discards
/// its writes.
///
/// [`save`]: MigrationContext::save
pub struct SledContext {
    db: Db,
    tree: Tree,
    model: Arc<Schema>,
    mode: ContextMode,
    /// Buffered records; `None` marks a deletion.
    pending: BTreeMap<u64, Option<Record>>,
    markers: Vec<String>,
}

impl SledContext {
    pub(crate) fn new(db: Db, tree: Tree, model: Arc<Schema>, mode: ContextMode) -> Self {
        Self {
            db,
            tree,
            model,
            mode,
            pending: BTreeMap::new(),
            markers: Vec::new(),
        }
    }

    /// Checking mode of this context.
    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    /// Number of buffered record writes.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    fn is_strict(&self) -> bool {
        self.mode == ContextMode::Strict
    }

    fn entity(&self, name: &str) -> Result<&EntityDescriptor, StoreError> {
        self.model
            .get_entity(name)
            .ok_or_else(|| StoreError::UnknownEntity(name.to_string()))
    }

    fn relationship(&self, entity: &str, name: &str) -> Result<Relationship, StoreError> {
        self.entity(entity)?
            .get_relationship(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownProperty {
                entity: entity.to_string(),
                property: name.to_string(),
            })
    }

    fn load(&self, id: u64) -> Result<Record, StoreError> {
        self.get(RecordId(id))?.ok_or(StoreError::NotFound(id))
    }

    fn write(&mut self, id: u64, record: Record) {
        self.pending.insert(id, Some(record));
    }

    fn check_value(
        &self,
        entity: &str,
        attribute: &Attribute,
        value: &Value,
    ) -> Result<(), StoreError> {
        if value.conforms_to(attribute.scalar_type, attribute.optional) {
            return Ok(());
        }
        match value.scalar_type() {
            None => Err(StoreError::MissingValue {
                entity: entity.to_string(),
                attribute: attribute.name.clone(),
            }),
            Some(found) => Err(StoreError::IncompatibleValue {
                entity: entity.to_string(),
                attribute: attribute.name.clone(),
                expected: attribute.scalar_type.to_string(),
                found: found.to_string(),
            }),
        }
    }

    /// Add `other` to `id`'s side of `relationship`. A to-one side drops its
    /// previous partner, which loses its inverse link in turn.
    fn add_link(&mut self, id: u64, relationship: &Relationship, other: u64) -> Result<(), StoreError> {
        let mut record = self.load(id)?;
        let links = record.links.entry(relationship.name.clone()).or_default();
        if links.contains(&other) {
            return Ok(());
        }

        let displaced = if relationship.is_to_many() {
            if let Some(max) = relationship.range.max {
                if links.len() >= max as usize {
                    return Err(StoreError::CardinalityViolation {
                        entity: record.entity.clone(),
                        relationship: relationship.name.clone(),
                        count: links.len() + 1,
                        range: relationship.range.to_string(),
                    });
                }
            }
            links.push(other);
            Vec::new()
        } else {
            std::mem::replace(links, vec![other])
        };
        self.write(id, record);

        for partner in displaced {
            self.remove_link(partner, &relationship.inverse_name, id)?;
        }
        Ok(())
    }

    fn remove_link(&mut self, id: u64, relationship: &str, other: u64) -> Result<(), StoreError> {
        let Some(mut record) = self.get(RecordId(id))? else {
            return Ok(());
        };
        if let Some(links) = record.links.get_mut(relationship) {
            if let Some(pos) = links.iter().position(|&l| l == other) {
                links.remove(pos);
                self.write(id, record);
            }
        }
        Ok(())
    }

    /// Records removed by deleting `root`: the root plus everything reached
    /// through cascading relationships.
    fn cascade_closure(&self, root: u64) -> Result<BTreeMap<u64, Record>, StoreError> {
        let mut closure = BTreeMap::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if closure.contains_key(&id) {
                continue;
            }
            let Some(record) = self.get(RecordId(id))? else {
                continue;
            };
            for relationship in &self.entity(&record.entity)?.relationships {
                if relationship.on_delete == DeleteBehavior::Cascade {
                    queue.extend(record.linked(&relationship.name).into_iter().map(|r| r.0));
                }
            }
            closure.insert(id, record);
        }
        Ok(closure)
    }

    fn check_ranges(&self, record: &Record) -> Result<(), StoreError> {
        for relationship in &self.entity(&record.entity)?.relationships {
            let count = record.links.get(&relationship.name).map_or(0, Vec::len);
            if !relationship.range.contains(count) {
                return Err(StoreError::CardinalityViolation {
                    entity: record.entity.clone(),
                    relationship: relationship.name.clone(),
                    count,
                    range: relationship.range.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl MigrationContext for SledContext {
    fn model(&self) -> &Schema {
        &self.model
    }

    fn insert(
        &mut self,
        entity: &str,
        values: Vec<(String, Value)>,
    ) -> Result<RecordId, StoreError> {
        let descriptor = self.entity(entity)?;
        if self.is_strict() && descriptor.is_abstract {
            return Err(StoreError::AbstractEntity(entity.to_string()));
        }

        let mut record = Record::new(entity);
        for (name, value) in values {
            if self.is_strict() && descriptor.get_attribute(&name).is_none() {
                return Err(StoreError::UnknownProperty {
                    entity: entity.to_string(),
                    property: name,
                });
            }
            record.attributes.insert(name, value);
        }
        for attribute in &descriptor.attributes {
            if !record.attributes.contains_key(&attribute.name) {
                let initial = attribute.initial_value().unwrap_or(Value::Null);
                record.attributes.insert(attribute.name.clone(), initial);
            }
            if self.is_strict() {
                self.check_value(entity, attribute, record.get(&attribute.name))?;
            }
        }

        let id = self.db.generate_id()?;
        self.write(id, record);
        Ok(RecordId(id))
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        match self.pending.get(&id.0) {
            Some(buffered) => Ok(buffered.clone()),
            None => read_record(&self.tree, id),
        }
    }

    fn fetch_all(&self, entity: &str) -> Result<Vec<(RecordId, Record)>, StoreError> {
        self.entity(entity)?;
        let mut records = BTreeMap::new();
        for result in scan_records(&self.tree) {
            let (id, record) = result?;
            records.insert(id.0, record);
        }
        for (id, buffered) in &self.pending {
            match buffered {
                Some(record) => records.insert(*id, record.clone()),
                None => records.remove(id),
            };
        }
        Ok(records
            .into_iter()
            .filter(|(_, record)| self.model.is_kind_of(&record.entity, entity))
            .map(|(id, record)| (RecordId(id), record))
            .collect())
    }

    fn set(&mut self, id: RecordId, attribute: &str, value: Value) -> Result<(), StoreError> {
        let mut record = self.load(id.0)?;
        if self.is_strict() {
            let descriptor = self.entity(&record.entity)?;
            let declared = descriptor.get_attribute(attribute).ok_or_else(|| {
                StoreError::UnknownProperty {
                    entity: record.entity.clone(),
                    property: attribute.to_string(),
                }
            })?;
            self.check_value(&record.entity, declared, &value)?;
        }
        record.attributes.insert(attribute.to_string(), value);
        self.write(id.0, record);
        Ok(())
    }

    fn relate(
        &mut self,
        id: RecordId,
        relationship: &str,
        other: RecordId,
    ) -> Result<(), StoreError> {
        let source = self.load(id.0)?;
        let target = self.load(other.0)?;
        let forward = self.relationship(&source.entity, relationship)?;
        if !self.model.is_kind_of(&target.entity, &forward.related_entity) {
            return Err(StoreError::WrongRelatedEntity {
                entity: source.entity,
                relationship: forward.name,
                found: target.entity,
            });
        }
        let inverse = self.relationship(&target.entity, &forward.inverse_name)?;

        self.add_link(id.0, &forward, other.0)?;
        self.add_link(other.0, &inverse, id.0)
    }

    fn unrelate(
        &mut self,
        id: RecordId,
        relationship: &str,
        other: RecordId,
    ) -> Result<(), StoreError> {
        let source = self.load(id.0)?;
        let forward = self.relationship(&source.entity, relationship)?;
        self.remove_link(id.0, &forward.name, other.0)?;
        self.remove_link(other.0, &forward.inverse_name, id.0)
    }

    fn related(&self, id: RecordId, relationship: &str) -> Result<Vec<RecordId>, StoreError> {
        let record = self.load(id.0)?;
        self.relationship(&record.entity, relationship)?;
        Ok(record.linked(relationship))
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        self.load(id.0)?;
        let closure = self.cascade_closure(id.0)?;

        // Restrict rules only block on links leaving the deleted set.
        for (record_id, record) in &closure {
            for relationship in &self.entity(&record.entity)?.relationships {
                if relationship.on_delete != DeleteBehavior::Restrict {
                    continue;
                }
                let outside = record
                    .linked(&relationship.name)
                    .into_iter()
                    .any(|r| !closure.contains_key(&r.0));
                if outside {
                    return Err(StoreError::DeleteRestricted {
                        entity: record.entity.clone(),
                        id: *record_id,
                        relationship: relationship.name.clone(),
                    });
                }
            }
        }

        for (record_id, record) in &closure {
            let relationships = self.entity(&record.entity)?.relationships.clone();
            for relationship in &relationships {
                for partner in record.linked(&relationship.name) {
                    if !closure.contains_key(&partner.0) {
                        self.remove_link(partner.0, &relationship.inverse_name, *record_id)?;
                    }
                }
            }
        }
        for record_id in closure.keys() {
            self.pending.insert(*record_id, None);
        }
        debug!(root = %id, removed = closure.len(), "deleted records");
        Ok(())
    }

    fn has_marker(&self, name: &str) -> Result<bool, StoreError> {
        if self.markers.iter().any(|m| m == name) {
            return Ok(true);
        }
        Ok(self.tree.contains_key(marker_key(name))?)
    }

    fn mark_applied(&mut self, name: &str) -> Result<(), StoreError> {
        if !self.markers.iter().any(|m| m == name) {
            self.markers.push(name.to_string());
        }
        Ok(())
    }

    fn save(&mut self) -> Result<(), StoreError> {
        if self.is_strict() {
            for record in self.pending.values().flatten() {
                self.check_ranges(record)?;
            }
        }

        let mut batch = sled::Batch::default();
        for (id, buffered) in &self.pending {
            let key = record_key(RecordId(*id));
            match buffered {
                Some(record) => batch.insert(key, record.to_bytes()?),
                None => batch.remove(key),
            }
        }
        let now = current_timestamp().to_be_bytes();
        for marker in &self.markers {
            batch.insert(marker_key(marker), now.to_vec());
        }

        self.tree.apply_batch(batch)?;
        self.db.flush()?;
        debug!(
            records = self.pending.len(),
            markers = self.markers.len(),
            model = %self.model.version,
            "context saved"
        );
        self.pending.clear();
        self.markers.clear();
        Ok(())
    }
}

/// Ids of records of `entity` whose attribute `name` equals `value`.
pub fn find_by(
    context: &dyn MigrationContext,
    entity: &str,
    name: &str,
    value: &Value,
) -> Result<Vec<RecordId>, StoreError> {
    Ok(context
        .fetch_all(entity)?
        .into_iter()
        .filter(|(_, record)| record.get(name) == value)
        .map(|(id, _)| id)
        .collect())
}
