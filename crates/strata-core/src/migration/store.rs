//! Interface between the migrator and a storage engine.
//!
//! The migrator never looks inside a store. It compares fingerprints, asks
//! for structural transforms between two models, and hands scripts a
//! [`MigrationContext`] opened at the store's current model.

use crate::catalog::{Schema, StoreFingerprint};
use crate::error::StoreError;
use crate::storage::{Record, RecordId, Value};
use std::sync::Arc;

/// A persistent store whose data conforms to one schema at a time.
pub trait ModelStore {
    /// Context type handed to migration scripts.
    type Context: MigrationContext;

    /// Fingerprint of the model the stored data conforms to, `None` for a
    /// store that was never initialized.
    fn current_fingerprint(&self) -> Result<Option<StoreFingerprint>, StoreError>;

    /// Check if the store's data conforms to `model`.
    fn is_compatible(&self, model: &Schema) -> Result<bool, StoreError> {
        Ok(self.current_fingerprint()? == Some(model.fingerprint()))
    }

    /// Transform the stored data from `from` to `to` without a script.
    ///
    /// On success the store's current model is `to`; on failure it is still
    /// `from`.
    fn migrate_structurally(&self, from: &Schema, to: &Arc<Schema>) -> Result<(), StoreError>;

    /// Open a mutable context at `model`, which must be the current model.
    fn open_at(&self, model: &Arc<Schema>) -> Result<Self::Context, StoreError>;
}

/// Mutable access to stored records, keyed by entity name.
///
/// Writes are buffered until [`save`](MigrationContext::save); reads see
/// buffered writes.
pub trait MigrationContext {
    /// Model this context was opened at.
    fn model(&self) -> &Schema;

    /// Create a record of `entity` with the given attribute values.
    fn insert(&mut self, entity: &str, values: Vec<(String, Value)>)
        -> Result<RecordId, StoreError>;

    /// Fetch a record.
    fn get(&self, id: RecordId) -> Result<Option<Record>, StoreError>;

    /// Fetch every record of `entity` or of its subentities, in id order.
    fn fetch_all(&self, entity: &str) -> Result<Vec<(RecordId, Record)>, StoreError>;

    /// Set one attribute value.
    fn set(&mut self, id: RecordId, attribute: &str, value: Value) -> Result<(), StoreError>;

    /// Link `id` to `other` through `relationship`, keeping the inverse side
    /// in sync. To-one relationships replace their current link.
    fn relate(&mut self, id: RecordId, relationship: &str, other: RecordId)
        -> Result<(), StoreError>;

    /// Remove a link and its inverse.
    fn unrelate(
        &mut self,
        id: RecordId,
        relationship: &str,
        other: RecordId,
    ) -> Result<(), StoreError>;

    /// Ids linked to `id` through `relationship`.
    fn related(&self, id: RecordId, relationship: &str) -> Result<Vec<RecordId>, StoreError>;

    /// Delete a record, applying each relationship's delete behavior.
    fn delete(&mut self, id: RecordId) -> Result<(), StoreError>;

    /// Check if a marker was persisted.
    fn has_marker(&self, name: &str) -> Result<bool, StoreError>;

    /// Persist a marker with the next save.
    fn mark_applied(&mut self, name: &str) -> Result<(), StoreError>;

    /// Commit buffered writes atomically.
    fn save(&mut self) -> Result<(), StoreError>;
}
