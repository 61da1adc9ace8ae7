//! Sled-backed reference store.

use super::context::{ContextMode, SledContext};
use super::key::{self, decode_record_key, marker_key, record_key, META_FINGERPRINT, META_MODEL};
use super::transform::ModelTransform;
use super::{Record, RecordId, StoreConfig};
use crate::catalog::{Schema, StoreFingerprint};
use crate::error::StoreError;
use crate::migration::ModelStore;
use sled::{Db, Tree};
use std::sync::Arc;
use tracing::{debug, info};

/// Tree holding records, markers and model metadata.
const STORE_TREE: &str = "store";

/// A store whose records conform to one schema at a time.
///
/// The current model and its fingerprint are persisted next to the records,
/// so reopening a store always knows which schema its data follows.
pub struct SledStore {
    /// The underlying sled database.
    db: Db,

    /// Tree for records, markers and metadata.
    tree: Tree,
}

impl SledStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let db = config.to_sled_config().open()?;
        let tree = db.open_tree(STORE_TREE)?;
        debug!(path = %config.path.display(), temporary = config.temporary, "opened store");
        Ok(Self { db, tree })
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// The model the stored data conforms to.
    pub fn current_model(&self) -> Result<Option<Schema>, StoreError> {
        match self.tree.get(META_MODEL)? {
            Some(bytes) => Ok(Some(Schema::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Record `model` as the current model of an empty store.
    pub fn initialize(&self, model: &Schema) -> Result<(), StoreError> {
        if self.current_fingerprint()?.is_some() {
            return Err(StoreError::IncompatibleModel {
                expected: "an uninitialized store".to_string(),
                found: self.describe_current()?,
            });
        }
        let mut batch = sled::Batch::default();
        batch.insert(META_MODEL, model.to_bytes()?);
        batch.insert(META_FINGERPRINT, model.fingerprint().as_bytes().to_vec());
        self.tree.apply_batch(batch)?;
        self.flush()?;
        info!(version = %model.version, "initialized store");
        Ok(())
    }

    /// Open a context at `model` with the given checking mode.
    pub fn context_at(
        &self,
        model: &Arc<Schema>,
        mode: ContextMode,
    ) -> Result<SledContext, StoreError> {
        self.ensure_current(model)?;
        Ok(SledContext::new(
            self.db.clone(),
            self.tree.clone(),
            Arc::clone(model),
            mode,
        ))
    }

    /// Get a record by id.
    pub fn get(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        read_record(&self.tree, id)
    }

    /// Scan all records in id order.
    pub fn scan(&self) -> impl Iterator<Item = Result<(RecordId, Record), StoreError>> + '_ {
        scan_records(&self.tree)
    }

    /// Number of stored records.
    pub fn record_count(&self) -> Result<usize, StoreError> {
        self.scan().try_fold(0, |n, r| r.map(|_| n + 1))
    }

    /// Check if a marker was persisted.
    pub fn has_marker(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.tree.contains_key(marker_key(name))?)
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn ensure_current(&self, model: &Schema) -> Result<(), StoreError> {
        match self.current_fingerprint()? {
            None => Err(StoreError::Uninitialized),
            Some(fp) if fp == model.fingerprint() => Ok(()),
            Some(_) => Err(StoreError::IncompatibleModel {
                expected: model.version.clone(),
                found: self.describe_current()?,
            }),
        }
    }

    fn describe_current(&self) -> Result<String, StoreError> {
        Ok(match self.current_model()? {
            Some(model) => model.version,
            None => "no model".to_string(),
        })
    }
}

impl ModelStore for SledStore {
    type Context = SledContext;

    fn current_fingerprint(&self) -> Result<Option<StoreFingerprint>, StoreError> {
        match self.tree.get(META_FINGERPRINT)? {
            Some(bytes) => {
                let array: [u8; 32] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Deserialization("fingerprint length".to_string()))?;
                Ok(Some(StoreFingerprint(array)))
            }
            None => Ok(None),
        }
    }

    fn migrate_structurally(&self, from: &Schema, to: &Arc<Schema>) -> Result<(), StoreError> {
        self.ensure_current(from)?;
        let transform = ModelTransform::compute(from, to)?;
        let stats = transform.apply(&self.tree)?;
        self.flush()?;
        info!(
            from = %from.version,
            to = %to.version,
            records = stats.records,
            dropped = stats.dropped,
            "structural migration applied"
        );
        Ok(())
    }

    fn open_at(&self, model: &Arc<Schema>) -> Result<SledContext, StoreError> {
        self.context_at(model, ContextMode::Permissive)
    }
}

pub(crate) fn read_record(tree: &Tree, id: RecordId) -> Result<Option<Record>, StoreError> {
    match tree.get(record_key(id))? {
        Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn scan_records(
    tree: &Tree,
) -> impl Iterator<Item = Result<(RecordId, Record), StoreError>> + '_ {
    tree.scan_prefix(key::RECORD_PREFIX).map(|result| {
        let (key_bytes, value_bytes) = result?;
        let id = decode_record_key(&key_bytes).ok_or(StoreError::InvalidKey)?;
        Ok((id, Record::from_bytes(&value_bytes)?))
    })
}
