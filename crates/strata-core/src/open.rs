//! Opening a store at the current schema.

use crate::catalog::Schema;
use crate::error::{Error, StoreError};
use crate::migration::{MigrationPlanner, MigrationReport, Migrator, ModelStore, VersionChain};
use crate::storage::{ContextMode, SledContext, SledStore, StoreConfig};
use std::sync::Arc;
use tracing::{info, instrument};

/// A store whose data conforms to the schema it was opened with.
pub struct OpenStore {
    store: SledStore,
    schema: Arc<Schema>,
    report: MigrationReport,
}

impl OpenStore {
    /// Schema the store conforms to.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// What happened while opening.
    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    /// The underlying store.
    pub fn store(&self) -> &SledStore {
        &self.store
    }

    /// Open a strictly checked context.
    pub fn context(&self) -> Result<SledContext, StoreError> {
        self.store.context_at(&self.schema, ContextMode::Strict)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.store.flush()
    }
}

/// Open the store at `config` and bring it to `schema`.
///
/// A fresh store is initialized at `schema`. A store whose fingerprint
/// matches is opened unchanged. Any other store is planned against `chain`
/// before anything is written, then migrated step by step.
#[instrument(skip_all, fields(path = %config.path.display(), version = tracing::field::Empty))]
pub fn open_store(
    config: StoreConfig,
    schema: impl Into<Arc<Schema>>,
    chain: &VersionChain,
) -> Result<OpenStore, Error> {
    let schema = schema.into();
    tracing::Span::current().record("version", schema.version.as_str());
    let store = SledStore::open(config)?;

    let report = match store.current_fingerprint()? {
        None => {
            store.initialize(&schema)?;
            MigrationReport::unchanged(&schema.version)
        }
        Some(fingerprint) if fingerprint == schema.fingerprint() => {
            MigrationReport::unchanged(&schema.version)
        }
        Some(fingerprint) => {
            let plan = MigrationPlanner::plan(&fingerprint, &schema, chain)?;
            let report = Migrator::apply(&store, &plan)?;
            if !store.is_compatible(&schema)? {
                return Err(StoreError::IncompatibleModel {
                    expected: schema.version.clone(),
                    found: report.to_version,
                }
                .into());
            }
            report
        }
    };

    info!(
        from = %report.from_version,
        steps = report.steps_executed,
        "store ready"
    );
    Ok(OpenStore {
        store,
        schema,
        report,
    })
}
