//! Subcommand implementations.

use crate::error::CliError;
use crate::formatter::{Formatter, StoreSummary};
use crate::schema_file::{load_chain, load_schema};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::migration::{MigrationPlanner, ModelStore, SchemaDiff};
use strata_core::storage::{SledStore, StoreConfig};
use strata_core::open_store;
use tracing::info;

/// Print the fingerprint of each schema file.
pub fn fingerprint(paths: &[PathBuf], formatter: &dyn Formatter) -> Result<String, CliError> {
    let fingerprints = paths
        .iter()
        .map(|p| load_schema(p).map(|s| (s.version.clone(), s.fingerprint())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(formatter.format_fingerprints(&fingerprints))
}

/// Show the difference between two schema files.
pub fn diff(from: &Path, to: &Path, formatter: &dyn Formatter) -> Result<String, CliError> {
    let old = load_schema(from)?;
    let new = load_schema(to)?;
    let diff = SchemaDiff::compute(&old, &new)?;
    Ok(formatter.format_diff(&diff))
}

/// Plan the migration of a store without touching it.
pub fn plan(store: &Path, paths: &[PathBuf], formatter: &dyn Formatter) -> Result<String, CliError> {
    let (chain, target) = load_chain(paths)?;
    let sled_store = open_existing(store)?;
    let fingerprint = sled_store
        .current_fingerprint()?
        .ok_or_else(|| CliError::EmptyStore(store.to_path_buf()))?;

    let plan = MigrationPlanner::plan(&fingerprint, &Arc::new(target), &chain)?;
    Ok(formatter.format_plan(&plan))
}

/// Migrate a store, initializing it when empty.
pub fn migrate(
    store: &Path,
    paths: &[PathBuf],
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    let (chain, target) = load_chain(paths)?;
    let open = open_store(StoreConfig::new(store), target, &chain)?;
    open.flush()?;
    info!(store = %store.display(), version = %open.schema().version, "store migrated");
    Ok(formatter.format_report(open.report()))
}

/// Summarize a store's model and contents.
pub fn inspect(store: &Path, formatter: &dyn Formatter) -> Result<String, CliError> {
    let sled_store = open_existing(store)?;
    let model = sled_store
        .current_model()?
        .ok_or_else(|| CliError::EmptyStore(store.to_path_buf()))?;

    let mut counts: BTreeMap<String, usize> = model
        .entities
        .values()
        .filter(|e| !e.is_abstract)
        .map(|e| (e.name.clone(), 0))
        .collect();
    for result in sled_store.scan() {
        let (_, record) = result?;
        *counts.entry(record.entity).or_default() += 1;
    }

    Ok(formatter.format_summary(&StoreSummary {
        version: model.version.clone(),
        fingerprint: model.fingerprint(),
        entities: counts.into_iter().collect(),
    }))
}

/// Open a store without creating one where none exists.
fn open_existing(store: &Path) -> Result<SledStore, CliError> {
    if !store.is_dir() {
        return Err(CliError::EmptyStore(store.to_path_buf()));
    }
    Ok(SledStore::open(StoreConfig::new(store))?)
}
