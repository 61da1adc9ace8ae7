//! CLI error type.

use std::path::PathBuf;
use strata_core::catalog::SchemaError;
use strata_core::migration::{DiffError, MigrationError};
use strata_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// A schema file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A schema file is not valid JSON for a declaration list.
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The declarations do not form a valid schema.
    #[error("invalid schema in {}: {source}", path.display())]
    Schema { path: PathBuf, source: SchemaError },

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Open(#[from] strata_core::Error),

    #[error("no schema files given")]
    NoSchemas,

    /// The store has never been initialized.
    #[error("store at {} has no model", .0.display())]
    EmptyStore(PathBuf),
}
