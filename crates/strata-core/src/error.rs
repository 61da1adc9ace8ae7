//! Core error types.

use crate::catalog::SchemaError;
use crate::migration::{DiffError, MigrationError};
use thiserror::Error;

/// Errors raised by a store or by a migration script running against it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Record not found.
    #[error("record {0} not found")]
    NotFound(u64),

    /// The store has never been initialized with a model.
    #[error("store has no model")]
    Uninitialized,

    /// The store's fingerprint does not match the requested model.
    #[error("store is at {found}, expected {expected}")]
    IncompatibleModel { expected: String, found: String },

    /// Entity not declared in the current model.
    #[error("unknown entity {0}")]
    UnknownEntity(String),

    /// Property not declared on the entity.
    #[error("unknown property {entity}.{property}")]
    UnknownProperty { entity: String, property: String },

    /// Attempt to instantiate an abstract entity.
    #[error("entity {0} is abstract")]
    AbstractEntity(String),

    /// Value does not fit the declared attribute type.
    #[error("{entity}.{attribute} expects {expected}, got {found}")]
    IncompatibleValue {
        entity: String,
        attribute: String,
        expected: String,
        found: String,
    },

    /// Required attribute has no value.
    #[error("{entity}.{attribute} is required")]
    MissingValue { entity: String, attribute: String },

    /// Link count outside the relationship's range.
    #[error("{entity}.{relationship} holds {count} link(s), allowed {range}")]
    CardinalityViolation {
        entity: String,
        relationship: String,
        count: usize,
        range: String,
    },

    /// Link target is not of the related entity.
    #[error("{entity}.{relationship} cannot link to {found}")]
    WrongRelatedEntity {
        entity: String,
        relationship: String,
        found: String,
    },

    /// Delete blocked by a restrict rule.
    #[error("cannot delete {entity} {id}: {relationship} is restricted")]
    DeleteRestricted {
        entity: String,
        id: u64,
        relationship: String,
    },

    /// Diff failed while transforming the store.
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    /// A migration script reported a failure.
    #[error("script failed: {0}")]
    Script(String),
}

/// Top-level error returned by [`open_store`](crate::open_store).
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid declarations.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Invalid rename markers.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// Planning failed; the store was not touched.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Store failure, possibly after some migration steps completed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Store(StoreError::Storage(e))
    }
}
