//! Strata Core - schema graph, schema evolution and a reference store.
//!
//! This crate builds validated schema graphs from entity declarations,
//! diffs schema versions with rename tracking, plans migrations over a
//! chain of historical versions and applies them to a store.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod error;
pub mod migration;
pub mod open;
pub mod storage;

pub use catalog::{
    build_schema, Attribute, CardinalityRange, DefaultValue, DeleteBehavior, EntityDeclaration,
    EntityDescriptor, PropertyDescriptor, QuerySpec, Relationship, ScalarType, Schema,
    SchemaBuilder, SchemaError, StorageKind, StoreFingerprint,
};
pub use error::{Error, StoreError};
pub use migration::{
    CompatibilityReport, DiffError, MigrationContext, MigrationDescriptor, MigrationError,
    MigrationPlan, MigrationPlanner, MigrationReport, MigrationStep, Migrator, ModelStore,
    SchemaDiff, VersionChain,
};
pub use open::{open_store, OpenStore};
pub use storage::{ContextMode, Record, RecordId, SledContext, SledStore, StoreConfig, Value};
