//! Schema catalog for Strata.
//!
//! The catalog holds entity declarations, the schema builder that resolves
//! them into a validated graph, and the structural fingerprint stores use to
//! recognise which schema their data conforms to.

mod attribute;
mod builder;
mod entity;
mod error;
mod property;
mod query;
mod relationship;
mod schema;
mod types;

pub use attribute::{Attribute, DefaultValue};
pub use builder::SchemaBuilder;
pub use entity::{EntityDeclaration, EntityDescriptor};
pub use error::{InverseProblem, SchemaError};
pub use property::{PropertyDescriptor, PropertyKind};
pub use query::{OrderBy, OrderDirection, QuerySpec};
pub use relationship::{CardinalityRange, DeleteBehavior, InverseDetail, Relationship};
pub use schema::{Schema, StoreFingerprint};
pub use types::{ScalarType, StorageKind};

/// Build a schema from an ordered list of declarations.
pub fn build_schema(
    version: impl Into<String>,
    declarations: impl IntoIterator<Item = EntityDeclaration>,
) -> Result<Schema, SchemaError> {
    SchemaBuilder::new(version).with_entities(declarations).build()
}
