//! Migration descriptors and the version chain.

use super::store::MigrationContext;
use crate::catalog::{EntityDeclaration, Schema, SchemaBuilder, SchemaError};
use crate::error::StoreError;
use std::fmt;
use std::sync::Arc;

type ScriptFn = dyn Fn(&mut dyn MigrationContext) -> Result<(), StoreError> + Send + Sync;

/// A data transformation run against a live store.
#[derive(Clone)]
pub struct MigrationScript(Arc<ScriptFn>);

impl MigrationScript {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&mut dyn MigrationContext) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        Self(Arc::new(script))
    }

    /// Run the script.
    pub fn run(&self, context: &mut dyn MigrationContext) -> Result<(), StoreError> {
        (self.0)(context)
    }
}

impl fmt::Debug for MigrationScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MigrationScript(..)")
    }
}

/// How to migrate from one schema version to the next.
#[derive(Debug, Clone)]
pub struct MigrationDescriptor {
    /// Version this migration starts from.
    pub source_version: String,
    /// Optional data transformation.
    pub script: Option<MigrationScript>,
    /// Whether the script may safely run more than once. Non-idempotent
    /// scripts are guarded by a marker record.
    pub idempotent: bool,
}

impl MigrationDescriptor {
    /// A migration with no script.
    pub fn lightweight(source_version: impl Into<String>) -> Self {
        Self {
            source_version: source_version.into(),
            script: None,
            idempotent: false,
        }
    }

    /// A migration running `script`.
    pub fn scripted<F>(source_version: impl Into<String>, script: F) -> Self
    where
        F: Fn(&mut dyn MigrationContext) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        Self {
            source_version: source_version.into(),
            script: Some(MigrationScript::new(script)),
            idempotent: false,
        }
    }

    /// Mark the script as idempotent.
    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }
}

/// One historical version and the migration leaving it.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub schema: Arc<Schema>,
    pub migration: MigrationDescriptor,
}

/// Historical schema versions, oldest first.
///
/// Each entry's migration leads to the next entry's schema; the last one
/// leads to the current schema, which is not part of the chain.
#[derive(Debug, Clone, Default)]
pub struct VersionChain {
    entries: Vec<ChainEntry>,
}

impl VersionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a version.
    pub fn push(&mut self, schema: Schema, migration: MigrationDescriptor) {
        self.entries.push(ChainEntry {
            schema: Arc::new(schema),
            migration,
        });
    }

    /// Append a version, builder style.
    pub fn with_version(mut self, schema: Schema, migration: MigrationDescriptor) -> Self {
        self.push(schema, migration);
        self
    }

    /// Build a historical schema from declarations and append it together
    /// with the migration leaving it.
    pub fn declare(
        self,
        version: impl Into<String>,
        declarations: impl IntoIterator<Item = EntityDeclaration>,
        migration: MigrationDescriptor,
    ) -> Result<Self, SchemaError> {
        let schema = SchemaBuilder::new(version).with_entities(declarations).build()?;
        Ok(self.with_version(schema, migration))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainEntry> {
        self.entries.iter()
    }

    /// Version identifiers, oldest first.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.schema.version.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Attribute, ScalarType};

    #[test]
    fn test_descriptor_builders() {
        let plain = MigrationDescriptor::lightweight("v1");
        assert!(plain.script.is_none());
        assert!(!plain.idempotent);

        let scripted = MigrationDescriptor::scripted("v2", |_ctx| Ok(())).idempotent();
        assert!(scripted.script.is_some());
        assert!(scripted.idempotent);
        assert_eq!(format!("{:?}", scripted.script.unwrap()), "MigrationScript(..)");
    }

    #[test]
    fn test_declare_chain() {
        let chain = VersionChain::new()
            .declare(
                "v1",
                [EntityDeclaration::new("Item")],
                MigrationDescriptor::lightweight("v1"),
            )
            .unwrap()
            .declare(
                "v2",
                [EntityDeclaration::new("Item")
                    .with_attribute(Attribute::optional("label", ScalarType::String))],
                MigrationDescriptor::lightweight("v2"),
            )
            .unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.versions().collect::<Vec<_>>(), vec!["v1", "v2"]);
        assert!(chain.entries()[1].schema.get_entity("Item").is_some());
    }

    #[test]
    fn test_declare_rejects_invalid_schema() {
        let err = VersionChain::new()
            .declare(
                "v1",
                [EntityDeclaration::new("A"), EntityDeclaration::new("A")],
                MigrationDescriptor::lightweight("v1"),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEntityName { .. }));
    }
}
