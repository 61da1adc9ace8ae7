//! Schema declaration files.
//!
//! A schema file is a JSON object holding a version identifier and the
//! ordered entity declarations of that version:
//!
//! ```json
//! {
//!   "version": "v2",
//!   "entities": [
//!     { "name": "Person", "properties": [
//!       { "kind": "attribute", "name": "name", "scalar_type": "string" }
//!     ] }
//!   ]
//! }
//! ```

use crate::error::CliError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_core::catalog::{EntityDeclaration, Schema, SchemaBuilder};
use strata_core::migration::{MigrationDescriptor, VersionChain};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaFile {
    pub version: String,
    #[serde(default)]
    pub entities: Vec<EntityDeclaration>,
}

impl SchemaFile {
    /// Parse a schema file from JSON text.
    pub fn parse(path: &Path, text: &str) -> Result<Self, CliError> {
        serde_json::from_str(text).map_err(|source| CliError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a schema file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Build the schema these declarations describe.
    pub fn build(self, path: &Path) -> Result<Schema, CliError> {
        SchemaBuilder::new(self.version)
            .with_entities(self.entities)
            .build()
            .map_err(|source| CliError::Schema {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Load and build one schema.
pub fn load_schema(path: &Path) -> Result<Schema, CliError> {
    SchemaFile::load(path)?.build(path)
}

/// Load a list of schema files, oldest first, into a version chain ending
/// before the last file, which is returned as the target.
///
/// Files carry no scripts, so every transition is lightweight.
pub fn load_chain(paths: &[PathBuf]) -> Result<(VersionChain, Schema), CliError> {
    let mut schemas = paths
        .iter()
        .map(|p| load_schema(p))
        .collect::<Result<Vec<_>, _>>()?;
    let target = schemas.pop().ok_or(CliError::NoSchemas)?;

    let chain = schemas.into_iter().fold(VersionChain::new(), |chain, schema| {
        let migration = MigrationDescriptor::lightweight(schema.version.clone());
        chain.with_version(schema, migration)
    });
    Ok((chain, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEOPLE: &str = r#"{
        "version": "v1",
        "entities": [
            {
                "name": "Person",
                "properties": [
                    { "kind": "attribute", "name": "name", "scalar_type": "string" },
                    { "kind": "attribute", "name": "age", "scalar_type": "int64", "optional": true },
                    {
                        "kind": "relationship",
                        "name": "home",
                        "related_entity": "Place",
                        "inverse_name": "occupants",
                        "range": { "min": 0, "max": 1 },
                        "inverse": { "range": { "min": 0, "max": null } }
                    }
                ]
            },
            { "name": "Place" }
        ]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let path = Path::new("people.json");
        let schema = SchemaFile::parse(path, PEOPLE).unwrap().build(path).unwrap();

        assert_eq!(schema.version, "v1");
        let person = schema.get_entity("Person").unwrap();
        assert!(person.get_attribute("age").unwrap().optional);
        let occupants = schema.get_entity("Place").unwrap().get_relationship("occupants");
        assert!(occupants.unwrap().is_to_many());
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = SchemaFile::parse(Path::new("bad.json"), "{").unwrap_err();
        assert!(err.to_string().starts_with("cannot parse bad.json"));
    }

    #[test]
    fn test_invalid_schema_names_file() {
        let text = r#"{ "version": "v1", "entities": [ { "name": "A" }, { "name": "A" } ] }"#;
        let path = Path::new("dup.json");
        let err = SchemaFile::parse(path, text).unwrap().build(path).unwrap_err();
        assert!(matches!(err, CliError::Schema { .. }));
    }

    #[test]
    fn test_load_chain() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = ["v1", "v2", "v3"]
            .iter()
            .map(|v| {
                let path = dir.path().join(format!("{v}.json"));
                let text = format!(r#"{{ "version": "{v}", "entities": [ {{ "name": "Item" }} ] }}"#);
                std::fs::write(&path, text).unwrap();
                path
            })
            .collect();

        let (chain, target) = load_chain(&paths).unwrap();
        assert_eq!(chain.versions().collect::<Vec<_>>(), vec!["v1", "v2"]);
        assert_eq!(target.version, "v3");
        assert!(chain.iter().all(|e| e.migration.script.is_none()));
    }
}
