//! Diff and migration planning errors.

use super::grader::TransformRequirement;
use thiserror::Error;

/// Errors raised while diffing two schemas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// A rename marker names something the old version does not have.
    #[error("{new_name} is renamed from unknown {old_name}")]
    UnknownRenameTarget { old_name: String, new_name: String },

    /// Several renames of one old property disagree on what it became.
    #[error("ambiguous rename of {old_name}: {}", .candidates.join(", "))]
    AmbiguousRename {
        old_name: String,
        candidates: Vec<String>,
    },

    /// A property-level error inside an entity.
    #[error("in entity {entity}: {source}")]
    Entity {
        entity: String,
        source: Box<DiffError>,
    },
}

impl DiffError {
    /// Attribute this error to `entity`.
    pub fn in_entity(self, entity: impl Into<String>) -> Self {
        DiffError::Entity {
            entity: entity.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, without entity attribution.
    pub fn root(&self) -> &DiffError {
        match self {
            DiffError::Entity { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors raised while planning a migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Two schemas in the chain share a version identifier.
    #[error("duplicate version identifier: {version}")]
    DuplicateVersionIdentifier { version: String },

    /// The store matches no schema in the chain.
    #[error("store fingerprint {fingerprint} matches no known schema version")]
    NoCompatibleVersion { fingerprint: String },

    /// A transition needs a data transformation but has no script.
    #[error(
        "migration {from_version} -> {to_version} requires a script: {}",
        .requirements.iter().map(|r| r.to_string()).collect::<Vec<_>>().join("; ")
    )]
    MissingRequiredScript {
        from_version: String,
        to_version: String,
        requirements: Vec<TransformRequirement>,
    },

    /// A descriptor's source version is not the preceding schema.
    #[error("migration to {to_version} declares source {declared}, expected {expected}")]
    MismatchedMigrationSource {
        to_version: String,
        declared: String,
        expected: String,
    },

    /// Diffing two adjacent versions failed.
    #[error("diff {from_version} -> {to_version} failed: {source}")]
    Diff {
        from_version: String,
        to_version: String,
        source: DiffError,
    },
}
