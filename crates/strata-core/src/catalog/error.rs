//! Schema construction errors.

use thiserror::Error;

/// Why a relationship's inverse could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverseProblem {
    /// The related entity declares no inverse and none was requested.
    Missing,
    /// The related entity declares the inverse and the relationship also
    /// asks for one to be synthesized.
    Duplicate,
    /// The inverse name resolves to an attribute or query.
    NotARelationship,
    /// The declared inverse does not point back at this relationship.
    Mismatched,
}

impl std::fmt::Display for InverseProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InverseProblem::Missing => write!(f, "missing"),
            InverseProblem::Duplicate => write!(f, "declared and synthesized"),
            InverseProblem::NotARelationship => write!(f, "not a relationship"),
            InverseProblem::Mismatched => write!(f, "does not point back"),
        }
    }
}

/// Errors raised while building a schema from declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two declarations claim the same entity name.
    #[error("duplicate entity name: {entity}")]
    DuplicateEntityName { entity: String },

    /// A relationship or query targets an undeclared entity.
    #[error("{entity}.{property} refers to unknown entity {target}")]
    UnknownRelatedEntity {
        entity: String,
        property: String,
        target: String,
    },

    /// A relationship's inverse is missing, duplicated or inconsistent.
    #[error("inverse {inverse} of {entity}.{relationship} is {reason}")]
    MissingOrDuplicateInverse {
        entity: String,
        relationship: String,
        inverse: String,
        reason: InverseProblem,
    },

    /// A declaration names a parent that is not declared.
    #[error("{entity} inherits from unknown entity {parent}")]
    UnknownParentEntity { entity: String, parent: String },

    /// Parent references form a loop.
    #[error("inheritance cycle through {entity}")]
    InheritanceCycle { entity: String },

    /// A property name is used twice within one entity's lineage.
    #[error("duplicate property name {entity}.{property}")]
    DuplicatePropertyName { entity: String, property: String },

    /// A relationship range whose minimum exceeds its maximum.
    #[error("{entity}.{relationship} has empty range {range}")]
    InvalidRange {
        entity: String,
        relationship: String,
        range: String,
    },

    /// An attribute default that cannot be stored in the attribute's type.
    #[error("default of {entity}.{attribute} is not a valid {scalar_type}")]
    InvalidDefault {
        entity: String,
        attribute: String,
        scalar_type: String,
    },
}
