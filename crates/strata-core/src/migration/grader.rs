//! Compatibility grading for schema transitions.
//!
//! Analyzes a schema diff and lists every change that cannot be carried out
//! by a purely structural (lightweight) transform. An empty list means the
//! transition is lightweight.

use super::diff::{EntityDifference, SchemaDiff};
use super::property_diff::PropertyChange;
use crate::catalog::{CardinalityRange, EntityDescriptor, Schema, ScalarType, StorageKind};
use std::fmt;

/// Why a change needs an explicit data transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformReason {
    /// A required attribute appeared and existing rows have no value for it.
    RequiredAttributeWithoutDefault,
    /// Stored values must be converted to a new type.
    TypeChanged { from: ScalarType, to: ScalarType },
    /// Stored values must be moved to a new layout.
    StorageChanged { from: StorageKind, to: StorageKind },
    /// An optional attribute became required and has no default.
    BecameRequiredWithoutDefault,
    /// The allowed link count shrank.
    CardinalityTightened {
        from: CardinalityRange,
        to: CardinalityRange,
    },
    /// A relationship requiring links appeared on an existing entity.
    RequiredRelationshipAdded,
    /// A relationship now points at a different entity.
    RelatedEntityChanged { from: String, to: String },
    /// An attribute became a relationship or the other way round.
    KindChanged,
    /// A concrete entity became abstract, so its rows must move elsewhere.
    BecameAbstract,
}

/// One change needing a data transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequirement {
    /// Entity name in the target schema.
    pub entity: String,
    /// Property name in the target schema, if the requirement is per property.
    pub property: Option<String>,
    pub reason: TransformReason,
}

/// Grading result for one schema transition.
#[derive(Debug, Clone)]
pub struct CompatibilityReport {
    /// Source schema version.
    pub from_version: String,
    /// Target schema version.
    pub to_version: String,
    /// Whether the two schemas differ at all.
    pub structural_change: bool,
    /// Changes that need a script.
    pub requirements: Vec<TransformRequirement>,
}

impl CompatibilityReport {
    /// Grade a diff whose target schema is `to`.
    pub fn grade(diff: &SchemaDiff, to: &Schema) -> Self {
        let mut requirements = Vec::new();

        for (name, change) in &diff.entities.modified {
            if let Some(target) = to.get_entity(name) {
                Self::grade_entity(diff, target, change, &mut requirements);
            }
        }

        CompatibilityReport {
            from_version: diff.from_version.clone(),
            to_version: diff.to_version.clone(),
            structural_change: !diff.is_empty(),
            requirements,
        }
    }

    /// Check if the transition can be performed without a script.
    pub fn is_lightweight(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Check if a script is required.
    pub fn requires_script(&self) -> bool {
        !self.requirements.is_empty()
    }

    fn grade_entity(
        diff: &SchemaDiff,
        target: &EntityDescriptor,
        change: &EntityDifference,
        out: &mut Vec<TransformRequirement>,
    ) {
        let require = |property: Option<&str>, reason| TransformRequirement {
            entity: target.name.clone(),
            property: property.map(str::to_string),
            reason,
        };

        if let Some((false, true)) = change.abstract_changed {
            out.push(require(None, TransformReason::BecameAbstract));
        }

        for name in &change.attributes.added {
            if change.relationships.removed.contains(name) {
                out.push(require(Some(name.as_str()), TransformReason::KindChanged));
                continue;
            }
            let Some(attr) = target.get_attribute(name) else {
                continue;
            };
            if !attr.optional && attr.initial_value().is_none() {
                out.push(require(
                    Some(name.as_str()),
                    TransformReason::RequiredAttributeWithoutDefault,
                ));
            }
        }

        for (name, changes) in &change.attributes.modified {
            let has_default = target
                .get_attribute(name)
                .map_or(false, |a| a.initial_value().is_some());
            for property_change in changes.iter() {
                let reason = match property_change {
                    PropertyChange::TypeChanged { from, to } => TransformReason::TypeChanged {
                        from: *from,
                        to: *to,
                    },
                    PropertyChange::StorageChanged { from, to } => {
                        TransformReason::StorageChanged {
                            from: *from,
                            to: *to,
                        }
                    }
                    PropertyChange::OptionalityChanged { to: false, .. } if !has_default => {
                        TransformReason::BecameRequiredWithoutDefault
                    }
                    _ => continue,
                };
                out.push(require(Some(name.as_str()), reason));
            }
        }

        for name in &change.relationships.added {
            if change.attributes.removed.contains(name) {
                out.push(require(Some(name.as_str()), TransformReason::KindChanged));
                continue;
            }
            if target
                .get_relationship(name)
                .map_or(false, |r| !r.range.is_optional())
            {
                out.push(require(Some(name.as_str()), TransformReason::RequiredRelationshipAdded));
            }
        }

        for (name, changes) in &change.relationships.modified {
            for property_change in changes.iter() {
                let reason = match property_change {
                    PropertyChange::CardinalityChanged { from, to } if to.is_tightening_of(from) => {
                        TransformReason::CardinalityTightened {
                            from: *from,
                            to: *to,
                        }
                    }
                    // A renamed target entity is still the same entity.
                    PropertyChange::RelatedEntityChanged { from, to }
                        if diff.old_entity_name(to) != Some(from.as_str()) =>
                    {
                        TransformReason::RelatedEntityChanged {
                            from: from.clone(),
                            to: to.clone(),
                        }
                    }
                    _ => continue,
                };
                out.push(require(Some(name.as_str()), reason));
            }
        }
    }
}

impl fmt::Display for TransformReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformReason::RequiredAttributeWithoutDefault => {
                write!(f, "required attribute added without default")
            }
            TransformReason::TypeChanged { from, to } => write!(f, "type {} -> {}", from, to),
            TransformReason::StorageChanged { from, to } => {
                write!(f, "storage {} -> {}", from, to)
            }
            TransformReason::BecameRequiredWithoutDefault => {
                write!(f, "became required without default")
            }
            TransformReason::CardinalityTightened { from, to } => {
                write!(f, "cardinality tightened {} -> {}", from, to)
            }
            TransformReason::RequiredRelationshipAdded => write!(f, "required relationship added"),
            TransformReason::RelatedEntityChanged { from, to } => {
                write!(f, "related entity {} -> {}", from, to)
            }
            TransformReason::KindChanged => write!(f, "property kind changed"),
            TransformReason::BecameAbstract => write!(f, "entity became abstract"),
        }
    }
}

impl fmt::Display for TransformRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(property) => write!(f, "{}.{}: {}", self.entity, property, self.reason),
            None => write!(f, "{}: {}", self.entity, self.reason),
        }
    }
}
