//! Entity and schema diffing.
//!
//! Compares two schema versions entity by entity. Entities pair through
//! their rename markers exactly like properties do; each paired entity is
//! then compared on its descriptor fields and on its attribute and
//! relationship collections. Query specs do not affect stored data and are
//! not compared.

use super::error::DiffError;
use super::property_diff::{
    diff_attributes, diff_collection, diff_relationships, ChangeSet, CollectionDiff, Difference,
};
use crate::catalog::{EntityDescriptor, Schema};

/// Difference between two versions of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDifference {
    /// Old and new name, if the entity was renamed.
    pub name_changed: Option<(String, String)>,
    /// Old and new abstractness.
    pub abstract_changed: Option<(bool, bool)>,
    /// Old and new parent.
    pub parent_changed: Option<(Option<String>, Option<String>)>,
    /// Attribute changes.
    pub attributes: CollectionDiff<ChangeSet>,
    /// Relationship changes.
    pub relationships: CollectionDiff<ChangeSet>,
}

impl EntityDifference {
    /// Check if there are any changes.
    pub fn is_empty(&self) -> bool {
        self.name_changed.is_none()
            && self.abstract_changed.is_none()
            && self.parent_changed.is_none()
            && self.attributes.is_empty()
            && self.relationships.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        usize::from(self.name_changed.is_some())
            + usize::from(self.abstract_changed.is_some())
            + usize::from(self.parent_changed.is_some())
            + self.attributes.change_count()
            + self.relationships.change_count()
    }
}

impl Difference for EntityDifference {
    fn without_rename(&self) -> Option<Self> {
        let stripped = EntityDifference {
            name_changed: None,
            ..self.clone()
        };
        (!stripped.is_empty()).then_some(stripped)
    }
}

/// Compare two versions of an entity.
///
/// Property errors are attributed to the new entity's name.
pub fn entity_difference(
    old: &EntityDescriptor,
    new: &EntityDescriptor,
) -> Result<Option<EntityDifference>, DiffError> {
    let attributes =
        diff_attributes(&old.attributes, &new.attributes).map_err(|e| e.in_entity(&new.name))?;
    let relationships = diff_relationships(&old.relationships, &new.relationships)
        .map_err(|e| e.in_entity(&new.name))?;

    let difference = EntityDifference {
        name_changed: (old.name != new.name).then(|| (old.name.clone(), new.name.clone())),
        abstract_changed: (old.is_abstract != new.is_abstract)
            .then_some((old.is_abstract, new.is_abstract)),
        parent_changed: (old.parent != new.parent)
            .then(|| (old.parent.clone(), new.parent.clone())),
        attributes,
        relationships,
    };

    Ok((!difference.is_empty()).then_some(difference))
}

/// Complete diff between two schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDiff {
    /// Source schema version.
    pub from_version: String,
    /// Target schema version.
    pub to_version: String,
    /// Entity changes.
    pub entities: CollectionDiff<EntityDifference>,
}

impl SchemaDiff {
    /// Compute the diff between two schemas.
    pub fn compute(from: &Schema, to: &Schema) -> Result<Self, DiffError> {
        let entities = diff_collection(from.entities_in_order(), to.entities_in_order(), |a, b| {
            entity_difference(a, b)
        })?;

        Ok(SchemaDiff {
            from_version: from.version.clone(),
            to_version: to.version.clone(),
            entities,
        })
    }

    /// Check if there are any changes.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get the total number of changes, counting each property change.
    pub fn change_count(&self) -> usize {
        self.entities.added.len()
            + self.entities.removed.len()
            + self
                .entities
                .modified
                .values()
                .map(EntityDifference::change_count)
                .sum::<usize>()
    }

    /// Name in the old schema of the entity now called `new_name`.
    pub fn old_entity_name<'a>(&'a self, new_name: &'a str) -> Option<&'a str> {
        self.entities.old_name_of(new_name)
    }

    /// Difference for the entity now called `new_name`, if it changed.
    pub fn entity(&self, new_name: &str) -> Option<&EntityDifference> {
        self.entities.modified.get(new_name)
    }
}
