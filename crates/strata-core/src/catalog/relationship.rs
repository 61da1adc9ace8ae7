//! Relationship definitions between entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed number of related objects on one side of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardinalityRange {
    /// Minimum number of related objects.
    pub min: u32,
    /// Maximum number of related objects, `None` for unbounded.
    pub max: Option<u32>,
}

/// Behavior when an object on the owning side is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    /// Delete related objects.
    Cascade,
    /// Prevent deletion while related objects exist.
    Restrict,
    /// Unlink related objects.
    #[default]
    SetNull,
}

/// Shape of an inverse relationship that the schema builder synthesizes on
/// the related entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InverseDetail {
    /// Cardinality of the synthesized inverse.
    pub range: CardinalityRange,
    /// Delete behavior of the synthesized inverse.
    #[serde(default)]
    pub on_delete: DeleteBehavior,
}

/// A named association from one entity to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship name.
    pub name: String,
    /// Entity on the other side.
    pub related_entity: String,
    /// Name of the inverse relationship on `related_entity`.
    pub inverse_name: String,
    /// Allowed number of related objects.
    pub range: CardinalityRange,
    /// Delete behavior.
    #[serde(default)]
    pub on_delete: DeleteBehavior,
    /// Name of the property this relationship continues from the previous version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_from: Option<String>,
    /// Inverse to synthesize when `related_entity` does not declare one.
    /// Cleared once the schema has been built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<InverseDetail>,
}

impl CardinalityRange {
    /// Create a range.
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Zero or one related object.
    pub fn optional_to_one() -> Self {
        Self::new(0, Some(1))
    }

    /// Exactly one related object.
    pub fn required_to_one() -> Self {
        Self::new(1, Some(1))
    }

    /// Any number of related objects.
    pub fn to_many() -> Self {
        Self::new(0, None)
    }

    /// Check if more than one related object is allowed.
    pub fn is_to_many(&self) -> bool {
        self.max.map_or(true, |max| max > 1)
    }

    /// Check if some count fits this range.
    pub fn is_satisfiable(&self) -> bool {
        self.max.map_or(true, |max| self.min <= max)
    }

    /// Check if zero related objects are allowed.
    pub fn is_optional(&self) -> bool {
        self.min == 0
    }

    /// Check if a link count fits this range.
    pub fn contains(&self, count: usize) -> bool {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Check if this range rejects counts that `previous` accepted.
    pub fn is_tightening_of(&self, previous: &CardinalityRange) -> bool {
        if self.min > previous.min {
            return true;
        }
        match (self.max, previous.max) {
            (Some(_), None) => true,
            (Some(max), Some(prev)) => max < prev,
            (None, _) => false,
        }
    }
}

impl fmt::Display for CardinalityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..", self.min),
        }
    }
}

impl Relationship {
    /// Create an optional to-one relationship.
    pub fn to_one(
        name: impl Into<String>,
        related_entity: impl Into<String>,
        inverse_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            related_entity: related_entity.into(),
            inverse_name: inverse_name.into(),
            range: CardinalityRange::optional_to_one(),
            on_delete: DeleteBehavior::SetNull,
            rename_from: None,
            inverse: None,
        }
    }

    /// Create a to-many relationship.
    pub fn to_many(
        name: impl Into<String>,
        related_entity: impl Into<String>,
        inverse_name: impl Into<String>,
    ) -> Self {
        Self {
            range: CardinalityRange::to_many(),
            ..Self::to_one(name, related_entity, inverse_name)
        }
    }

    /// Set the cardinality range.
    pub fn with_range(mut self, range: CardinalityRange) -> Self {
        self.range = range;
        self
    }

    /// Set delete behavior.
    pub fn with_on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = on_delete;
        self
    }

    /// Mark this relationship as the continuation of `old_name`.
    pub fn renamed_from(mut self, old_name: impl Into<String>) -> Self {
        self.rename_from = Some(old_name.into());
        self
    }

    /// Ask the schema builder to synthesize the inverse on the related entity.
    pub fn with_inverse(mut self, range: CardinalityRange, on_delete: DeleteBehavior) -> Self {
        self.inverse = Some(InverseDetail { range, on_delete });
        self
    }

    /// Check if more than one related object is allowed.
    pub fn is_to_many(&self) -> bool {
        self.range.is_to_many()
    }

    /// Build the inverse relationship from the attached detail, with `owner`
    /// being the entity that declares `self`.
    pub fn synthesize_inverse(&self, owner: &str) -> Option<Relationship> {
        let detail = self.inverse?;
        Some(Relationship {
            name: self.inverse_name.clone(),
            related_entity: owner.to_string(),
            inverse_name: self.name.clone(),
            range: detail.range,
            on_delete: detail.on_delete,
            rename_from: None,
            inverse: None,
        })
    }
}
