//! Stored query specifications.
//!
//! A query spec is carried by the schema but never evaluated here; its filter
//! is an opaque string owned by whatever query layer consumes the schema.

use serde::{Deserialize, Serialize};

/// A named, stored query attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Query name.
    pub name: String,
    /// Entity the query fetches.
    pub target_entity: String,
    /// Filter expression.
    #[serde(default)]
    pub filter: String,
    /// Sort order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<OrderBy>,
}

/// Order specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Property name to order by.
    pub property: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl QuerySpec {
    /// Create a query over `target_entity`.
    pub fn new(
        name: impl Into<String>,
        target_entity: impl Into<String>,
        filter: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_entity: target_entity.into(),
            filter: filter.into(),
            sort: Vec::new(),
        }
    }

    /// Append a sort key.
    pub fn with_sort(mut self, order: OrderBy) -> Self {
        self.sort.push(order);
        self
    }
}

impl OrderBy {
    /// Create ascending order.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create descending order.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Desc,
        }
    }
}
