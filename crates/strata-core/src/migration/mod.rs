//! Schema evolution for Strata.
//!
//! This module provides:
//! - Rename-aware diffing of properties, entities and schemas
//! - Compatibility grading (lightweight vs. scripted transitions)
//! - Planning over a chain of historical schema versions
//! - Stepwise execution with marker-guarded scripts
//!
//! # Example
//!
//! ```ignore
//! use strata_core::migration::{MigrationPlanner, Migrator};
//!
//! let plan = MigrationPlanner::plan(&fingerprint, &target, &chain)?;
//! let report = Migrator::apply(&store, &plan)?;
//! println!("{} steps", report.steps_executed);
//! ```

pub mod descriptor;
pub mod diff;
pub mod error;
pub mod executor;
pub mod grader;
pub mod plan;
pub mod property_diff;
pub mod store;

// Diff types
pub use diff::{entity_difference, EntityDifference, SchemaDiff};
pub use property_diff::{
    diff_attribute, diff_attributes, diff_collection, diff_property, diff_relationship,
    diff_relationships, ChangeKind, ChangeSet, CollectionDiff, Difference, Lineage,
    PropertyChange,
};

// Error types
pub use error::{DiffError, MigrationError};

// Grader types
pub use grader::{CompatibilityReport, TransformReason, TransformRequirement};

// Plan types
pub use descriptor::{ChainEntry, MigrationDescriptor, MigrationScript, VersionChain};
pub use plan::{MigrationPlan, MigrationPlanner, MigrationStep};

// Executor types
pub use executor::{MigrationReport, Migrator};
pub use store::{MigrationContext, ModelStore};
