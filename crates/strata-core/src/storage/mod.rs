//! Storage layer for Strata.
//!
//! A sled-backed reference store: records keyed by id, one persisted model
//! with its fingerprint, buffered contexts, and the structural transform
//! used by lightweight migration steps.

mod config;
mod context;
mod engine;
mod record;
mod transform;
mod value;

pub mod key;

pub use config::StoreConfig;
pub use context::{find_by, ContextMode, SledContext};
pub use engine::SledStore;
pub use record::{Record, RecordId};
pub use transform::{ModelTransform, TransformStats};
pub use value::Value;
