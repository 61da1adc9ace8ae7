//! Core type definitions for the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar value types an attribute can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
}

/// How an attribute's value is laid out by the storage engine.
///
/// Changing the storage kind of an attribute changes the bytes on disk, so it
/// always needs an explicit data transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Stored inline in the owning record.
    #[default]
    Inline,
    /// Stored out of line, the record keeps a reference.
    External,
    /// Stored through a value transformer (opaque encoded bytes).
    Transformable,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float32 | ScalarType::Float64
        )
    }

    /// Check if this type is a string-like type.
    pub fn is_string_like(&self) -> bool {
        matches!(self, ScalarType::String | ScalarType::Bytes)
    }

    /// Stable lowercase name, used in fingerprints and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
            ScalarType::Timestamp => "timestamp",
            ScalarType::Uuid => "uuid",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StorageKind {
    /// Stable lowercase name, used in fingerprints and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Inline => "inline",
            StorageKind::External => "external",
            StorageKind::Transformable => "transformable",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
