//! Key layout of the store tree.
//!
//! Everything lives in one sled tree, separated by prefix:
//!
//! - `record:<id: 8 bytes big-endian>` -> rkyv [`Record`](super::Record)
//! - `marker:<name>` -> timestamp of the applied scripted step
//! - `meta:model` -> JSON of the current [`Schema`](crate::catalog::Schema)
//! - `meta:fingerprint` -> 32-byte structural fingerprint
//!
//! Big-endian ids keep record scans in creation order.

use super::RecordId;

pub const RECORD_PREFIX: &[u8] = b"record:";
pub const MARKER_PREFIX: &[u8] = b"marker:";
pub const META_MODEL: &[u8] = b"meta:model";
pub const META_FINGERPRINT: &[u8] = b"meta:fingerprint";

/// Encode the key of a record.
pub fn record_key(id: RecordId) -> Vec<u8> {
    let mut key = Vec::with_capacity(RECORD_PREFIX.len() + 8);
    key.extend_from_slice(RECORD_PREFIX);
    key.extend_from_slice(&id.0.to_be_bytes());
    key
}

/// Decode a record key.
pub fn decode_record_key(key: &[u8]) -> Option<RecordId> {
    let id = key.strip_prefix(RECORD_PREFIX)?;
    let bytes: [u8; 8] = id.try_into().ok()?;
    Some(RecordId(u64::from_be_bytes(bytes)))
}

/// Encode the key of a marker.
pub fn marker_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(MARKER_PREFIX.len() + name.len());
    key.extend_from_slice(MARKER_PREFIX);
    key.extend_from_slice(name.as_bytes());
    key
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
