//! Snapshot hashing.
//!
//! A snapshot hash is the base64 text of the JSON array of filtered entries.
//! It is reversible: the previous observation is recovered from the stored
//! hash alone.

use base64::Engine as _;

use dirsync_connector::entry::DirectoryEntry;

use crate::error::{SyncError, SyncResult};

/// Hash of a filtered entry set.
pub fn snapshot_hash(entries: &[DirectoryEntry]) -> String {
    base64::engine::general_purpose::STANDARD.encode(snapshot_json(entries))
}

/// Hash of the empty entry set, used when nothing has been persisted yet.
pub fn empty_snapshot_hash() -> String {
    snapshot_hash(&[])
}

/// Recover the entry set a hash was computed from.
pub fn decode_snapshot(hash: &str) -> SyncResult<Vec<DirectoryEntry>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(hash.trim())
        .map_err(|e| SyncError::snapshot(format!("invalid base64: {e}")))?;

    let text = String::from_utf8(bytes)
        .map_err(|e| SyncError::snapshot(format!("invalid UTF-8: {e}")))?;

    serde_json::from_str(&text).map_err(|e| SyncError::snapshot(format!("invalid JSON: {e}")))
}

fn snapshot_json(entries: &[DirectoryEntry]) -> String {
    let items: Vec<String> = entries.iter().map(DirectoryEntry::serialized).collect();
    format!("[{}]", items.join(","))
}
