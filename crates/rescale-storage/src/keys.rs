//! Shared key derivation for the pipeline.
//!
//! Output key format: `<dir with staging segment replaced by output segment>/<timestamp>_<name>`,
//! where the timestamp is ISO-8601 UTC with millisecond precision. Timestamps sort
//! lexicographically, so listing the output directory yields upload order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::traits::{StorageError, StorageResult};

/// Reject keys that could escape a bucket or a scratch root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid path segments: {}",
            key
        )));
    }
    Ok(())
}

/// Derive the key the processed artifact is written to.
///
/// The original must live directly inside `staging_dir`; that segment is swapped
/// for `output_dir` and the file name is prefixed with `now`.
pub fn scaled_object_key(
    original_key: &str,
    staging_dir: &str,
    output_dir: &str,
    now: DateTime<Utc>,
) -> StorageResult<String> {
    validate_key(original_key)?;

    let (dir, file_name) = match original_key.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", original_key),
    };
    if file_name.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "Storage key has no file name: {}",
            original_key
        )));
    }

    let parent = match dir.rsplit_once('/') {
        Some((parent, last)) if last == staging_dir => Some(parent),
        None if dir == staging_dir => None,
        _ => {
            return Err(StorageError::InvalidKey(format!(
                "Storage key is not inside a '{}' directory: {}",
                staging_dir, original_key
            )))
        }
    };

    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    Ok(match parent {
        Some(parent) => format!("{}/{}/{}_{}", parent, output_dir, timestamp, file_name),
        None => format!("{}/{}_{}", output_dir, timestamp, file_name),
    })
}
