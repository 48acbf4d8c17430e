//! Content-addressed and keyed disk caching.
//!
//! The feature resolver materializes features under
//! `<cache_dir>/features/<digest>/`, append-only and content-addressed:
//! concurrent writers of the same digest collide harmlessly because the
//! payload is byte-identical. The user detector and update checker use
//! [`write_json_atomic`] for single-file caches, keyed by a digest of their
//! own inputs.
//!
//! Writes throughout this module use write-then-rename so a reader never
//! observes a partially-written file, which is the only coordination this
//! crate needs across concurrent invocations.

use crate::errors::{PacknplayError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Returns the lowercase hex sha256 digest of `input`.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The content-addressed directory a materialized feature should live in.
pub fn feature_cache_dir(cache_dir: &Path, digest: &str) -> PathBuf {
    cache_dir.join("features").join(digest)
}

/// True when the feature's cache entry already exists and contains the
/// marker metadata file.
pub fn feature_cached(cache_dir: &Path, digest: &str) -> bool {
    feature_cache_dir(cache_dir, digest)
        .join("devcontainer-feature.json")
        .exists()
}

/// Reads and deserializes a JSON cache file. Returns `Ok(None)` if absent,
/// rather than treating a cache miss as an error.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| PacknplayError::runtime(format!("reading cache file {}: {e}", path.display())))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| PacknplayError::runtime(format!("parsing cache file {}: {e}", path.display())))?;
    Ok(Some(value))
}

/// Serializes `value` and writes it to `path` atomically (write to a
/// sibling `.tmp` file, then rename).
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| PacknplayError::runtime(format!("creating cache dir: {e}")))?;
    }
    let tmp_path = path.with_extension("tmp");
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| PacknplayError::runtime(format!("serializing cache value: {e}")))?;
    std::fs::write(&tmp_path, content)
        .map_err(|e| PacknplayError::runtime(format!("writing cache tmp file: {e}")))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| PacknplayError::runtime(format!("renaming cache tmp file: {e}")))?;
    debug!(path = %path.display(), "wrote cache file atomically");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        write_json_atomic(&path, &Sample { value: 7 }).unwrap();
        let read: Option<Sample> = read_json(&path).unwrap();
        assert_eq!(read, Some(Sample { value: 7 }));
    }

    #[test]
    fn read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let read: Option<Sample> = read_json(&path).unwrap();
        assert_eq!(read, None);
    }

    #[test]
    fn sha256_hex_is_deterministic() {
        assert_eq!(sha256_hex("abc"), sha256_hex("abc"));
        assert_ne!(sha256_hex("abc"), sha256_hex("abd"));
    }
}
