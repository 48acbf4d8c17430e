//! Background update check for the default image's registry digest.
//!
//! Runs at most once per `frequency` (default 24h), recording the
//! last-seen digest in `version-tracking.json` so a repeated notification
//! isn't shown for a digest the user has already been told about.

use crate::cache::{read_json, write_json_atomic};
use crate::errors::Result;
use crate::registry_parser::parse_registry_reference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub const DEFAULT_FREQUENCY_SECS: u64 = 24 * 60 * 60;
const TRACKING_FILE: &str = "version-tracking.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VersionTracking {
    #[serde(default)]
    entries: std::collections::HashMap<String, TrackedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrackedEntry {
    last_checked_unix: u64,
    last_seen_digest: Option<String>,
}

fn tracking_path(state_dir: &Path) -> PathBuf {
    state_dir.join(TRACKING_FILE)
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Outcome of a check: `Some(digest)` when a new digest was observed and
/// should be surfaced to the user, `None` when nothing changed or the
/// frequency window hasn't elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotification {
    pub image: String,
    pub digest: String,
}

/// Checks whether `image`'s registry digest has moved since the last
/// recorded check, respecting `frequency_secs` as a minimum interval
/// between network calls. Consults `oci_client` only when the window has
/// elapsed; always returns `Ok(None)` on any resolution failure rather
/// than surfacing network errors up the launch path.
pub async fn check_for_update(
    state_dir: &Path,
    image: &str,
    frequency_secs: u64,
) -> Result<Option<UpdateNotification>> {
    let path = tracking_path(state_dir);
    let mut tracking: VersionTracking = read_json(&path)?.unwrap_or_default();
    let now = now_unix();

    if let Some(entry) = tracking.entries.get(image) {
        if now.saturating_sub(entry.last_checked_unix) < frequency_secs {
            debug!(image, "update check skipped, within frequency window");
            return Ok(None);
        }
    }

    let digest = match resolve_digest(image).await {
        Ok(d) => d,
        Err(e) => {
            debug!(image, error = %e, "update check digest resolution failed");
            return Ok(None);
        }
    };

    let previous = tracking.entries.get(image).and_then(|e| e.last_seen_digest.clone());
    tracking.entries.insert(
        image.to_string(),
        TrackedEntry {
            last_checked_unix: now,
            last_seen_digest: Some(digest.clone()),
        },
    );
    write_json_atomic(&path, &tracking)?;

    match previous {
        Some(prev) if prev == digest => Ok(None),
        None => Ok(None), // first observation establishes a baseline, not a notification
        Some(_) => {
            info!(image, digest = %digest, "new image digest observed");
            Ok(Some(UpdateNotification {
                image: image.to_string(),
                digest,
            }))
        }
    }
}

async fn resolve_digest(image: &str) -> Result<String> {
    let oci_ref = parse_registry_reference(image)?;
    let client = crate::oci::OciClient::new();
    crate::retry::retry(crate::retry::RetryPolicy::default(), || async {
        client.fetch_manifest(&oci_ref).await.map_err(|e| e.to_string())
    })
    .await
    .map(|manifest| manifest.config.digest)
    .map_err(crate::errors::PacknplayError::runtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_observation_establishes_baseline_without_notifying() {
        let dir = tempfile::tempdir().unwrap();
        let path = tracking_path(dir.path());
        let mut tracking = VersionTracking::default();
        tracking.entries.insert(
            "ghcr.io/x/y:latest".to_string(),
            TrackedEntry {
                last_checked_unix: 0,
                last_seen_digest: None,
            },
        );
        write_json_atomic(&path, &tracking).unwrap();
        // Without a live registry the resolve will fail and the check should no-op rather than error.
        let result = check_for_update(dir.path(), "ghcr.io/x/y:latest", DEFAULT_FREQUENCY_SECS).await;
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn tracking_path_is_under_state_dir() {
        let path = tracking_path(Path::new("/tmp/state"));
        assert_eq!(path, PathBuf::from("/tmp/state/version-tracking.json"));
    }
}
