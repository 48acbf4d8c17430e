//! `devcontainer-lock.json` loader.
//!
//! Pins feature resolution: `features: { ref -> {version, resolved} }`.
//! Consulted (but not required) by the feature resolver.

use crate::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockedFeature {
    pub version: Option<String>,
    pub resolved: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub features: HashMap<String, LockedFeature>,
}

pub const LOCKFILE_NAME: &str = "devcontainer-lock.json";

/// Loads `devcontainer-lock.json` next to the devcontainer config, if
/// present. Absence is not an error: lock policy is advisory.
pub fn load(devcontainer_dir: &Path) -> Result<Option<Lockfile>> {
    let path = devcontainer_dir.join(LOCKFILE_NAME);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let lockfile: Lockfile =
        serde_json::from_str(&content).map_err(|e| ConfigError::Parsing {
            message: format!("{}: {e}", path.display()),
        })?;
    Ok(Some(lockfile))
}

/// Writes a resolved lockfile back to disk.
pub fn save(devcontainer_dir: &Path, lockfile: &Lockfile) -> Result<()> {
    let path = devcontainer_dir.join(LOCKFILE_NAME);
    let content = serde_json::to_string_pretty(lockfile).map_err(|e| ConfigError::Validation {
        message: format!("serializing lockfile: {e}"),
    })?;
    std::fs::write(&path, content).map_err(ConfigError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut lockfile = Lockfile::default();
        lockfile.features.insert(
            "ghcr.io/devcontainers/features/node".to_string(),
            LockedFeature {
                version: Some("1.2.3".to_string()),
                resolved: Some("ghcr.io/devcontainers/features/node@sha256:abc".to_string()),
            },
        );
        save(dir.path(), &lockfile).unwrap();
        let loaded = load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, lockfile);
    }
}
