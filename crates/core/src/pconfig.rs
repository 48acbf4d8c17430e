//! Persisted CLI configuration (not the devcontainer config, see
//! [`crate::config`]): container runtime preference, default image,
//! default enabled credential categories, and default environment
//! variables, optionally profiled by a named environment.
//!
//! Uses the same typed-view-plus-retained-raw technique as the
//! devcontainer loader (`config::merge_raw`) so a config file hand-edited
//! with fields this version of packnplay doesn't model round-trips
//! untouched.

use crate::config::merge_raw;
use crate::credentials::CredentialCategory;
use crate::errors::{ConfigError, PacknplayError, Result};
use crate::state;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PacknplayConfig {
    pub container_runtime: Option<String>,
    /// Superseded by `default_container.image`; still read for back-compat.
    pub default_image: Option<String>,
    pub default_container: Option<DefaultContainerConfig>,
    #[serde(default)]
    pub default_credentials: DefaultCredentials,
    /// Host environment variable names forwarded into every launched
    /// container, in addition to whatever a selected profile adds.
    #[serde(default)]
    pub default_env_vars: Vec<String>,
    #[serde(default)]
    pub env_configs: HashMap<String, EnvProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefaultContainerConfig {
    pub image: Option<String>,
    pub check_for_updates: Option<bool>,
    pub auto_pull_updates: Option<bool>,
    pub check_frequency_hours: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DefaultCredentials {
    #[serde(default)]
    pub git: bool,
    #[serde(default)]
    pub ssh: bool,
    #[serde(default)]
    pub gh: bool,
    #[serde(default)]
    pub gpg: bool,
    #[serde(default)]
    pub npm: bool,
    #[serde(default)]
    pub aws: bool,
}

impl DefaultCredentials {
    pub fn enabled_categories(&self) -> Vec<CredentialCategory> {
        let mut categories = Vec::new();
        if self.git {
            categories.push(CredentialCategory::Git);
        }
        if self.ssh {
            categories.push(CredentialCategory::Ssh);
        }
        if self.gh {
            categories.push(CredentialCategory::Gh);
        }
        if self.gpg {
            categories.push(CredentialCategory::Gpg);
        }
        if self.npm {
            categories.push(CredentialCategory::Npm);
        }
        if self.aws {
            categories.push(CredentialCategory::Aws);
        }
        categories
    }
}

/// A named environment profile, selected with `--config <profile>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvProfile {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedPacknplayConfig {
    pub typed: PacknplayConfig,
    pub raw: Value,
    pub source_path: PathBuf,
}

impl PacknplayConfig {
    /// The default image to launch when no devcontainer config is present,
    /// preferring `default_container.image` over the legacy `default_image`.
    pub fn default_image(&self) -> Option<&str> {
        self.default_container
            .as_ref()
            .and_then(|c| c.image.as_deref())
            .or(self.default_image.as_deref())
    }
}

fn config_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE)
}

/// Loads the persisted config, defaulting to an empty config when no file
/// exists yet rather than treating that as an error (first-run setup).
pub fn load(config_dir: &Path) -> Result<ResolvedPacknplayConfig> {
    let path = config_path(config_dir);
    if !path.exists() {
        return Ok(ResolvedPacknplayConfig {
            typed: PacknplayConfig::default(),
            raw: Value::Object(serde_json::Map::new()),
            source_path: path,
        });
    }
    let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let raw: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Parsing { message: e.to_string() })?;
    let typed: PacknplayConfig =
        serde_json::from_value(raw.clone()).map_err(|e| ConfigError::Parsing { message: e.to_string() })?;
    Ok(ResolvedPacknplayConfig { typed, raw, source_path: path })
}

pub fn load_default() -> Result<ResolvedPacknplayConfig> {
    load(&state::config_dir())
}

/// Merges the typed view back into the retained raw map and writes it,
/// preserving fields this version doesn't model.
pub fn save(resolved: &ResolvedPacknplayConfig) -> Result<()> {
    if let Some(parent) = resolved.source_path.parent() {
        std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
    }
    let mut raw = resolved.raw.clone();
    let typed_value = serde_json::to_value(&resolved.typed)
        .map_err(|e| PacknplayError::runtime(format!("serializing packnplay config: {e}")))?;
    merge_raw(&mut raw, typed_value);
    let content = serde_json::to_string_pretty(&raw)
        .map_err(|e| PacknplayError::runtime(format!("serializing packnplay config: {e}")))?;
    std::fs::write(&resolved.source_path, content).map_err(ConfigError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load(dir.path()).unwrap();
        assert_eq!(resolved.typed, PacknplayConfig::default());
    }

    #[test]
    fn save_then_load_round_trips_and_preserves_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"containerRuntime":"docker","someFutureField":"keep-me"}"#,
        )
        .unwrap();
        let mut resolved = load(dir.path()).unwrap();
        resolved.typed.default_container =
            Some(DefaultContainerConfig { image: Some("ubuntu:24.04".to_string()), ..Default::default() });
        save(&resolved).unwrap();

        let reloaded = load(dir.path()).unwrap();
        assert_eq!(reloaded.typed.default_image(), Some("ubuntu:24.04"));
        assert_eq!(reloaded.raw.get("someFutureField").and_then(|v| v.as_str()), Some("keep-me"));
    }

    #[test]
    fn default_image_prefers_default_container_over_legacy_field() {
        let config = PacknplayConfig {
            default_image: Some("legacy:tag".to_string()),
            default_container: Some(DefaultContainerConfig { image: Some("new:tag".to_string()), ..Default::default() }),
            ..Default::default()
        };
        assert_eq!(config.default_image(), Some("new:tag"));
    }

    #[test]
    fn legacy_default_image_used_when_no_default_container() {
        let config = PacknplayConfig { default_image: Some("legacy:tag".to_string()), ..Default::default() };
        assert_eq!(config.default_image(), Some("legacy:tag"));
    }

    #[test]
    fn enabled_categories_reflects_only_set_flags() {
        let creds = DefaultCredentials { git: true, aws: true, ..Default::default() };
        assert_eq!(creds.enabled_categories(), vec![CredentialCategory::Git, CredentialCategory::Aws]);
    }
}
