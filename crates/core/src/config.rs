//! Devcontainer config loader.
//!
//! Reads `<project>/.devcontainer/devcontainer.json` (falling back to
//! `<project>/.devcontainer.json`), tolerating JSON-with-comments via
//! `json5`. Exposes a typed view plus the retained raw JSON object, so
//! `save_config(load_config(path))` round-trips unknown fields.

use crate::errors::{ConfigError, Result};
use crate::variable::SubstitutionContext;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevContainerConfig {
    pub name: Option<String>,
    pub image: Option<String>,
    #[serde(rename = "dockerFile")]
    pub dockerfile: Option<String>,
    pub build: Option<Value>,
    pub docker_compose_file: Option<Value>,
    pub service: Option<String>,
    #[serde(default)]
    pub run_services: Vec<String>,
    #[serde(default)]
    pub features: IndexMap<String, HashMap<String, Value>>,
    pub customizations: Option<Value>,
    pub workspace_folder: Option<String>,
    pub workspace_mount: Option<String>,
    #[serde(default)]
    pub mounts: Vec<Value>,
    #[serde(default)]
    pub container_env: HashMap<String, String>,
    #[serde(default)]
    pub remote_env: HashMap<String, Option<String>>,
    pub remote_user: Option<String>,
    pub container_user: Option<String>,
    #[serde(default)]
    pub forward_ports: Vec<Value>,
    #[serde(default)]
    pub app_port: Option<Value>,
    #[serde(default)]
    pub run_args: Vec<String>,
    pub shutdown_action: Option<String>,
    #[serde(default)]
    pub override_command: Option<bool>,
    pub wait_for: Option<String>,
    pub user_env_probe: Option<String>,
    pub host_requirements: Option<crate::host_requirements::HostRequirements>,
    pub initialize_command: Option<Value>,
    pub on_create_command: Option<Value>,
    pub update_content_command: Option<Value>,
    pub post_create_command: Option<Value>,
    pub post_start_command: Option<Value>,
    pub post_attach_command: Option<Value>,
}

/// A loaded config: the typed view plus the raw JSON object, for
/// round-trip preservation of fields this build doesn't model.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub typed: DevContainerConfig,
    pub raw: Value,
    pub source_path: PathBuf,
}

impl DevContainerConfig {
    /// Validates the at-most-one-of invariant over `{image, dockerFile,
    /// dockerComposeFile}` and the `shutdownAction` enum.
    pub fn validate(&self) -> Result<()> {
        let sources = [
            self.image.is_some(),
            self.dockerfile.is_some(),
            self.docker_compose_file.is_some(),
        ];
        if sources.iter().filter(|s| **s).count() > 1 {
            return Err(ConfigError::Validation {
                message: "at most one of 'image', 'dockerFile', 'dockerComposeFile' may be set"
                    .to_string(),
            }
            .into());
        }

        if let Some(action) = &self.shutdown_action {
            if !["none", "stopContainer", "stopCompose"].contains(&action.as_str()) {
                return Err(ConfigError::Validation {
                    message: format!("invalid shutdownAction: {action}"),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Normalizes `dockerComposeFile` (string or array) to an ordered list.
    pub fn compose_files(&self) -> Vec<String> {
        match &self.docker_compose_file {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn uses_compose(&self) -> bool {
        !self.compose_files().is_empty()
    }

    /// True when features are present or a dockerfile/build is declared:
    /// the image manager's build-vs-pull decision rule (§4.9).
    pub fn requires_build(&self) -> bool {
        !self.features.is_empty() || self.dockerfile.is_some() || self.build.is_some()
    }

    /// `build.args` from the devcontainer spec's build object, if present,
    /// as plain string key/value pairs ready for `--build-arg`. Non-string
    /// values are rendered via their JSON text form.
    pub fn build_args(&self) -> HashMap<String, String> {
        let Some(build) = &self.build else {
            return HashMap::new();
        };
        let Some(args) = build.get("args").and_then(Value::as_object) else {
            return HashMap::new();
        };
        args.iter()
            .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
            .collect()
    }

    pub fn resolved_workspace_folder(&self, project_basename: &str) -> String {
        self.workspace_folder
            .clone()
            .unwrap_or_else(|| format!("/workspaces/{project_basename}"))
    }

    /// Two-pass environment resolution per §4.4: `containerEnv` is
    /// substituted first and recorded in the context; `remoteEnv` is then
    /// substituted against the augmented context. An empty `remoteEnv`
    /// value is a deletion (absent from the result).
    pub fn resolve_environment(
        &self,
        ctx: &SubstitutionContext,
    ) -> (HashMap<String, String>, HashMap<String, String>) {
        let container_env = crate::variable::substitute_map(&self.container_env, ctx);
        let augmented_ctx = ctx.clone().with_container_env(container_env.clone());

        let mut remote_env = HashMap::new();
        for (key, value) in &self.remote_env {
            match value {
                Some(v) if !v.is_empty() => {
                    remote_env.insert(key.clone(), crate::variable::substitute(v, &augmented_ctx));
                }
                Some(_) => {
                    // empty value: deletion, omit from the result
                }
                None => {
                    remote_env.insert(key.clone(), String::new());
                }
            }
        }

        (container_env, remote_env)
    }
}

fn candidate_paths(project_path: &Path) -> [PathBuf; 2] {
    [
        project_path.join(".devcontainer").join("devcontainer.json"),
        project_path.join(".devcontainer.json"),
    ]
}

/// Locates the devcontainer config file for a project, preferring the
/// nested `.devcontainer/devcontainer.json` form. Returns `Ok(None)` (a
/// sentinel "not present") rather than an error when neither exists.
pub fn discover_config(project_path: &Path) -> Option<PathBuf> {
    candidate_paths(project_path)
        .into_iter()
        .find(|p| p.exists())
}

/// Loads and validates a devcontainer config, tolerating comments and
/// trailing commas (JSONC via `json5`).
pub fn load_from_path(path: &Path) -> Result<ResolvedConfig> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    let raw: Value = json5::from_str(&content).map_err(|e| ConfigError::Parsing {
        message: format!("{}: {e}", path.display()),
    })?;

    log_unknown_keys(&raw);

    let typed: DevContainerConfig =
        serde_json::from_value(raw.clone()).map_err(|e| ConfigError::Parsing {
            message: format!("{}: {e}", path.display()),
        })?;
    typed.validate()?;

    Ok(ResolvedConfig {
        typed,
        raw,
        source_path: path.to_path_buf(),
    })
}

const KNOWN_KEYS: &[&str] = &[
    "name",
    "image",
    "dockerFile",
    "build",
    "dockerComposeFile",
    "service",
    "runServices",
    "features",
    "customizations",
    "workspaceFolder",
    "workspaceMount",
    "mounts",
    "containerEnv",
    "remoteEnv",
    "remoteUser",
    "containerUser",
    "forwardPorts",
    "appPort",
    "runArgs",
    "shutdownAction",
    "overrideCommand",
    "waitFor",
    "userEnvProbe",
    "hostRequirements",
    "initializeCommand",
    "onCreateCommand",
    "updateContentCommand",
    "postCreateCommand",
    "postStartCommand",
    "postAttachCommand",
];

fn log_unknown_keys(raw: &Value) {
    if let Value::Object(map) = raw {
        for key in map.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                debug!(key, "unrecognized devcontainer config key, preserved verbatim");
            }
        }
    }
}

/// Merges a typed value back into a retained raw map, preserving every
/// field the typed view doesn't model. Shared between the devcontainer
/// config loader and the CLI's own persisted config.
pub fn merge_raw(raw: &mut Value, typed_value: Value) {
    if let (Value::Object(raw_map), Value::Object(typed_map)) = (raw, typed_value) {
        for (key, value) in typed_map {
            if !value.is_null() {
                raw_map.insert(key, value);
            }
        }
    }
}

/// Merges a typed edit back into the retained raw map and serializes it,
/// preserving every field the typed view doesn't model.
pub fn save_config(resolved: &ResolvedConfig) -> Result<()> {
    let mut raw = resolved.raw.clone();
    let typed_value = serde_json::to_value(&resolved.typed).map_err(|e| ConfigError::Validation {
        message: format!("serializing config: {e}"),
    })?;
    merge_raw(&mut raw, typed_value);
    let content = serde_json::to_string_pretty(&raw).map_err(|e| ConfigError::Validation {
        message: format!("serializing config: {e}"),
    })?;
    std::fs::write(&resolved.source_path, content).map_err(ConfigError::Io)?;
    Ok(())
}

/// Synthesizes a minimal config from a configured default image, used when
/// no devcontainer.json is present.
pub fn synthesize_default(default_image: &str) -> DevContainerConfig {
    warn!(image = default_image, "no devcontainer config found; synthesizing default");
    DevContainerConfig {
        image: Some(default_image.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_prefers_nested_form() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".devcontainer")).unwrap();
        std::fs::write(
            dir.path().join(".devcontainer").join("devcontainer.json"),
            "{}",
        )
        .unwrap();
        std::fs::write(dir.path().join(".devcontainer.json"), "{}").unwrap();
        let found = discover_config(dir.path()).unwrap();
        assert!(found.ends_with(".devcontainer/devcontainer.json"));
    }

    #[test]
    fn discover_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).is_none());
    }

    #[test]
    fn loads_jsonc_with_comments_and_trailing_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devcontainer.json");
        std::fs::write(
            &path,
            r#"{
                // a comment
                "image": "ubuntu:22.04",
            }"#,
        )
        .unwrap();
        let resolved = load_from_path(&path).unwrap();
        assert_eq!(resolved.typed.image.as_deref(), Some("ubuntu:22.04"));
    }

    #[test]
    fn rejects_more_than_one_source() {
        let config = DevContainerConfig {
            image: Some("ubuntu".to_string()),
            dockerfile: Some("Dockerfile".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn requires_build_when_features_present() {
        let mut config = DevContainerConfig {
            image: Some("ubuntu".to_string()),
            ..Default::default()
        };
        config
            .features
            .insert("ghcr.io/a/b".to_string(), HashMap::new());
        assert!(config.requires_build());
    }

    #[test]
    fn empty_remote_env_value_is_a_deletion() {
        let mut config = DevContainerConfig::default();
        config
            .remote_env
            .insert("REMOVE_ME".to_string(), Some(String::new()));
        config
            .remote_env
            .insert("KEEP_ME".to_string(), Some("value".to_string()));
        let ctx = SubstitutionContext::new(PathBuf::from("/tmp/proj"), PathBuf::from("/workspaces/proj"));
        let (_container_env, remote_env) = config.resolve_environment(&ctx);
        assert!(!remote_env.contains_key("REMOVE_ME"));
        assert_eq!(remote_env.get("KEEP_ME").map(String::as_str), Some("value"));
    }

    #[test]
    fn save_config_preserves_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devcontainer.json");
        std::fs::write(
            &path,
            r#"{"image": "ubuntu:22.04", "someFutureField": {"nested": true}}"#,
        )
        .unwrap();
        let mut resolved = load_from_path(&path).unwrap();
        resolved.typed.remote_user = Some("vscode".to_string());
        save_config(&resolved).unwrap();

        let reloaded = load_from_path(&path).unwrap();
        assert_eq!(reloaded.typed.remote_user.as_deref(), Some("vscode"));
        assert_eq!(
            reloaded.raw.get("someFutureField").and_then(|v| v.get("nested")),
            Some(&Value::Bool(true))
        );
    }
}
