//! Feature metadata: `devcontainer-feature.json`.
//!
//! A feature is a named, versioned package of installation logic composed
//! onto a base image. This module parses and validates its metadata; see
//! `feature_resolver` for fetching, ordering, and merging.

use crate::errors::{FeatureError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// A feature option value, as it appears in either `options` defaults or a
/// user-supplied options object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    String(String),
    Number(f64),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_env_string(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::String(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeatureOption {
    Boolean {
        default: Option<bool>,
        description: Option<String>,
    },
    String {
        default: Option<String>,
        description: Option<String>,
        #[serde(rename = "enum", default)]
        enum_values: Vec<String>,
        #[serde(default)]
        proposals: Vec<String>,
    },
}

impl FeatureOption {
    pub fn default_value(&self) -> Option<OptionValue> {
        match self {
            Self::Boolean { default, .. } => default.map(OptionValue::Boolean),
            Self::String { default, .. } => default.clone().map(OptionValue::String),
        }
    }

    /// For `enum` options, rejects unknown values. For `proposals`, unknown
    /// values are accepted (they're suggestions, not a closed set).
    pub fn validate_value(&self, value: &OptionValue) -> Result<()> {
        if let Self::String { enum_values, .. } = self {
            if !enum_values.is_empty() {
                if let Some(s) = value.as_str() {
                    if !enum_values.iter().any(|e| e == s) {
                        return Err(FeatureError::Validation {
                            message: format!(
                                "value '{s}' is not one of the allowed enum values: {enum_values:?}"
                            ),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }
}

/// `dependsOn` tolerates either the legacy list-of-refs form (no options)
/// or the current map-of-ref-to-options form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DependsOn(pub HashMap<String, HashMap<String, Value>>);

impl<'de> Deserialize<'de> for DependsOn {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let map = match raw {
            Value::Array(refs) => refs
                .into_iter()
                .filter_map(|v| v.as_str().map(|s| (s.to_string(), HashMap::new())))
                .collect(),
            Value::Object(obj) => obj
                .into_iter()
                .map(|(k, v)| {
                    let opts = match v {
                        Value::Object(o) => o.into_iter().collect(),
                        _ => HashMap::new(),
                    };
                    (k, opts)
                })
                .collect(),
            Value::Null => HashMap::new(),
            _ => HashMap::new(),
        };
        Ok(DependsOn(map))
    }
}

/// `entrypoint` tolerates either a bare string or an argv list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entrypoint(pub Option<String>);

impl<'de> Deserialize<'de> for Entrypoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let resolved = match raw {
            Value::String(s) => Some(s),
            Value::Array(items) => Some(shell_words::join(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string)),
            )),
            _ => None,
        };
        Ok(Entrypoint(resolved))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMetadata {
    pub id: String,
    pub version: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, FeatureOption>,
    #[serde(default)]
    pub container_env: HashMap<String, String>,
    #[serde(default)]
    pub mounts: Vec<String>,
    pub init: Option<bool>,
    pub privileged: Option<bool>,
    #[serde(default)]
    pub cap_add: Vec<String>,
    #[serde(default)]
    pub security_opt: Vec<String>,
    #[serde(default)]
    pub entrypoint: Entrypoint,
    #[serde(default)]
    pub installs_after: Vec<String>,
    #[serde(default)]
    pub depends_on: DependsOn,
    #[serde(default)]
    pub legacy_ids: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    pub on_create_command: Option<Value>,
    pub update_content_command: Option<Value>,
    pub post_create_command: Option<Value>,
    pub post_start_command: Option<Value>,
    pub post_attach_command: Option<Value>,
}

impl FeatureMetadata {
    pub fn has_lifecycle_commands(&self) -> bool {
        self.on_create_command.is_some()
            || self.update_content_command.is_some()
            || self.post_create_command.is_some()
            || self.post_start_command.is_some()
            || self.post_attach_command.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(FeatureError::Validation {
                message: "feature metadata is missing 'id'".to_string(),
            }
            .into());
        }
        for (name, option) in &self.options {
            if let Some(default) = option.default_value() {
                option.validate_value(&default).map_err(|e| {
                    FeatureError::Validation {
                        message: format!("option '{name}' has invalid default: {e}"),
                    }
                })?;
            }
        }
        Ok(())
    }
}

/// Reads and validates `devcontainer-feature.json` at `path`.
pub fn parse_feature_metadata(path: &Path) -> Result<FeatureMetadata> {
    let content = std::fs::read_to_string(path).map_err(FeatureError::Io)?;
    let metadata: FeatureMetadata =
        serde_json::from_str(&content).map_err(|e| FeatureError::Parsing {
            message: format!("{}: {e}", path.display()),
        })?;
    metadata.validate()?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depends_on_accepts_legacy_list() {
        let json = r#"{"id":"node","dependsOn":["ghcr.io/devcontainers/features/common-utils"]}"#;
        let meta: FeatureMetadata = serde_json::from_str(json).unwrap();
        assert!(meta
            .depends_on
            .0
            .contains_key("ghcr.io/devcontainers/features/common-utils"));
    }

    #[test]
    fn depends_on_accepts_map_form() {
        let json = r#"{"id":"node","dependsOn":{"ghcr.io/x/y":{"version":"1"}}}"#;
        let meta: FeatureMetadata = serde_json::from_str(json).unwrap();
        let opts = meta.depends_on.0.get("ghcr.io/x/y").unwrap();
        assert_eq!(opts.get("version").unwrap().as_str(), Some("1"));
    }

    #[test]
    fn entrypoint_accepts_string_or_list() {
        let as_string: FeatureMetadata =
            serde_json::from_str(r#"{"id":"a","entrypoint":"/bin/sh"}"#).unwrap();
        assert_eq!(as_string.entrypoint.0.as_deref(), Some("/bin/sh"));

        let as_list: FeatureMetadata =
            serde_json::from_str(r#"{"id":"a","entrypoint":["/bin/sh","-c"]}"#).unwrap();
        assert_eq!(as_list.entrypoint.0.as_deref(), Some("/bin/sh -c"));
    }

    #[test]
    fn validate_rejects_missing_id() {
        let meta = FeatureMetadata::default();
        assert!(meta.validate().is_err());
    }

    #[test]
    fn enum_option_rejects_unknown_value() {
        let option = FeatureOption::String {
            default: Some("a".to_string()),
            description: None,
            enum_values: vec!["a".to_string(), "b".to_string()],
            proposals: vec![],
        };
        assert!(option
            .validate_value(&OptionValue::String("c".to_string()))
            .is_err());
        assert!(option
            .validate_value(&OptionValue::String("b".to_string()))
            .is_ok());
    }

    #[test]
    fn proposals_option_accepts_unknown_value() {
        let option = FeatureOption::String {
            default: Some("a".to_string()),
            description: None,
            enum_values: vec![],
            proposals: vec!["a".to_string()],
        };
        assert!(option
            .validate_value(&OptionValue::String("anything".to_string()))
            .is_ok());
    }
}
