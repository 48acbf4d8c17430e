//! Mount specification parsing.
//!
//! Devcontainer `mounts` entries may be a `key=value,...` string (the
//! container-runtime mount syntax) or a structured object. Both forms
//! normalize to [`MountSpec`], which knows how to render itself as a
//! `docker run --mount` argument.

use crate::errors::{PacknplayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    Bind,
    Volume,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    pub mount_type: MountType,
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

impl MountSpec {
    pub fn bind(source: impl Into<String>, target: impl Into<String>, read_only: bool) -> Self {
        Self {
            mount_type: MountType::Bind,
            source: source.into(),
            target: target.into(),
            read_only,
        }
    }

    /// Renders as a `docker run --mount <value>` argument value.
    pub fn to_docker_arg(&self) -> String {
        let type_str = match self.mount_type {
            MountType::Bind => "bind",
            MountType::Volume => "volume",
        };
        let mut parts = vec![
            format!("type={type_str}"),
            format!("source={}", self.source),
            format!("target={}", self.target),
        ];
        if self.read_only {
            parts.push("readonly".to_string());
        }
        parts.join(",")
    }
}

/// Parses one devcontainer `mounts` entry, either the `key=value,...`
/// string form or a structured JSON object form.
pub fn parse_mount(value: &Value) -> Result<MountSpec> {
    match value {
        Value::String(s) => parse_mount_string(s),
        Value::Object(map) => {
            let mount_type = match map.get("type").and_then(Value::as_str) {
                Some("volume") => MountType::Volume,
                _ => MountType::Bind,
            };
            let source = map
                .get("source")
                .and_then(Value::as_str)
                .ok_or_else(|| PacknplayError::runtime("mount object missing 'source'"))?
                .to_string();
            let target = map
                .get("target")
                .and_then(Value::as_str)
                .ok_or_else(|| PacknplayError::runtime("mount object missing 'target'"))?
                .to_string();
            let read_only = map
                .get("readonly")
                .or_else(|| map.get("readOnly"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(MountSpec {
                mount_type,
                source,
                target,
                read_only,
            })
        }
        other => Err(PacknplayError::runtime(format!(
            "unsupported mount entry: {other}"
        ))),
    }
}

fn parse_mount_string(raw: &str) -> Result<MountSpec> {
    let mut mount_type = MountType::Bind;
    let mut source = None;
    let mut target = None;
    let mut read_only = false;

    for part in raw.split(',') {
        let part = part.trim();
        if part == "readonly" || part == "ro" {
            read_only = true;
            continue;
        }
        if let Some((key, value)) = part.split_once('=') {
            match key.trim() {
                "type" => {
                    mount_type = match value {
                        "volume" => MountType::Volume,
                        _ => MountType::Bind,
                    }
                }
                "source" | "src" => source = Some(value.to_string()),
                "target" | "dst" | "destination" => target = Some(value.to_string()),
                "readonly" | "ro" => read_only = value != "false",
                _ => {}
            }
        }
    }

    Ok(MountSpec {
        mount_type,
        source: source
            .ok_or_else(|| PacknplayError::runtime(format!("mount string missing source: {raw}")))?,
        target: target
            .ok_or_else(|| PacknplayError::runtime(format!("mount string missing target: {raw}")))?,
        read_only,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_key_value_string() {
        let spec = parse_mount(&json!(
            "type=bind,source=/host/path,target=/container/path,readonly"
        ))
        .unwrap();
        assert_eq!(spec.mount_type, MountType::Bind);
        assert_eq!(spec.source, "/host/path");
        assert_eq!(spec.target, "/container/path");
        assert!(spec.read_only);
    }

    #[test]
    fn parses_object_form() {
        let spec = parse_mount(&json!({
            "source": "/host",
            "target": "/container",
            "type": "volume"
        }))
        .unwrap();
        assert_eq!(spec.mount_type, MountType::Volume);
        assert!(!spec.read_only);
    }

    #[test]
    fn to_docker_arg_formats_correctly() {
        let spec = MountSpec::bind("/a", "/b", true);
        assert_eq!(spec.to_docker_arg(), "type=bind,source=/a,target=/b,readonly");
    }

    #[test]
    fn missing_target_errors() {
        assert!(parse_mount(&json!("type=bind,source=/a")).is_err());
    }
}
