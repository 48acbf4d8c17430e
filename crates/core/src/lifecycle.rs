//! Lifecycle command normalization.
//!
//! A devcontainer lifecycle command field may be a string (run in a shell),
//! an ordered list of argv tokens, or a mapping from step name to either
//! form. Every variant normalizes to an ordered sequence of shell commands.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The named lifecycle hooks, in the order they execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecyclePhase {
    Initialize,
    OnCreate,
    UpdateContent,
    PostCreate,
    PostStart,
    PostAttach,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::OnCreate => "onCreate",
            Self::UpdateContent => "updateContent",
            Self::PostCreate => "postCreate",
            Self::PostStart => "postStart",
            Self::PostAttach => "postAttach",
        }
    }
}

/// One normalized shell command, optionally labeled with the step name it
/// came from (when the source was a map).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCommand {
    pub label: Option<String>,
    pub shell_command: String,
}

/// Normalizes a raw `serde_json::Value` lifecycle field into an ordered
/// list of shell commands. Returns an empty list for `Value::Null` or when
/// the field is absent.
pub fn normalize(value: Option<&Value>) -> Vec<NormalizedCommand> {
    let Some(value) = value else {
        return Vec::new();
    };
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![NormalizedCommand {
            label: None,
            shell_command: s.clone(),
        }],
        Value::Array(items) => vec![NormalizedCommand {
            label: None,
            shell_command: argv_to_shell(items),
        }],
        Value::Object(map) => {
            // Preserve declaration order: serde_json is built with the
            // `preserve_order` feature, so this iterates in source order.
            let ordered: IndexMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            ordered
                .into_iter()
                .map(|(label, step)| NormalizedCommand {
                    label: Some(label),
                    shell_command: match &step {
                        Value::String(s) => s.clone(),
                        Value::Array(items) => argv_to_shell(items),
                        other => other.to_string(),
                    },
                })
                .collect()
        }
        other => vec![NormalizedCommand {
            label: None,
            shell_command: other.to_string(),
        }],
    }
}

fn argv_to_shell(items: &[Value]) -> String {
    let tokens: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    shell_words::join(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_yields_empty() {
        assert!(normalize(None).is_empty());
    }

    #[test]
    fn string_form() {
        let v = json!("echo hi");
        let cmds = normalize(Some(&v));
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].shell_command, "echo hi");
        assert!(cmds[0].label.is_none());
    }

    #[test]
    fn list_form_joins_argv() {
        let v = json!(["echo", "hi there"]);
        let cmds = normalize(Some(&v));
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].shell_command, "echo 'hi there'");
    }

    #[test]
    fn map_form_yields_one_command_per_step_in_order() {
        let v = json!({"a": "echo a", "b": ["echo", "b"]});
        let cmds = normalize(Some(&v));
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].label.as_deref(), Some("a"));
        assert_eq!(cmds[1].label.as_deref(), Some("b"));
        assert_eq!(cmds[1].shell_command, "echo b");
    }
}
