//! Deterministic derivation of container names, image tags, and the label
//! set used to identify and introspect managed containers.
//!
//! Every function here is pure: given the same inputs, the same strings are
//! produced, which is what lets `run --reconnect` find a previously created
//! container without any persisted state beyond the container's own labels.

use std::collections::HashMap;
use std::path::Path;

pub const LABEL_MANAGED_BY: &str = "managed-by";
pub const LABEL_PROJECT: &str = "packnplay-project";
pub const LABEL_WORKTREE: &str = "packnplay-worktree";
pub const LABEL_HOST_PATH: &str = "packnplay-host-path";
pub const LABEL_LAUNCH_COMMAND: &str = "packnplay-launch-command";
pub const MANAGED_BY_VALUE: &str = "packnplay";

/// Replaces `/`, ` `, and `:` with `-`. Idempotent: sanitizing an
/// already-sanitized name returns it unchanged.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | ' ' | ':' => '-',
            other => other,
        })
        .collect()
}

fn basename(project_path: &Path) -> String {
    project_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| project_path.display().to_string())
}

/// Derives the deterministic container name for a workspace identity.
///
/// Uses the case-preserving basename of the host path; the worktree name
/// (or the literal `direct` when none is set) is sanitized.
pub fn container_name(project_path: &Path, worktree_name: Option<&str>) -> String {
    let base = basename(project_path);
    let suffix = match worktree_name {
        Some(name) if !name.is_empty() => sanitize(name),
        _ => "direct".to_string(),
    };
    format!("packnplay-{base}-{suffix}")
}

/// Derives the deterministic image tag for a built devcontainer image.
/// Like `container_name`, but the basename is additionally lowercased.
pub fn image_tag(project_path: &Path) -> String {
    let base = basename(project_path).to_lowercase();
    format!("packnplay-{base}-devcontainer:latest")
}

/// Builds the fixed label schema attached at container creation.
pub fn build_labels(
    project_path: &Path,
    worktree_name: Option<&str>,
    launch_command: &[String],
) -> Vec<(String, String)> {
    vec![
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string()),
        (LABEL_PROJECT.to_string(), basename(project_path)),
        (
            LABEL_WORKTREE.to_string(),
            worktree_name.unwrap_or("").to_string(),
        ),
        (
            LABEL_HOST_PATH.to_string(),
            project_path.display().to_string(),
        ),
        (
            LABEL_LAUNCH_COMMAND.to_string(),
            shell_words::join(launch_command),
        ),
    ]
}

/// Serializes labels to the comma-joined `k=v` wire format. Values are not
/// comma- or equals-escaped: callers must ensure values contain neither.
pub fn emit_label_string(labels: &[(String, String)]) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`emit_label_string`]. Tolerates missing fields and skips
/// malformed `key=value` pairs (no `=` present) rather than failing.
pub fn parse_label_string(raw: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if raw.is_empty() {
        return map;
    }
    for pair in raw.split(',') {
        if let Some((key, value)) = pair.split_once('=') {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

/// Builds the `label=k=v` filter value used to select managed containers
/// via the runtime adapter's `list`.
pub fn label_selector() -> String {
    format!("{LABEL_MANAGED_BY}={MANAGED_BY_VALUE}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn container_name_uses_direct_when_no_worktree() {
        let name = container_name(&PathBuf::from("/tmp/proj"), None);
        assert_eq!(name, "packnplay-proj-direct");
    }

    #[test]
    fn container_name_sanitizes_worktree() {
        let name = container_name(&PathBuf::from("/tmp/proj"), Some("feature/auth"));
        assert_eq!(name, "packnplay-proj-feature-auth");
    }

    #[test]
    fn image_tag_lowercases_basename() {
        let tag = image_tag(&PathBuf::from("/tmp/MyProj"));
        assert_eq!(tag, "packnplay-myproj-devcontainer:latest");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize("feature/auth fix:now");
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn label_roundtrip_identity() {
        let labels = build_labels(
            &PathBuf::from("/tmp/proj"),
            Some("feature/auth"),
            &["echo".to_string(), "hi".to_string()],
        );
        let raw = emit_label_string(&labels);
        let parsed = parse_label_string(&raw);
        for (k, v) in &labels {
            assert_eq!(parsed.get(k).map(String::as_str), Some(v.as_str()));
        }
    }

    #[test]
    fn empty_label_string_is_empty_map() {
        assert!(parse_label_string("").is_empty());
    }

    #[test]
    fn malformed_pair_is_skipped() {
        let parsed = parse_label_string("a=1,nodelimiter,b=2");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("a").map(String::as_str), Some("1"));
        assert_eq!(parsed.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn scenario_one_labels() {
        let labels = build_labels(
            &PathBuf::from("/tmp/proj"),
            None,
            &["echo".to_string(), "hello".to_string()],
        );
        let raw = emit_label_string(&labels);
        assert_eq!(
            raw,
            "managed-by=packnplay,packnplay-project=proj,packnplay-worktree=,packnplay-host-path=/tmp/proj,packnplay-launch-command=echo hello"
        );
    }
}
