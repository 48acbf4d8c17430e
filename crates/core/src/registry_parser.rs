//! OCI registry reference parsing: `registry/namespace/name:tag` or
//! `registry/namespace/name@sha256:...`.

use crate::errors::{FeatureError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciFeatureRef {
    pub registry: String,
    pub path: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl OciFeatureRef {
    /// The full reference string, reconstructed.
    pub fn reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.path);
        if let Some(digest) = &self.digest {
            s.push('@');
            s.push_str(digest);
        } else if let Some(tag) = &self.tag {
            s.push(':');
            s.push_str(tag);
        }
        s
    }
}

/// Parses a bare OCI reference. A reference is assumed to name a registry
/// when its first segment contains a `.` or `:` (a hostname or
/// `host:port`), matching Docker's own heuristic; otherwise the registry
/// defaults to `ghcr.io`, the convention for unqualified devcontainer
/// feature references.
pub fn parse_registry_reference(reference: &str) -> Result<OciFeatureRef> {
    if reference.is_empty() {
        return Err(FeatureError::Validation {
            message: "empty feature reference".to_string(),
        }
        .into());
    }

    let (without_digest, digest) = match reference.split_once('@') {
        Some((base, digest)) => (base, Some(format!("@{digest}"))),
        None => (reference, None),
    };

    // A tag, if present, lives in the last '/'-delimited segment, after a
    // ':'. A colon in an earlier segment is a registry `host:port` and is
    // not a tag delimiter.
    let (path_part, tag) = if digest.is_none() {
        let last_slash = without_digest.rfind('/');
        let search_from = last_slash.map(|i| i + 1).unwrap_or(0);
        match without_digest[search_from..].find(':') {
            Some(rel_idx) => {
                let idx = search_from + rel_idx;
                (
                    without_digest[..idx].to_string(),
                    Some(without_digest[idx + 1..].to_string()),
                )
            }
            None => (without_digest.to_string(), None),
        }
    } else {
        (without_digest.to_string(), None)
    };

    let segments: Vec<&str> = path_part.split('/').collect();
    if segments.len() < 2 {
        return Err(FeatureError::Validation {
            message: format!("feature reference must include a path: {reference}"),
        }
        .into());
    }

    let first = segments[0];
    let (registry, path) = if first.contains('.') || first.contains(':') {
        (first.to_string(), segments[1..].join("/"))
    } else {
        ("ghcr.io".to_string(), segments.join("/"))
    };

    Ok(OciFeatureRef {
        registry,
        path,
        tag,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fully_qualified_reference() {
        let r = parse_registry_reference("ghcr.io/devcontainers/features/node:1.2.3").unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.path, "devcontainers/features/node");
        assert_eq!(r.tag.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn defaults_unqualified_reference_to_ghcr() {
        let r = parse_registry_reference("devcontainers/features/node").unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.path, "devcontainers/features/node");
        assert!(r.tag.is_none());
    }

    #[test]
    fn parses_digest_reference() {
        let r = parse_registry_reference("ghcr.io/a/b@sha256:deadbeef").unwrap();
        assert_eq!(r.digest.as_deref(), Some("@sha256:deadbeef"));
    }

    #[test]
    fn rejects_empty() {
        assert!(parse_registry_reference("").is_err());
    }
}
