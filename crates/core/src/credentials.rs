//! Credential mount planner: maps enabled credential categories to a
//! concrete set of bind mounts and environment-variable injections,
//! sourced from the sync daemon's staging area rather than the user's
//! home directory directly.

use crate::mount::MountSpec;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialCategory {
    Git,
    Ssh,
    Gh,
    Gpg,
    Npm,
    Aws,
}

impl CredentialCategory {
    pub fn all() -> [Self; 6] {
        [Self::Git, Self::Ssh, Self::Gh, Self::Gpg, Self::Npm, Self::Aws]
    }

    pub fn staging_dirname(&self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Ssh => "ssh",
            Self::Gh => "gh",
            Self::Gpg => "gpg",
            Self::Npm => "npm",
            Self::Aws => "aws",
        }
    }

    fn staged_source_name(&self) -> &'static str {
        match self {
            Self::Git => ".gitconfig",
            Self::Ssh => ".ssh",
            Self::Gh => "gh",
            Self::Gpg => ".gnupg",
            Self::Npm => ".npmrc",
            Self::Aws => ".aws",
        }
    }

    fn container_target(&self, home: &str) -> String {
        match self {
            Self::Git => format!("{home}/.gitconfig"),
            Self::Ssh => format!("{home}/.ssh"),
            Self::Gh => format!("{home}/.config/gh"),
            Self::Gpg => format!("{home}/.gnupg"),
            Self::Npm => format!("{home}/.npmrc"),
            Self::Aws => format!("{home}/.aws"),
        }
    }
}

/// A planned credential mount plus any environment variables it implies.
#[derive(Debug, Clone)]
pub struct CredentialMountPlan {
    pub mounts: Vec<MountSpec>,
    pub env: Vec<(String, String)>,
}

/// Builds the mount plan for the given enabled categories. A staged
/// source missing on disk for an enabled category is a warning, not a
/// hard failure: the container simply starts without that credential.
pub fn plan_mounts(
    state_dir: &Path,
    home: &str,
    enabled: &[CredentialCategory],
) -> CredentialMountPlan {
    let mut mounts = Vec::new();
    let mut env = Vec::new();

    for category in enabled {
        let staged = state_dir
            .join("credentials")
            .join(category.staging_dirname())
            .join(category.staged_source_name());
        if !staged.exists() {
            warn!(category = ?category, path = %staged.display(), "staged credential source missing, skipping mount");
            continue;
        }
        mounts.push(MountSpec::bind(
            staged.display().to_string(),
            category.container_target(home),
            true,
        ));
        if matches!(category, CredentialCategory::Aws) {
            for (key, value) in std::env::vars().filter(|(k, _)| k.starts_with("AWS_")) {
                env.push((key, value));
            }
        }
    }

    CredentialMountPlan { mounts, env }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_staged_source_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan_mounts(dir.path(), "/home/vscode", &[CredentialCategory::Git]);
        assert!(plan.mounts.is_empty());
    }

    #[test]
    fn present_staged_source_produces_readonly_bind_mount() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join("credentials").join("git");
        std::fs::create_dir_all(&git_dir).unwrap();
        std::fs::write(git_dir.join(".gitconfig"), "[user]\n").unwrap();

        let plan = plan_mounts(dir.path(), "/home/vscode", &[CredentialCategory::Git]);
        assert_eq!(plan.mounts.len(), 1);
        assert!(plan.mounts[0].read_only);
        assert_eq!(plan.mounts[0].target, "/home/vscode/.gitconfig");
    }

    #[test]
    fn non_aws_categories_inject_no_env() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join("credentials").join("git");
        std::fs::create_dir_all(&git_dir).unwrap();
        std::fs::write(git_dir.join(".gitconfig"), "").unwrap();
        let plan = plan_mounts(dir.path(), "/home/vscode", &[CredentialCategory::Git]);
        assert!(plan.env.is_empty());
    }
}
