//! Worktree manager: creates and locates per-branch working copies under a
//! stable host directory, decoupled from the user's checkout.

use crate::errors::{PacknplayError, Result};
use crate::naming::sanitize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument};

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Returns the stable, derived worktree path for an identity, without
/// creating anything. `<state_dir>/worktrees/<basename(project_path)>/<sanitized(worktree_name)>`.
pub fn worktree_path(state_dir: &Path, project_path: &Path, worktree_name: &str) -> PathBuf {
    state_dir
        .join("worktrees")
        .join(basename(project_path))
        .join(sanitize(worktree_name))
}

/// Ensures a worktree exists for `(project_path, worktree_name)` and returns
/// the path the container should mount as its workspace.
///
/// If `worktree_name` is empty, returns `project_path` unmodified. The
/// function is idempotent: calling it twice with the same identity performs
/// no redundant git operations the second time.
#[instrument(skip(state_dir), fields(worktree_name))]
pub async fn ensure_worktree(
    state_dir: &Path,
    project_path: &Path,
    worktree_name: &str,
) -> Result<PathBuf> {
    if worktree_name.is_empty() {
        return Ok(project_path.to_path_buf());
    }

    let target = worktree_path(state_dir, project_path, worktree_name);
    if target.join(".git").exists() {
        debug!(path = %target.display(), "worktree already present");
        return Ok(target);
    }

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PacknplayError::workspace(format!("creating worktree parent: {e}")))?;
    }

    info!(path = %target.display(), branch = worktree_name, "creating git worktree");

    let branch_exists = branch_exists(project_path, worktree_name).await?;
    let mut args: Vec<String> = vec!["worktree".into(), "add".into()];
    if !branch_exists {
        args.push("-b".into());
        args.push(worktree_name.to_string());
    }
    args.push(target.display().to_string());
    if branch_exists {
        args.push(worktree_name.to_string());
    }

    let output = Command::new("git")
        .current_dir(project_path)
        .args(&args)
        .output()
        .await
        .map_err(|e| PacknplayError::workspace(format!("spawning git worktree add: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PacknplayError::workspace(format!(
            "git worktree add failed: {stderr}"
        )));
    }

    Ok(target)
}

async fn branch_exists(project_path: &Path, branch: &str) -> Result<bool> {
    let output = Command::new("git")
        .current_dir(project_path)
        .args(["rev-parse", "--verify", "--quiet", branch])
        .output()
        .await
        .map_err(|e| PacknplayError::workspace(format!("spawning git rev-parse: {e}")))?;
    Ok(output.status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worktree_path_is_derived_and_sanitized() {
        let path = worktree_path(
            Path::new("/home/user/.local/share/packnplay"),
            Path::new("/tmp/proj"),
            "feature/auth",
        );
        assert_eq!(
            path,
            PathBuf::from("/home/user/.local/share/packnplay/worktrees/proj/feature-auth")
        );
    }

    #[tokio::test]
    async fn ensure_worktree_noop_when_name_empty() {
        let result = ensure_worktree(Path::new("/state"), Path::new("/tmp/proj"), "")
            .await
            .unwrap();
        assert_eq!(result, PathBuf::from("/tmp/proj"));
    }
}
