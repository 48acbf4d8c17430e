pub mod attach;
pub mod configure;
pub mod list;
pub mod refresh_container;
pub mod run;
pub mod watch_credentials;

use crate::cli::WorkspaceArgs;
use anyhow::{Context, Result};
use packnplay_core::pconfig::PacknplayConfig;
use packnplay_core::{daemon, state};
use std::path::PathBuf;

/// Resolves `--path` to an absolute project path, defaulting to the
/// current directory.
pub fn resolve_project_path(workspace: &WorkspaceArgs) -> Result<PathBuf> {
    let path = workspace.path.clone().unwrap_or(PathBuf::from("."));
    std::fs::canonicalize(&path).with_context(|| format!("resolving project path {}", path.display()))
}

/// The worktree name to launch from, or `None` for a direct launch against
/// `project_path` itself.
pub fn resolve_worktree_name(workspace: &WorkspaceArgs) -> Option<String> {
    if workspace.no_worktree {
        return None;
    }
    workspace.worktree.clone()
}

/// Ensures the credential sync daemon is running, spawning a detached
/// instance of this same binary's `watch-credentials` entry point if not.
pub fn ensure_daemon_running() -> Result<()> {
    let state_dir = state::state_dir();
    if daemon::is_running(&state_dir) {
        return Ok(());
    }
    let exe = std::env::current_exe().context("locating current executable")?;
    std::process::Command::new(exe)
        .arg("watch-credentials")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("spawning credential sync daemon")?;
    std::thread::sleep(std::time::Duration::from_millis(100));
    Ok(())
}

pub fn load_packnplay_config() -> Result<PacknplayConfig> {
    let resolved = packnplay_core::pconfig::load_default()?;
    Ok(resolved.typed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_project_path_canonicalizes_an_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let args = WorkspaceArgs { path: Some(dir.path().to_path_buf()), worktree: None, no_worktree: false };
        let resolved = resolve_project_path(&args).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn resolve_project_path_rejects_a_missing_directory() {
        let args = WorkspaceArgs {
            path: Some(PathBuf::from("/no/such/packnplay/workspace")),
            worktree: None,
            no_worktree: false,
        };
        assert!(resolve_project_path(&args).is_err());
    }

    #[test]
    fn resolve_worktree_name_is_none_when_no_worktree_is_set() {
        let args = WorkspaceArgs { path: None, worktree: Some("feature-x".to_string()), no_worktree: true };
        assert_eq!(resolve_worktree_name(&args), None);
    }

    #[test]
    fn resolve_worktree_name_passes_through_the_requested_name() {
        let args = WorkspaceArgs { path: None, worktree: Some("feature-x".to_string()), no_worktree: false };
        assert_eq!(resolve_worktree_name(&args), Some("feature-x".to_string()));
    }
}
