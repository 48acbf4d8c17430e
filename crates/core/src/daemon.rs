//! Credential sync daemon: a single-instance background process that
//! mirrors selected host credential material into a per-category staging
//! tree under `<state_dir>/credentials/`, which the credential mount
//! planner binds from.
//!
//! Coordination with the orchestrator is filesystem-only: a running
//! instance is detected by a pidfile plus a liveness check against the
//! recorded pid, never by shared in-process state.

use crate::credentials::CredentialCategory;
use crate::errors::{PacknplayError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PIDFILE_NAME: &str = "daemon.pid";

fn pidfile_path(state_dir: &Path) -> PathBuf {
    state_dir.join(PIDFILE_NAME)
}

/// Well-known host sources mirrored into the staging tree per category.
/// `$HOME`-relative; absent sources are skipped, not an error.
fn host_sources(category: CredentialCategory, home: &Path) -> Vec<(PathBuf, &'static str)> {
    match category {
        CredentialCategory::Git => vec![(home.join(".gitconfig"), ".gitconfig")],
        CredentialCategory::Ssh => vec![(home.join(".ssh"), ".ssh")],
        CredentialCategory::Gh => vec![(home.join(".config").join("gh"), "gh")],
        CredentialCategory::Gpg => vec![(home.join(".gnupg"), ".gnupg")],
        CredentialCategory::Npm => vec![(home.join(".npmrc"), ".npmrc")],
        CredentialCategory::Aws => vec![(home.join(".aws"), ".aws")],
    }
}

/// True if a daemon is already running, determined by a pidfile whose pid
/// still maps to a live process.
pub fn is_running(state_dir: &Path) -> bool {
    let path = pidfile_path(state_dir);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return false;
    };
    let Ok(pid) = content.trim().parse::<i32>() else {
        return false;
    };
    process_alive(pid)
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    false
}

/// Writes the current process's pid to the pidfile. The daemon exits
/// immediately if it discovers another instance already holds it.
pub fn claim_instance(state_dir: &Path) -> Result<()> {
    if is_running(state_dir) {
        return Err(PacknplayError::credential("a credential sync daemon is already running"));
    }
    std::fs::create_dir_all(state_dir)
        .map_err(|e| PacknplayError::credential(format!("creating state dir: {e}")))?;
    let path = pidfile_path(state_dir);
    std::fs::write(&path, std::process::id().to_string())
        .map_err(|e| PacknplayError::credential(format!("writing pidfile: {e}")))?;
    set_owner_only_permissions(&path)?;
    Ok(())
}

pub fn release_instance(state_dir: &Path) {
    let path = pidfile_path(state_dir);
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, "failed to remove daemon pidfile");
        }
    }
}

/// Mirrors every enabled category's host source into the staging tree,
/// tightening permissions to owner-only on the way. Missing host sources
/// are skipped with a debug log, not an error: a fresh machine without
/// e.g. gpg configured is a normal state, not a fault.
pub fn sync_once(state_dir: &Path, home: &Path, categories: &[CredentialCategory]) -> Result<()> {
    let staging_root = state_dir.join("credentials");
    for category in categories {
        let staging_dir = staging_root.join(category.staging_dirname());
        std::fs::create_dir_all(&staging_dir)
            .map_err(|e| PacknplayError::credential(format!("creating staging dir: {e}")))?;
        set_owner_only_permissions(&staging_dir)?;

        for (host_path, staged_name) in host_sources(*category, home) {
            if !host_path.exists() {
                debug!(path = %host_path.display(), "host credential source absent, skipping");
                continue;
            }
            let target = staging_dir.join(staged_name);
            copy_path(&host_path, &target)?;
            set_owner_only_permissions(&target)?;
        }
    }
    info!(count = categories.len(), "credential staging sync complete");
    Ok(())
}

fn copy_path(src: &Path, dest: &Path) -> Result<()> {
    if src.is_dir() {
        std::fs::create_dir_all(dest)
            .map_err(|e| PacknplayError::credential(format!("creating {}: {e}", dest.display())))?;
        for entry in std::fs::read_dir(src)
            .map_err(|e| PacknplayError::credential(format!("reading {}: {e}", src.display())))?
        {
            let entry = entry.map_err(|e| PacknplayError::credential(e.to_string()))?;
            copy_path(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        std::fs::copy(src, dest)
            .map_err(|e| PacknplayError::credential(format!("copying {}: {e}", src.display())))?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if path.is_dir() { 0o700 } else { 0o600 };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| PacknplayError::credential(format!("setting permissions on {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_then_release_allows_reclaim() {
        let dir = tempfile::tempdir().unwrap();
        claim_instance(dir.path()).unwrap();
        assert!(is_running(dir.path()));
        release_instance(dir.path());
        assert!(!is_running(dir.path()));
        claim_instance(dir.path()).unwrap();
    }

    #[test]
    fn claim_fails_while_another_instance_holds_it() {
        let dir = tempfile::tempdir().unwrap();
        claim_instance(dir.path()).unwrap();
        assert!(claim_instance(dir.path()).is_err());
    }

    #[test]
    fn sync_once_skips_missing_host_sources_without_error() {
        let state_dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let result = sync_once(state_dir.path(), home.path(), &[CredentialCategory::Gpg]);
        assert!(result.is_ok());
    }

    #[test]
    fn sync_once_mirrors_present_host_file() {
        let state_dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join(".gitconfig"), "[user]\nname=test\n").unwrap();

        sync_once(state_dir.path(), home.path(), &[CredentialCategory::Git]).unwrap();

        let staged = state_dir.path().join("credentials").join("git").join(".gitconfig");
        assert!(staged.exists());
    }
}
