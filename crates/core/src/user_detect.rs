//! In-container user detection: devcontainer config, then cache, then a
//! short-lived probe container, finally falling back to root.

use crate::cache::{sha256_hex, write_json_atomic};
use crate::docker::DockerCli;
use crate::env_probe::{ProbeMode, PROBE_COMMAND};
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectionSource {
    Devcontainer,
    ImageDefault,
    RuntimeDetection,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetectionResult {
    pub user: String,
    pub home_dir: String,
    pub source: DetectionSource,
}

impl UserDetectionResult {
    fn for_user(user: &str, source: DetectionSource) -> Self {
        let home_dir = if user == "root" {
            "/root".to_string()
        } else {
            format!("/home/{user}")
        };
        Self {
            user: user.to_string(),
            home_dir,
            source,
        }
    }

    fn fallback_root() -> Self {
        Self::for_user("root", DetectionSource::Fallback)
    }
}

fn cache_path(cache_dir: &Path, image_id: &str) -> PathBuf {
    cache_dir
        .join("userdetect")
        .join(format!("{}.json", sha256_hex(image_id)))
}

/// Resolves the in-container user for `image`, consulting (in order) an
/// explicit devcontainer `remoteUser`, a persistent cache keyed by image
/// id, and finally a live probe container. Never returns an error: probe
/// failures degrade to the root fallback.
#[instrument(skip(docker))]
pub async fn detect_user(
    docker: &DockerCli,
    cache_dir: &Path,
    image: &str,
    remote_user: Option<&str>,
    user_env_probe: Option<&str>,
) -> UserDetectionResult {
    if let Some(user) = remote_user {
        return UserDetectionResult::for_user(user, DetectionSource::Devcontainer);
    }

    let image_id = match docker.inspect_image(image).await {
        Ok(Some(info)) => info.id,
        _ => image.to_string(),
    };
    let path = cache_path(cache_dir, &image_id);
    if let Ok(Some(cached)) = crate::cache::read_json::<UserDetectionResult>(&path) {
        debug!(image_id, "user detection cache hit");
        return cached;
    }

    let result = probe_container(docker, image, user_env_probe)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "user probe failed, falling back to root");
            UserDetectionResult::fallback_root()
        });

    if let Err(e) = write_json_atomic(&path, &result) {
        warn!(error = %e, "failed to cache user detection result");
    }
    result
}

async fn probe_container(
    docker: &DockerCli,
    image: &str,
    user_env_probe: Option<&str>,
) -> Result<UserDetectionResult> {
    let mode = ProbeMode::from_config(user_env_probe);
    let mut args = vec!["run".to_string(), "--rm".to_string(), image.to_string(), "sh".to_string()];
    args.extend(mode.shell_args().into_iter().map(str::to_string));
    args.push("-c".to_string());
    args.push(PROBE_COMMAND.to_string());

    let output = docker.run_probe(&args).await?;
    let mut lines = output.lines();
    let user = lines.next().unwrap_or("root").trim().to_string();
    let home_dir = lines
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            if user == "root" {
                "/root".to_string()
            } else {
                format!("/home/{user}")
            }
        });

    Ok(UserDetectionResult {
        user,
        home_dir,
        source: DetectionSource::RuntimeDetection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_home_dir_is_slash_root() {
        let result = UserDetectionResult::for_user("root", DetectionSource::Devcontainer);
        assert_eq!(result.home_dir, "/root");
    }

    #[test]
    fn non_root_home_dir_is_home_user() {
        let result = UserDetectionResult::for_user("vscode", DetectionSource::Devcontainer);
        assert_eq!(result.home_dir, "/home/vscode");
    }

    #[test]
    fn fallback_is_root() {
        let result = UserDetectionResult::fallback_root();
        assert_eq!(result.user, "root");
        assert_eq!(result.source, DetectionSource::Fallback);
    }

    #[test]
    fn cache_path_is_keyed_by_image_id_digest() {
        let path = cache_path(Path::new("/tmp/cache"), "sha256:abcdef");
        assert!(path.starts_with("/tmp/cache/userdetect"));
        assert!(path.extension().map(|e| e == "json").unwrap_or(false));
    }
}
